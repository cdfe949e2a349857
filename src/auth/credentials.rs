//! Credential record and its on-disk JSON storage.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use super::error::{AuthError, ConfigError};

/// Format written by the older tooling for `expires`. Read-only support.
const LEGACY_DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// API client and account credentials plus the cached bearer token.
///
/// Treated as an immutable value: a renewal builds a new record with
/// [`CredentialRecord::with_token`] and hands it to the store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "expires_format"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Keys this program does not use (database settings and the like),
    /// carried through so rewriting the file never drops them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("expires", &self.expires)
            .finish_non_exhaustive()
    }
}

impl CredentialRecord {
    /// Check that the four required fields carry a value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(name));
            }
        }
        Ok(())
    }

    /// Return a copy carrying a freshly granted token.
    pub fn with_token(&self, token: String, expires: DateTime<Utc>) -> Self {
        Self {
            token: Some(token),
            expires: Some(expires),
            ..self.clone()
        }
    }
}

/// Where credential records are loaded from and written back to.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<CredentialRecord, ConfigError>;

    async fn save(&self, record: &CredentialRecord) -> Result<(), AuthError>;
}

/// JSON file on disk, the default credential storage.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<CredentialRecord, ConfigError> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(ConfigError::Missing(self.path.clone()));
        }
        let contents = fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let record: CredentialRecord =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Invalid {
                path: self.path.clone(),
                source,
            })?;
        record.validate()?;
        tracing::debug!("Loaded credentials from {}", self.path.display());
        Ok(record)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(record)?;
        let persist_err = |source| AuthError::Persist {
            path: self.path.clone(),
            source,
        };
        fs::write(&self.path, json).await.map_err(persist_err)?;
        #[cfg(unix)]
        {
            // Holds the account password and a live token
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .await
                .map_err(persist_err)?;
        }
        tracing::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store that counts writes.
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MemoryCredentialStore {
    record: std::sync::Arc<std::sync::Mutex<CredentialRecord>>,
    saves: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MemoryCredentialStore {
    pub(crate) fn new(record: CredentialRecord) -> Self {
        Self {
            record: std::sync::Arc::new(std::sync::Mutex::new(record)),
            saves: Default::default(),
        }
    }

    pub(crate) fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub(crate) fn current(&self) -> CredentialRecord {
        self.record.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<CredentialRecord, ConfigError> {
        let record = self.current();
        record.validate()?;
        Ok(record)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        *self.record.lock().unwrap() = record.clone();
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// `expires` is written as RFC 3339. The legacy naive format is accepted on
/// read and taken as local time, which is how older files recorded it.
mod expires_format {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse_expires(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    fn parse_expires(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(s, LEGACY_DATE_FMT)
            .map_err(|e| format!("cannot parse expires '{}': {}", s, e))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| format!("expires '{}' does not exist in the local timezone", s))
    }
}
