//! OAuth token lifecycle for the feed API.
//!
//! The flow follows Reddit's script-app authorization: a resource-owner
//! password grant with HTTP Basic client auth. Tokens are cached in the
//! credential file and renewed transparently once they expire.

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod responses;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use tokio::sync::Mutex;

use self::credentials::{CredentialRecord, CredentialStore};
use self::endpoints::Endpoints;
use self::error::AuthError;
use self::responses::TokenResponse;

/// A bearer header value and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub authorization: String,
    pub expires: DateTime<Utc>,
}

/// Expiry assumed when the record carries none, guaranteeing a renewal.
fn expired_sentinel() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 1)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Whether the cached token must be replaced before use.
fn needs_renewal(record: &CredentialRecord, now: DateTime<Utc>) -> bool {
    record.token.is_none() || now > record.expires.unwrap_or_else(expired_sentinel)
}

/// `now + expires_in`, or `now` when the lifetime does not fit a timestamp.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    let expires = Duration::try_seconds(expires_in).and_then(|d| now.checked_add_signed(d));
    match expires {
        Some(expires) => expires,
        None => {
            tracing::warn!(
                expires_in,
                "Token lifetime out of range; treating the token as already expired"
            );
            now
        }
    }
}

/// User-Agent in the `<platform>:<app id>:<version> (by /u/<username>)` shape
/// the API asks clients to send.
pub fn user_agent_for(username: &str) -> String {
    format!(
        "{}:feedsync:v{} (by /u/{})",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        username
    )
}

/// Hands out request headers with an unexpired bearer token.
///
/// Shared across the crawl via `Arc`. The record lives behind an async mutex
/// held for the whole check-and-renew, so concurrent callers see exactly one
/// renewal.
pub struct TokenManager {
    client: Client,
    endpoints: Endpoints,
    store: Box<dyn CredentialStore>,
    record: Mutex<CredentialRecord>,
    user_agent: HeaderValue,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("endpoints", &self.endpoints)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Load the credential record from `store`. Fails fast on a missing or
    /// incomplete record; does not contact the token endpoint.
    pub async fn load(
        store: Box<dyn CredentialStore>,
        endpoints: Endpoints,
        client: Client,
    ) -> Result<Self, AuthError> {
        let record = store.load().await?;
        let user_agent = HeaderValue::from_str(&user_agent_for(&record.username))?;
        Ok(Self {
            client,
            endpoints,
            store,
            record: Mutex::new(record),
            user_agent,
        })
    }

    /// Headers for an authenticated API call: `User-Agent` and `Authorization`.
    pub async fn headers(&self) -> Result<HeaderMap, AuthError> {
        let token = self.token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&token.authorization)?);
        Ok(headers)
    }

    /// Current token, renewing and persisting it first if it has expired.
    pub async fn token(&self) -> Result<Token, AuthError> {
        let mut record = self.record.lock().await;
        if needs_renewal(&record, Utc::now()) {
            tracing::debug!("Cached token missing or expired, requesting a new one");
            let renewed = self.exchange(&record).await?;
            self.store.save(&renewed).await?;
            *record = renewed;
            tracing::info!(expires = ?record.expires, "Obtained new access token");
        }
        Ok(Token {
            authorization: record.token.clone().unwrap_or_default(),
            expires: record.expires.unwrap_or_else(expired_sentinel),
        })
    }

    /// Run the password grant and build the replacement record.
    async fn exchange(&self, record: &CredentialRecord) -> Result<CredentialRecord, AuthError> {
        let form = [
            ("grant_type", "password"),
            ("username", record.username.as_str()),
            ("password", record.password.as_str()),
        ];

        tracing::debug!("POST {}", self.endpoints.token_url);
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .basic_auth(&record.client_id, Some(&record.client_secret))
            .header(USER_AGENT, self.user_agent.clone())
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let grant = serde_json::from_str::<TokenResponse>(&body).unwrap_or_else(|e| {
            tracing::warn!(status = %status, "Token endpoint returned a non-JSON body: {}", e);
            TokenResponse::default()
        });
        if grant.access_token.is_none() {
            tracing::warn!(
                status = %status,
                error = ?grant.error,
                "Token exchange returned no access token; API calls will be unauthorized"
            );
        }

        let expires = expiry_after(Utc::now(), grant.expires_in.unwrap_or(0));
        let token = format!("bearer {}", grant.access_token.unwrap_or_default());
        Ok(record.with_token(token, expires))
    }
}
