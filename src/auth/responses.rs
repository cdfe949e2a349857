use serde::Deserialize;
use serde_json::Value;

/// Response body of the OAuth password grant.
///
/// Both fields are optional: a rejected grant comes back as something like
/// `{"error": "invalid_grant"}` or `{"error": 401}` and is handled as an empty token.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<Value>,
}
