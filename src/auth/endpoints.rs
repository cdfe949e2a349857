/// Remote endpoints used for token exchange and listing fetches.
/// Defaults point at Reddit; tests and staging setups override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token_url: String,
    pub api_root: String,
}

pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_ROOT: &str = "https://oauth.reddit.com";

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_root: DEFAULT_API_ROOT.to_string(),
        }
    }
}

impl Endpoints {
    pub fn new(token_url: impl Into<String>, api_root: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            api_root: api_root.into().trim_end_matches('/').to_string(),
        }
    }

    /// Listing URL for one partition, e.g. `https://oauth.reddit.com/r/news/top`.
    pub fn listing_url(&self, partition: &str, sort: &str) -> String {
        format!("{}/r/{}/{}", self.api_root, partition, sort)
    }
}
