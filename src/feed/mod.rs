//! Authenticated access to per-partition listing pages.

pub mod error;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::auth::endpoints::Endpoints;
use crate::auth::TokenManager;
use crate::types::{SortOrder, TimeWindow};

pub use self::error::FetchError;
pub use self::types::ContentItem;
use self::types::Listing;

/// Source of listing pages. One call is one page; no retries at this layer.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_partition(
        &self,
        partition: &str,
        after: Option<&str>,
    ) -> Result<Vec<ContentItem>, FetchError>;
}

/// Fixed query parameters sent with every listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingParams {
    pub time_window: TimeWindow,
    pub sort: SortOrder,
    pub limit: u32,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            time_window: TimeWindow::Day,
            sort: SortOrder::Top,
            limit: 100,
        }
    }
}

impl ListingParams {
    fn query(&self, after: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("t", self.time_window.as_str().to_string()),
            ("sort", self.sort.as_str().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(cursor) = after {
            query.push(("after", cursor.to_string()));
        }
        query
    }
}

/// HTTP implementation against the OAuth listing API.
pub struct HttpFeedClient {
    client: Client,
    endpoints: Endpoints,
    tokens: Arc<TokenManager>,
    params: ListingParams,
}

impl HttpFeedClient {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        tokens: Arc<TokenManager>,
        params: ListingParams,
    ) -> Self {
        Self {
            client,
            endpoints,
            tokens,
            params,
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_partition(
        &self,
        partition: &str,
        after: Option<&str>,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let url = self.endpoints.listing_url(partition, self.params.sort.as_str());
        let headers = self.tokens.headers().await?;

        tracing::debug!(partition, after = after.unwrap_or(""), "GET {}", url);
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(&self.params.query(after))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;
        let listing: Listing =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })?;
        Ok(listing.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{CredentialRecord, MemoryCredentialStore};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, params: ListingParams) -> HttpFeedClient {
        let record = CredentialRecord {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            username: "reader".into(),
            password: "pw".into(),
            token: Some("bearer cached".into()),
            expires: Some(Utc::now() + Duration::hours(1)),
            extra: Default::default(),
        };
        let endpoints =
            Endpoints::new(format!("{}/api/v1/access_token", server.uri()), server.uri());
        let tokens = TokenManager::load(
            Box::new(MemoryCredentialStore::new(record)),
            endpoints.clone(),
            Client::new(),
        )
        .await
        .unwrap();
        HttpFeedClient::new(Client::new(), endpoints, Arc::new(tokens), params)
    }

    fn page() -> serde_json::Value {
        json!({
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "children": [
                    {"kind": "t3", "data": {"id": "a", "name": "t3_a", "score": 500, "title": "A",
                        "domain": "a.com", "subreddit": "news", "permalink": "/r/news/a",
                        "url": "https://a.com", "created_utc": 1700000000.0}},
                    {"kind": "t3", "data": {"id": "b", "name": "t3_b", "score": 50, "title": "B",
                        "domain": "b.com", "subreddit": "news", "permalink": "/r/news/b",
                        "url": "https://b.com", "created_utc": 1700000100.0}}
                ]
            }
        })
    }

    #[test]
    fn test_query_without_cursor() {
        let q = ListingParams::default().query(None);
        assert_eq!(
            q,
            vec![
                ("t", "day".to_string()),
                ("sort", "top".to_string()),
                ("limit", "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_with_cursor() {
        let q = ListingParams::default().query(Some("t3_abc"));
        assert_eq!(q.last(), Some(&("after", "t3_abc".to_string())));
    }

    #[tokio::test]
    async fn test_first_page_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/news/top"))
            .and(query_param("t", "day"))
            .and(query_param("sort", "top"))
            .and(query_param("limit", "100"))
            .and(query_param_is_missing("after"))
            .and(header("authorization", "bearer cached"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page()))
            .expect(1)
            .mount(&server)
            .await;

        let feed = client_for(&server, ListingParams::default()).await;
        let items = feed.fetch_partition("news", None).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[1].name, "t3_b");
    }

    #[tokio::test]
    async fn test_cursor_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/worldnews/top"))
            .and(query_param("after", "t3_zzz"))
            .and(query_param("t", "week"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"children": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = ListingParams {
            time_window: TimeWindow::Week,
            ..ListingParams::default()
        };
        let feed = client_for(&server, params).await;
        let items = feed.fetch_partition("worldnews", Some("t3_zzz")).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let feed = client_for(&server, ListingParams::default()).await;
        match feed.fetch_partition("news", None).await {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected HttpStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let feed = client_for(&server, ListingParams::default()).await;
        let err = feed.fetch_partition("news", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(!err.is_retryable());
    }
}
