//! HTTP client for the authoritative metadata service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use ned_core::{Ediid, NerdRecord};

use crate::{FetchError, Result, SourceFetcher};

/// Default bound on a single upstream request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while constructing the client
#[derive(thiserror::Error, Debug)]
pub enum ClientBuildError {
    #[error("invalid metadata service URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Fetches records with `GET {base_url}/{ediid}`
#[derive(Clone, Debug)]
pub struct HttpSourceFetcher {
    base_url: Url,
    client: reqwest::Client,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl HttpSourceFetcher {
    /// Creates a client targeting the given base URL with the default timeout.
    pub fn new(base_url: &str) -> std::result::Result<Self, ClientBuildError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with an explicit request timeout.
    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, ClientBuildError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientBuildError::Client(e.to_string()))?;

        Ok(Self {
            base_url: parsed,
            client,
            bearer_token: None,
            timeout,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The ediid becomes a single, percent-encoded path segment.
    fn record_url(&self, ediid: &Ediid) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Unavailable("metadata service URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(ediid.as_str());
        Ok(url)
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, ediid: &Ediid) -> Result<NerdRecord> {
        let url = self.record_url(ediid)?;
        tracing::debug!(%ediid, %url, "fetching record from metadata service");

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Unavailable(format!(
                    "request timed out after {}ms",
                    self.timeout.as_millis()
                ))
            } else {
                FetchError::Unavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound(ediid.clone()));
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!(
                "metadata service answered {status}"
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::Unavailable(format!("invalid response body: {e}")))?;

        NerdRecord::from_value(body)
            .map_err(|e| FetchError::Unavailable(format!("invalid record from metadata service: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}/rmm/records")
    }

    fn records_app() -> Router {
        Router::new().route(
            "/rmm/records/{id}",
            get(|Path(id): Path<String>| async move {
                match id.as_str() {
                    "1234" => (AxumStatus::OK, Json(json!({"@id": "1234", "title": "Old Title"}))),
                    "ark:/88434/mds2-2106" => {
                        (AxumStatus::OK, Json(json!({"@id": "ark:/88434/mds2-2106"})))
                    }
                    "gone" => (AxumStatus::GONE, Json(json!({}))),
                    "broken" => (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"}))),
                    "list" => (AxumStatus::OK, Json(json!(["not", "a", "record"]))),
                    _ => (AxumStatus::NOT_FOUND, Json(json!({"message": "no such record"}))),
                }
            }),
        )
    }

    fn id(value: &str) -> Ediid {
        Ediid::new(value).unwrap()
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpSourceFetcher::new("not a url"),
            Err(ClientBuildError::InvalidBaseUrl { .. })
        ));
        assert!(HttpSourceFetcher::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn record_url_encodes_ediid_as_one_segment() {
        let fetcher = HttpSourceFetcher::new("http://localhost:8080/rmm/records/").unwrap();
        let url = fetcher.record_url(&id("ark:/88434/mds2-2106")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/rmm/records/ark:%2F88434%2Fmds2-2106"
        );
    }

    #[tokio::test]
    async fn fetch_returns_record() {
        let base = spawn_upstream(records_app()).await;
        let fetcher = HttpSourceFetcher::new(&base).unwrap();

        let record = fetcher.fetch(&id("1234")).await.unwrap();
        assert_eq!(record.get("title"), Some(&json!("Old Title")));
    }

    #[tokio::test]
    async fn fetch_handles_ediid_with_slashes() {
        let base = spawn_upstream(records_app()).await;
        let fetcher = HttpSourceFetcher::new(&base).unwrap();

        let record = fetcher.fetch(&id("ark:/88434/mds2-2106")).await.unwrap();
        assert_eq!(record.get("@id"), Some(&json!("ark:/88434/mds2-2106")));
    }

    #[tokio::test]
    async fn fetch_maps_404_and_410_to_not_found() {
        let base = spawn_upstream(records_app()).await;
        let fetcher = HttpSourceFetcher::new(&base).unwrap();

        assert_eq!(
            fetcher.fetch(&id("does-not-exist")).await,
            Err(FetchError::NotFound(id("does-not-exist")))
        );
        assert_eq!(fetcher.fetch(&id("gone")).await, Err(FetchError::NotFound(id("gone"))));
    }

    #[tokio::test]
    async fn fetch_maps_server_error_to_unavailable() {
        let base = spawn_upstream(records_app()).await;
        let fetcher = HttpSourceFetcher::new(&base).unwrap();

        assert!(matches!(
            fetcher.fetch(&id("broken")).await,
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn fetch_rejects_non_object_body() {
        let base = spawn_upstream(records_app()).await;
        let fetcher = HttpSourceFetcher::new(&base).unwrap();

        assert!(matches!(
            fetcher.fetch(&id("list")).await,
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn fetch_times_out_as_unavailable() {
        let app = Router::new().route(
            "/rmm/records/{id}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"title": "too late"}))
            }),
        );
        let base = spawn_upstream(app).await;
        let fetcher = HttpSourceFetcher::with_timeout(&base, Duration::from_millis(100)).unwrap();

        let err = fetcher.fetch(&id("1234")).await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn fetch_from_closed_port_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpSourceFetcher::new(&format!("http://{addr}/rmm/records")).unwrap();
        assert!(matches!(
            fetcher.fetch(&id("1234")).await,
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn fetch_sends_bearer_token() {
        let app = Router::new().route(
            "/rmm/records/{id}",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth == "Bearer upstream-secret" {
                    (AxumStatus::OK, Json(json!({"title": "ok"})))
                } else {
                    (AxumStatus::UNAUTHORIZED, Json(json!({})))
                }
            }),
        );
        let base = spawn_upstream(app).await;

        let anonymous = HttpSourceFetcher::new(&base).unwrap();
        assert!(matches!(
            anonymous.fetch(&id("1234")).await,
            Err(FetchError::Unavailable(_))
        ));

        let authorized = HttpSourceFetcher::new(&base)
            .unwrap()
            .with_bearer_token("upstream-secret");
        assert!(authorized.fetch(&id("1234")).await.is_ok());
    }
}
