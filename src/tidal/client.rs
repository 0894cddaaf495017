//! TIDAL API HTTP client

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::auth::TidalSession;
use super::error::FetchError;
use super::models::Endpoint;

/// Header carrying the session on every catalog request
const SESSION_HEADER: &str = "X-Tidal-SessionId";

/// Query parameters of one request
pub type Params = Vec<(&'static str, String)>;

/// The remote catalog as seen by a request
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// GET a JSON document from a list endpoint
    async fn fetch_json(&self, endpoint: &Endpoint, params: &Params) -> Result<Value, FetchError>;

    /// GET raw bytes from an absolute URL (cover images)
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// HTTP client for the TIDAL REST API
#[derive(Clone)]
pub struct TidalClient {
    session: Arc<TidalSession>,
}

impl TidalClient {
    pub fn new(session: Arc<TidalSession>) -> Self {
        Self { session }
    }

    /// GET a URL and return the body, mapping every failure to a [`FetchError`]
    async fn get(&self, request: reqwest::RequestBuilder) -> Result<Bytes, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(http_error(status.as_u16(), &body));
        }
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(body)
    }
}

#[async_trait]
impl CatalogApi for TidalClient {
    async fn fetch_json(&self, endpoint: &Endpoint, params: &Params) -> Result<Value, FetchError> {
        let info = self.session.info().ok_or(FetchError::Unauthorized)?;
        let url = format!("{}/{}", self.session.api_url(), endpoint.path(info.user_id));
        debug!("Fetching {} {:?}", url, params);

        let request = self
            .session
            .http_client()
            .get(&url)
            .header(SESSION_HEADER, &info.session_id)
            .query(&[("countryCode", info.country_code.as_str())])
            .query(params);

        let body = self.get(request).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!("Fetching image {}", url);
        let request = self.session.http_client().get(url);
        self.get(request).await
    }
}

/// Build the error for a non-success reply. TIDAL error bodies look like
/// `{"status": 404, "subStatus": 2001, "userMessage": "..."}`.
pub(crate) fn http_error(status: u16, body: &[u8]) -> FetchError {
    if status == 401 {
        return FetchError::Unauthorized;
    }

    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            let message = v["userMessage"].as_str()?.to_string();
            Some(match v["subStatus"].as_u64() {
                Some(sub) => format!("{} ({})", message, sub),
                None => message,
            })
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    FetchError::Http { status, message }
}
