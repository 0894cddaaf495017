//! TIDAL session login
//!
//! A [`TidalSession`] is shared by every request of the process. Requests
//! only ask it whether it is logged in and, if not, wait on [`AuthGate::login`];
//! each request keeps its own pending-login flag.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

use super::client::http_error;
use super::error::{FetchError, LoginError};

/// Client identifier
pub const CLIENT_NAME: &str = "tidalfetch";

/// Header carrying the application token on login
const TOKEN_HEADER: &str = "X-Tidal-Token";

/// Session state handed out by the server on login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: u64,
    pub country_code: String,
}

impl SessionInfo {
    /// Read the session out of a `login/username` reply
    pub fn from_reply(value: &Value) -> Result<Self, LoginError> {
        let session_id = value["sessionId"]
            .as_str()
            .ok_or(LoginError::IncompleteReply("sessionId"))?;
        let user_id = value["userId"]
            .as_u64()
            .ok_or(LoginError::IncompleteReply("userId"))?;
        let country_code = value["countryCode"]
            .as_str()
            .ok_or(LoginError::IncompleteReply("countryCode"))?;

        Ok(Self {
            session_id: session_id.to_string(),
            user_id,
            country_code: country_code.to_string(),
        })
    }
}

/// Gate every request has to pass before talking to the catalog
#[async_trait]
pub trait AuthGate: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Log in, resolving once the attempt has succeeded or failed
    async fn login(&self) -> Result<(), LoginError>;
}

/// Username/password session against the TIDAL API
pub struct TidalSession {
    api_url: String,
    api_token: String,
    username: String,
    password: String,
    http_client: Client,
    info: RwLock<Option<SessionInfo>>,
    login_lock: tokio::sync::Mutex<()>,
}

impl TidalSession {
    pub fn new(
        api_url: &str,
        api_token: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("tidalfetch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            http_client,
            info: RwLock::new(None),
            login_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Current session, if logged in
    pub fn info(&self) -> Option<SessionInfo> {
        self.info.read().ok().and_then(|guard| guard.clone())
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    async fn request_session(&self) -> Result<SessionInfo, LoginError> {
        if self.username.is_empty() || self.password.is_empty() || self.api_token.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let url = format!("{}/login/username", self.api_url);
        debug!("Logging in as {} at {}", self.username, url);

        let response = self
            .http_client
            .post(&url)
            .header(TOKEN_HEADER, &self.api_token)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("clientVersion", CLIENT_NAME),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(http_error(status.as_u16(), &body).into());
        }
        if body.is_empty() {
            return Err(FetchError::EmptyBody.into());
        }

        let value: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        SessionInfo::from_reply(&value)
    }
}

#[async_trait]
impl AuthGate for TidalSession {
    fn is_authenticated(&self) -> bool {
        self.info
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    async fn login(&self) -> Result<(), LoginError> {
        // Requests racing into login share the first attempt's session
        let _guard = self.login_lock.lock().await;
        if self.is_authenticated() {
            return Ok(());
        }

        let info = self.request_session().await?;
        info!("Logged in as user {} ({})", info.user_id, info.country_code);

        if let Ok(mut slot) = self.info.write() {
            *slot = Some(info);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_from_reply() {
        let reply = json!({ "userId": 1234, "sessionId": "abc-def", "countryCode": "NO" });
        let info = SessionInfo::from_reply(&reply).unwrap();
        assert_eq!(info.user_id, 1234);
        assert_eq!(info.session_id, "abc-def");
        assert_eq!(info.country_code, "NO");
    }

    #[test]
    fn test_session_from_incomplete_reply() {
        let reply = json!({ "userId": 1234, "countryCode": "NO" });
        assert_eq!(
            SessionInfo::from_reply(&reply),
            Err(LoginError::IncompleteReply("sessionId"))
        );
    }

    #[tokio::test]
    async fn test_login_without_credentials() {
        let session =
            TidalSession::new("http://127.0.0.1:9", "", "user", "", Duration::from_secs(1)).unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.login().await, Err(LoginError::MissingCredentials));
        assert!(!session.is_authenticated());
        assert!(session.info().is_none());
    }
}
