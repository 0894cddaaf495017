//! Keyring-based credential storage for TIDAL

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use keyring::Entry;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::FetchSettings;
use crate::tidal::{AuthGate, TidalSession};

const KEYRING_SERVICE: &str = "tidalfetch";

/// TIDAL account credentials and the application token used to log in
#[derive(Debug, Clone)]
pub struct TidalCredentials {
    pub username: String,
    pub password: String,
    pub api_token: String,
}

impl TidalCredentials {
    /// Build a session for these credentials. The session logs in lazily.
    pub fn session(&self, settings: &FetchSettings) -> Result<Arc<TidalSession>> {
        let session = TidalSession::new(
            &settings.api_url,
            &self.api_token,
            &self.username,
            &self.password,
            settings.timeout(),
        )?;
        Ok(Arc::new(session))
    }
}

/// Manages authentication credentials storage
pub struct AuthManager;

impl AuthManager {
    /// Authenticate with TIDAL
    ///
    /// Tries to load credentials from keyring first, or prompts for new ones.
    /// Verifies credentials work before storing.
    pub async fn authenticate(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
        force: bool,
        settings: &FetchSettings,
    ) -> Result<TidalCredentials> {
        if !force {
            if let Ok(creds) = Self::load() {
                info!("Found existing credentials in keyring");
                return Ok(creds);
            }
        } else {
            debug!("Force flag set, ignoring stored credentials");
        }

        let username = match username {
            Some(username) => username,
            None => Input::new()
                .with_prompt("TIDAL username")
                .interact_text()
                .context("Failed to read username")?,
        };

        let password = match password {
            Some(password) => password,
            None => Password::new()
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?,
        };

        let api_token = match token {
            Some(token) => token,
            None => Input::new()
                .with_prompt("Application token")
                .interact_text()
                .context("Failed to read application token")?,
        };

        let creds = TidalCredentials {
            username: username.trim().to_string(),
            password,
            api_token: api_token.trim().to_string(),
        };

        Self::verify(&creds, settings).await?;

        Self::store(&creds)?;
        info!("Credentials stored in keyring");

        Ok(creds)
    }

    /// Load credentials from keyring
    pub fn load() -> Result<TidalCredentials> {
        let username = Self::get_entry("username")?
            .get_password()
            .context("No TIDAL username in keyring")?;

        let password = Self::get_entry("password")?
            .get_password()
            .context("No TIDAL password in keyring")?;

        let api_token = Self::get_entry("token")?
            .get_password()
            .context("No TIDAL application token in keyring")?;

        Ok(TidalCredentials {
            username,
            password,
            api_token,
        })
    }

    /// Store credentials in keyring
    pub fn store(creds: &TidalCredentials) -> Result<()> {
        Self::get_entry("username")?
            .set_password(&creds.username)
            .context("Failed to store username in keyring")?;

        Self::get_entry("password")?
            .set_password(&creds.password)
            .context("Failed to store password in keyring")?;

        Self::get_entry("token")?
            .set_password(&creds.api_token)
            .context("Failed to store application token in keyring")?;

        debug!("Credentials stored in keyring");
        Ok(())
    }

    /// Clear stored credentials
    pub fn clear() -> Result<()> {
        let _ = Self::get_entry("username")?.delete_credential();
        let _ = Self::get_entry("password")?.delete_credential();
        let _ = Self::get_entry("token")?.delete_credential();
        info!("Credentials cleared from keyring");
        Ok(())
    }

    /// Verify credentials by logging in once
    async fn verify(creds: &TidalCredentials, settings: &FetchSettings) -> Result<()> {
        debug!("Verifying credentials against {}", settings.api_url);

        let session = creds.session(settings)?;
        session.login().await.context("Failed to verify credentials")?;

        info!("Credentials verified successfully");
        Ok(())
    }

    fn get_entry(key: &str) -> Result<Entry> {
        let entry_key = format!("tidal:{}", key);
        Entry::new(KEYRING_SERVICE, &entry_key).context("Failed to access keyring")
    }
}
