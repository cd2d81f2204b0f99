use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{auth_error, config_error, BotResult};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Fallback lifetime when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// OAuth client registration, as downloaded from the Google console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read an installed-app (or web) client secrets file
    pub fn load(path: &Path) -> BotResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(&format!(
                "Failed to read client credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: SecretsFile = serde_json::from_str(&content)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| {
                config_error("Client credentials file has no 'installed' or 'web' section")
            })
    }
}

/// Authorized session persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer valid
    pub expires_at: i64,
}

/// Seconds before expiry at which a token is already treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

impl StoredToken {
    /// True once the token is within `EXPIRY_MARGIN_SECS` of expiring
    pub fn is_expired(&self) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS <= Utc::now().timestamp()
    }
}

/// Body returned by the OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        StoredToken {
            access_token: self.access_token,
            // Google usually only sends a refresh token on the first exchange
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now().timestamp() + expires_in,
        }
    }
}

/// Reads, refreshes and persists the OAuth token file
#[derive(Clone)]
pub struct TokenManager {
    token_path: PathBuf,
    credentials_path: PathBuf,
    client: Client,
}

impl TokenManager {
    pub fn new(config: &Config, client: Client) -> Self {
        Self::with_paths(config.token_path.clone(), config.credentials_path.clone(), client)
    }

    pub fn with_paths(token_path: PathBuf, credentials_path: PathBuf, client: Client) -> Self {
        Self {
            token_path,
            credentials_path,
            client,
        }
    }

    pub fn load_secrets(&self) -> BotResult<ClientSecrets> {
        ClientSecrets::load(&self.credentials_path)
    }

    /// Stored token, or `None` when the file is missing or unreadable
    pub fn load_token(&self) -> BotResult<Option<StoredToken>> {
        if !self.token_path.exists() {
            debug!("No token file at {}", self.token_path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.token_path)?;
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.token_path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save_token(&self, token: &StoredToken) -> BotResult<()> {
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_path, json)?;
        debug!("Saved token to {}", self.token_path.display());
        Ok(())
    }

    /// Remove the persisted session so the next run starts from scratch
    pub fn discard_token(&self) -> BotResult<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)?;
            info!("Discarded stored token {}", self.token_path.display());
        }
        Ok(())
    }

    /// Refresh an expired token
    pub async fn refresh(
        &self,
        secrets: &ClientSecrets,
        token: &StoredToken,
    ) -> BotResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| auth_error("No refresh token in token data"))?;

        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.request_token(&secrets.token_uri, &params).await?;
        Ok(response.into_stored(Some(refresh_token.to_string())))
    }

    /// Exchange an authorization code for a token
    pub async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        redirect_uri: &str,
    ) -> BotResult<StoredToken> {
        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self.request_token(&secrets.token_uri, &params).await?;
        Ok(response.into_stored(None))
    }

    async fn request_token(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
    ) -> BotResult<TokenResponse> {
        let response = self
            .client
            .post(token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Token endpoint returned HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))
    }
}
