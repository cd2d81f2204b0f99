use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use super::token::{ClientSecrets, StoredToken, TokenManager};
use crate::error::{auth_error, BotResult, Error};

/// Scope needed to create, list and delete events
pub const CALENDAR_EVENTS_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

const REDIRECT_HOST: &str = "127.0.0.1";

/// Obtains a brand new token with the user's help
#[async_trait]
pub trait InteractiveAuthorizer: Send + Sync {
    async fn authorize(&self, secrets: &ClientSecrets) -> BotResult<StoredToken>;
}

/// Runs the installed-app flow: browser consent plus a local redirect listener
pub struct BrowserAuthorizer {
    tokens: TokenManager,
    redirect_port: u16,
}

impl BrowserAuthorizer {
    pub fn new(tokens: TokenManager, redirect_port: u16) -> Self {
        Self {
            tokens,
            redirect_port,
        }
    }

}

/// Loopback redirect target, same address the listener binds
pub fn redirect_uri(port: u16) -> String {
    format!("http://{}:{}", REDIRECT_HOST, port)
}

/// Consent page URL for the given client
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    state: &str,
) -> BotResult<Url> {
    let url = Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("scope", CALENDAR_EVENTS_SCOPE),
            ("state", state),
        ],
    )?;
    Ok(url)
}

/// Pull the authorization code out of the redirect request path
pub fn code_from_callback(request_path: &str, expected_state: &str) -> BotResult<String> {
    let url = Url::parse("http://localhost")?.join(request_path)?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(auth_error(&format!("Authorization denied: {}", value))),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(auth_error("Authorization callback state does not match"));
    }
    code.ok_or_else(|| auth_error("No authorization code found in callback"))
}

#[async_trait]
impl InteractiveAuthorizer for BrowserAuthorizer {
    async fn authorize(&self, secrets: &ClientSecrets) -> BotResult<StoredToken> {
        // Random state guards the callback against forged redirects
        let state = uuid::Uuid::new_v4().to_string();
        let redirect_uri = redirect_uri(self.redirect_port);
        let auth_url = authorization_url(secrets, &redirect_uri, &state)?;

        let server = tiny_http::Server::http((REDIRECT_HOST, self.redirect_port))
            .map_err(|e| auth_error(&format!("Failed to listen for the OAuth redirect: {}", e)))?;

        println!("Opening browser for Google Calendar authorization...");
        println!("If it does not open, visit: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("Could not open a browser: {}", e);
        }

        println!("Waiting for authorization callback...");
        let (_server, request) = tokio::task::spawn_blocking(move || {
            let request = server.recv();
            request.map(|r| (server, r))
        })
        .await
        .map_err(|e| auth_error(&format!("Redirect listener failed: {}", e)))??;

        let code = code_from_callback(request.url(), &state);
        let reply = match &code {
            Ok(_) => "Authorization successful! You can close this window.",
            Err(_) => "Authorization failed. Check the terminal for details.",
        };
        request.respond(tiny_http::Response::from_string(reply))?;

        let token = self.tokens.exchange_code(secrets, &code?, &redirect_uri).await?;
        info!("Received a new Google Calendar token");
        Ok(token)
    }
}

/// Produce a usable access token, re-authorizing at most once.
///
/// A valid stored token is used as is. An expired one is refreshed. When the
/// refresh fails, or nothing usable is stored, the token file is discarded
/// and the interactive flow runs a single time; if that fails too the result
/// is `Error::AuthFailure`.
pub async fn obtain_access_token(
    tokens: &TokenManager,
    interactive: &dyn InteractiveAuthorizer,
) -> BotResult<String> {
    match tokens.load_token()? {
        Some(token) if !token.is_expired() => return Ok(token.access_token),
        Some(token) if token.refresh_token.is_some() => {
            let secrets = tokens.load_secrets()?;
            match tokens.refresh(&secrets, &token).await {
                Ok(fresh) => {
                    tokens.save_token(&fresh)?;
                    info!("Refreshed Google Calendar token");
                    return Ok(fresh.access_token);
                }
                Err(e) => {
                    warn!("Token refresh failed, re-authorizing: {}", e);
                    tokens.discard_token()?;
                }
            }
        }
        Some(_) => {
            warn!("Stored token expired without a refresh token, re-authorizing");
            tokens.discard_token()?;
        }
        None => info!("No stored token, starting authorization"),
    }

    let secrets = tokens.load_secrets()?;
    let token = interactive
        .authorize(&secrets)
        .await
        .map_err(|e| Error::AuthFailure(e.to_string()))?;
    tokens.save_token(&token)?;
    Ok(token.access_token)
}
