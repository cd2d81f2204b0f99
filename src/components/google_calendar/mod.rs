pub mod api;
pub mod auth;
pub mod models;
pub mod token;

pub use api::{CalendarBackend, GoogleCalendarClient};
pub use auth::{obtain_access_token, BrowserAuthorizer, InteractiveAuthorizer};
pub use models::CalendarEvent;
pub use token::{StoredToken, TokenManager};

use crate::config::Config;
use crate::error::BotResult;
use reqwest::Client;
use tracing::info;

/// Authorize (refreshing or re-consenting as needed) and build an API client
pub async fn connect(config: &Config, client: Client) -> BotResult<GoogleCalendarClient> {
    let tokens = TokenManager::new(config, client.clone());
    let authorizer = BrowserAuthorizer::new(tokens.clone(), config.redirect_port);

    let access_token = obtain_access_token(&tokens, &authorizer).await?;
    info!("Connected to Google Calendar");

    Ok(GoogleCalendarClient::new(client, access_token))
}
