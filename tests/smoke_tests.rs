use async_trait::async_trait;
use physcal::components::events_page::dates::{normalize, normalize_all, to_local_string};
use physcal::components::google_calendar::token::ClientSecrets;
use physcal::components::google_calendar::{
    obtain_access_token, InteractiveAuthorizer, StoredToken, TokenManager,
};
use physcal::config::Config;
use physcal::error::{auth_error, BotResult, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Authorizer that counts attempts instead of opening a browser
struct CountingAuthorizer {
    calls: AtomicUsize,
    succeed: bool,
}

impl CountingAuthorizer {
    fn new(succeed: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            succeed,
        }
    }
}

#[async_trait]
impl InteractiveAuthorizer for CountingAuthorizer {
    async fn authorize(&self, _secrets: &ClientSecrets) -> BotResult<StoredToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(StoredToken {
                access_token: "interactive".to_string(),
                refresh_token: Some("new-refresh".to_string()),
                expires_at: chrono::Utc::now().timestamp() + 3600,
            })
        } else {
            Err(auth_error("user closed the browser"))
        }
    }
}

fn write_credentials(dir: &tempfile::TempDir, token_uri: &str) {
    std::fs::write(
        dir.path().join("credentials.json"),
        format!(
            r#"{{"installed": {{"client_id": "cid", "client_secret": "cs", "token_uri": "{}"}}}}"#,
            token_uri
        ),
    )
    .unwrap();
}

fn token_manager(dir: &tempfile::TempDir) -> TokenManager {
    TokenManager::with_paths(
        dir.path().join("token.json"),
        dir.path().join("credentials.json"),
        reqwest::Client::new(),
    )
}

/// Smoke test to verify that the settings file is loaded once into a config
#[test]
fn test_config_loads_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("cal.json");
    std::fs::write(&settings, r#"{"calendarId": "test_calendar_id"}"#).unwrap();

    let config = Config::from_settings_file(
        &settings,
        dir.path().join("token.json"),
        dir.path().join("credentials.json"),
    )
    .unwrap();

    assert_eq!(config.calendar_id, "test_calendar_id");
    assert_eq!(config.timezone.name(), "America/New_York");
    assert_eq!(config.redirect_port, 8080);
}

/// Smoke test for the date normalizer on listing-shaped input
#[test]
fn test_dates_normalize() {
    let pairs =
        normalize_all(&["Jan 5 2024 2:00PM 3:00PM", "Nov 30 2025 11:00AM 12:00PM"]).unwrap();
    assert_eq!(to_local_string(&pairs[0].0), "2024-01-05T14:00:00");
    assert_eq!(to_local_string(&pairs[1].1), "2025-11-30T12:00:00");
    assert!(matches!(normalize("Jan 5"), Err(Error::DateParse { .. })));
}

/// A valid stored token is used without any network traffic
#[tokio::test]
async fn test_valid_token_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(&dir, "http://127.0.0.1:1/token");
    let tokens = token_manager(&dir);
    tokens
        .save_token(&StoredToken {
            access_token: "cached".to_string(),
            refresh_token: None,
            expires_at: chrono::Utc::now().timestamp() + 600,
        })
        .unwrap();

    let authorizer = CountingAuthorizer::new(true);
    let access = obtain_access_token(&tokens, &authorizer).await.unwrap();

    assert_eq!(access, "cached");
    assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
}

/// A valid stored token does not need the client credentials file
#[tokio::test]
async fn test_valid_token_without_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let tokens = token_manager(&dir);
    tokens
        .save_token(&StoredToken {
            access_token: "cached".to_string(),
            refresh_token: None,
            expires_at: chrono::Utc::now().timestamp() + 600,
        })
        .unwrap();

    let authorizer = CountingAuthorizer::new(true);
    let access = obtain_access_token(&tokens, &authorizer).await.unwrap();

    assert_eq!(access, "cached");
    assert!(!dir.path().join("credentials.json").exists());
}

/// Expired token with a refresh token is refreshed silently and persisted
#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "refreshed",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_credentials(&dir, &format!("{}/token", server.uri()));
    let tokens = token_manager(&dir);
    tokens
        .save_token(&StoredToken {
            access_token: "old".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: 0,
        })
        .unwrap();

    let authorizer = CountingAuthorizer::new(true);
    let access = obtain_access_token(&tokens, &authorizer).await.unwrap();

    assert_eq!(access, "refreshed");
    assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
    let stored = tokens.load_token().unwrap().unwrap();
    assert_eq!(stored.access_token, "refreshed");
    assert_eq!(stored.refresh_token.as_deref(), Some("r"));
}

/// Refresh failure discards the token and re-authorizes exactly once
#[tokio::test]
async fn test_refresh_failure_reauthorizes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_credentials(&dir, &format!("{}/token", server.uri()));
    let tokens = token_manager(&dir);
    let revoked = StoredToken {
        access_token: "old".to_string(),
        refresh_token: Some("revoked".to_string()),
        expires_at: 0,
    };

    tokens.save_token(&revoked).unwrap();
    let authorizer = CountingAuthorizer::new(true);
    let access = obtain_access_token(&tokens, &authorizer).await.unwrap();
    assert_eq!(access, "interactive");
    assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.load_token().unwrap().unwrap().access_token, "interactive");

    // Second failure in a row ends the run instead of looping
    tokens.save_token(&revoked).unwrap();
    let failing = CountingAuthorizer::new(false);
    let result = obtain_access_token(&tokens, &failing).await;
    assert!(matches!(result, Err(Error::AuthFailure(_))));
    assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tokens.load_token().unwrap(), None);
}

/// Missing token file goes straight to the interactive flow
#[tokio::test]
async fn test_missing_token_starts_authorization() {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(&dir, "http://127.0.0.1:1/token");
    let tokens = token_manager(&dir);

    let authorizer = CountingAuthorizer::new(true);
    obtain_access_token(&tokens, &authorizer).await.unwrap();

    assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("token.json").exists());
}
