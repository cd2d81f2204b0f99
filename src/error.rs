use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(physcal::config))]
    Config(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(physcal::environment))]
    Environment(String),

    #[error("Could not parse event time '{input}': {reason}")]
    #[diagnostic(
        code(physcal::date_parse),
        help("expected five tokens like 'Jan 5 2024 2:00PM 3:00PM'")
    )]
    DateParse { input: String, reason: String },

    #[error("Unexpected events page layout: {0}")]
    #[diagnostic(code(physcal::page_layout))]
    PageLayout(String),

    #[error("Scrape error: {0}")]
    #[diagnostic(code(physcal::scrape))]
    Scrape(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(physcal::google_calendar))]
    GoogleCalendar(String),

    #[error("Google Calendar API returned HTTP {status}: {body}")]
    #[diagnostic(code(physcal::google_calendar_api))]
    GoogleCalendarApi { status: u16, body: String },

    #[error("Authorization error: {0}")]
    #[diagnostic(code(physcal::auth))]
    Auth(String),

    #[error("Authorization failed after re-authenticating: {0}")]
    #[diagnostic(
        code(physcal::auth_failure),
        help("run get_calendar_token to authorize manually")
    )]
    AuthFailure(String),

    #[error(transparent)]
    #[diagnostic(code(physcal::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(physcal::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(physcal::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Other(format!("HTTP error: {}", err))
    }
}

impl Error {
    /// HTTP status of a Google Calendar API rejection, if this is one
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Error::GoogleCalendarApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create errors for bad environment variables
pub fn env_error(var: &str, reason: &str) -> Error {
    Error::Environment(format!("{}: {}", var, reason))
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create scrape errors
pub fn scrape_error(message: &str) -> Error {
    Error::Scrape(message.to_string())
}

/// Helper to create auth errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}
