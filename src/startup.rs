use crate::components::google_calendar;
use crate::components::{
    CalendarSync, HttpPageSource, HttpProber, LivenessChecker, PageScraper, SyncSummary,
};
use crate::config::Config;
use crate::error::{BotResult, Error};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,html5ever=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config once for the whole run
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => {
            info!(
                "Syncing into calendar {} ({})",
                config.calendar_id,
                config.timezone.name()
            );
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Authorize, wire up the components and run one sweep and sync pass
pub async fn run_sync(config: Config) -> BotResult<SyncSummary> {
    let client = Client::new();

    let backend = google_calendar::connect(&config, client.clone()).await?;

    let source = HttpPageSource::new(client, config.events_url());
    let scraper = PageScraper::new(Arc::new(source), config.base_url.clone());

    let prober = HttpProber::new(Duration::from_secs(config.probe_timeout_secs))?;
    let liveness = LivenessChecker::new(Arc::new(prober));

    let sync = CalendarSync::new(config, Arc::new(backend), scraper, liveness);
    sync.run().await
}
