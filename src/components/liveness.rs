//! Staleness probing of events already on the calendar.
//!
//! Pages for past or removed events stop answering 200, so each event's
//! source link is fetched and its status decides whether the event stays.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::google_calendar::CalendarEvent;
use crate::error::BotResult;

/// Result of probing one source link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered with this status
    Status(u16),
    /// No HTTP answer at all (DNS, connect, timeout, missing link)
    Unreachable(String),
}

impl ProbeOutcome {
    /// Whether the event behind this probe should be removed
    pub fn is_stale(&self, stale_on_error: bool) -> bool {
        match self {
            ProbeOutcome::Status(code) => *code != 200,
            ProbeOutcome::Unreachable(_) => stale_on_error,
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Status(code) => write!(f, "{}", code),
            ProbeOutcome::Unreachable(reason) => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Issues a single existence probe
#[async_trait]
pub trait LinkProber: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Probes links with plain GET requests
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> BotResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProber for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(e) => ProbeOutcome::Unreachable(e.to_string()),
        }
    }
}

/// Probes every event's source link concurrently
#[derive(Clone)]
pub struct LivenessChecker {
    prober: Arc<dyn LinkProber>,
}

impl LivenessChecker {
    pub fn new(prober: Arc<dyn LinkProber>) -> Self {
        Self { prober }
    }

    /// One outcome per event, in input order; waits for the whole batch
    pub async fn check(&self, events: &[CalendarEvent]) -> Vec<ProbeOutcome> {
        let probes = events.iter().map(|event| {
            let prober = Arc::clone(&self.prober);
            async move {
                match event.description.as_deref() {
                    Some(link) if !link.trim().is_empty() => {
                        let outcome = prober.probe(link.trim()).await;
                        debug!("Probe {} -> {}", link, outcome);
                        outcome
                    }
                    _ => ProbeOutcome::Unreachable("event has no source link".to_string()),
                }
            }
        });

        join_all(probes).await
    }
}
