//! Reconciliation of the events listing with the calendar.
//!
//! One run sweeps stale events first, then walks every listing page and
//! inserts each scraped event under its deterministic id. Re-inserting an
//! event that already exists is rejected by the calendar with a conflict,
//! which is what keeps repeated runs idempotent.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

use super::events_page::dates::to_local_string;
use super::events_page::{PageScraper, ScrapedEvent};
use super::google_calendar::models::{EventTime, Reminders};
use super::google_calendar::{CalendarBackend, CalendarEvent};
use super::liveness::{LivenessChecker, ProbeOutcome};
use crate::config::Config;
use crate::error::BotResult;

const HTTP_CONFLICT: u16 = 409;
const HTTP_BAD_REQUEST: u16 = 400;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub events_created: usize,
    pub total_events: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub deleted: usize,
}

impl SyncSummary {
    /// Final lines shown to the user
    pub fn report(&self) -> String {
        format!(
            "{} event{} created!\nTotal events planned: {}",
            self.events_created,
            if self.events_created == 1 { "" } else { "s" },
            self.total_events
        )
    }
}

/// Outcome of a single insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Duplicate,
    Invalid,
}

pub struct CalendarSync {
    config: Config,
    backend: Arc<dyn CalendarBackend>,
    scraper: PageScraper,
    liveness: LivenessChecker,
}

impl CalendarSync {
    pub fn new(
        config: Config,
        backend: Arc<dyn CalendarBackend>,
        scraper: PageScraper,
        liveness: LivenessChecker,
    ) -> Self {
        Self {
            config,
            backend,
            scraper,
            liveness,
        }
    }

    /// Sweep, then scrape every page and create its events
    pub async fn run(&self) -> BotResult<SyncSummary> {
        let mut summary = SyncSummary {
            deleted: self.sweep().await?,
            ..Default::default()
        };

        let mut page = 0;
        let mut max_page = 0;
        loop {
            let scraped = self.scraper.scrape(page).await?;
            if page == 0 {
                max_page = scraped.max_page;
                info!("Listing has {} page(s)", max_page + 1);
            }

            summary.total_events += scraped.events.len() + scraped.skipped;
            summary.invalid += scraped.skipped;
            for event in &scraped.events {
                match self.create(event).await? {
                    CreateOutcome::Created => summary.events_created += 1,
                    CreateOutcome::Duplicate => summary.duplicates += 1,
                    CreateOutcome::Invalid => summary.invalid += 1,
                }
            }

            if page >= max_page {
                break;
            }
            page += 1;
        }

        info!(
            events_created = summary.events_created,
            total_events = summary.total_events,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            deleted = summary.deleted,
            "Sync finished"
        );
        Ok(summary)
    }

    /// Delete every scraper-owned event whose source page went away.
    ///
    /// Returns the number of deleted events.
    pub async fn sweep(&self) -> BotResult<usize> {
        let owned: Vec<CalendarEvent> = self
            .backend
            .list_events(&self.config.calendar_id)
            .await?
            .into_iter()
            .filter(|e| e.is_owned_by(&self.config.link_marker))
            .collect();

        if owned.is_empty() {
            info!("No existing events to check");
            return Ok(0);
        }

        info!("Checking {} existing events", owned.len());
        let outcomes = self.liveness.check(&owned).await;

        let mut deleted = 0;
        for (event, outcome) in owned.iter().zip(outcomes) {
            if !outcome.is_stale(self.config.stale_on_probe_error) {
                if matches!(outcome, ProbeOutcome::Unreachable(_)) {
                    warn!("Keeping {} ({})", event.summary_or_default(), outcome);
                }
                continue;
            }

            self.backend
                .delete_event(&self.config.calendar_id, &event.id)
                .await?;
            info!("Deleted event ({}): {}", outcome, event.summary_or_default());
            deleted += 1;
        }

        Ok(deleted)
    }

    /// Insert one scraped event, absorbing duplicate and invalid rejections
    pub async fn create(&self, event: &ScrapedEvent) -> BotResult<CreateOutcome> {
        let body = self.calendar_event(event);

        match self.backend.insert_event(&self.config.calendar_id, &body).await {
            Ok(_) => {
                info!("Event created: {}", event.title);
                Ok(CreateOutcome::Created)
            }
            Err(e) => match e.api_status() {
                Some(HTTP_CONFLICT) => {
                    info!("(409) Duplicate event found ({}). Skipping...", event.title);
                    Ok(CreateOutcome::Duplicate)
                }
                Some(HTTP_BAD_REQUEST) => {
                    warn!("(400) Invalid event found ({}). Skipping...", event.title);
                    Ok(CreateOutcome::Invalid)
                }
                _ => Err(e),
            },
        }
    }

    /// Calendar representation of a scraped event
    pub fn calendar_event(&self, event: &ScrapedEvent) -> CalendarEvent {
        let zone = self.config.timezone.name().to_string();
        let at = |time: &NaiveDateTime| EventTime {
            date_time: Some(to_local_string(time)),
            date: None,
            time_zone: Some(zone.clone()),
        };

        CalendarEvent {
            id: event.event_id(),
            summary: Some(event.title.clone()),
            description: Some(event.source_link.clone()),
            location: Some(event.location.clone()),
            start: Some(at(&event.start_time)),
            end: Some(at(&event.end_time)),
            reminders: Some(Reminders { use_default: true }),
        }
    }
}
