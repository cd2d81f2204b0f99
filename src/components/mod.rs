//! The pieces of a sync run, from page scraping up to reconciliation.

pub mod events_page;
pub mod google_calendar;
pub mod liveness;
pub mod sync;

// Re-export the entry points used by startup
pub use events_page::{HttpPageSource, PageScraper};
pub use google_calendar::GoogleCalendarClient;
pub use liveness::{HttpProber, LivenessChecker};
pub use sync::{CalendarSync, SyncSummary};
