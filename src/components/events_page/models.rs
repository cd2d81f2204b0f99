use chrono::NaiveDateTime;
use uuid::Uuid;

use super::dates::to_local_string;

/// Placeholder used when an event block has no location text
pub const MISSING_LOCATION: &str = "N/A - Check link";

/// One event block from the listing, with normalized times
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedEvent {
    pub title: String,
    pub location: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub source_link: String,
}

impl ScrapedEvent {
    /// Calendar id derived from title and times.
    ///
    /// The same listing entry always maps to the same id, so inserting it a
    /// second time is rejected by the calendar as a conflict.
    pub fn event_id(&self) -> String {
        let key = format!(
            "{}{}{}",
            self.title,
            to_local_string(&self.start_time),
            to_local_string(&self.end_time)
        );
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes())
            .to_string()
            .replace('-', "")
    }
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, Default)]
pub struct ScrapedPage {
    pub events: Vec<ScrapedEvent>,
    /// Blocks dropped because their times could not be used
    pub skipped: usize,
    /// Highest page index advertised by the pager (0 when there is none)
    pub max_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::events_page::dates::normalize;

    fn event(title: &str, times: &str) -> ScrapedEvent {
        let (start_time, end_time) = normalize(times).unwrap();
        ScrapedEvent {
            title: title.to_string(),
            location: "DRL A8".to_string(),
            start_time,
            end_time,
            source_link: "https://www.physics.upenn.edu/events/colloquium".to_string(),
        }
    }

    #[test]
    fn test_event_id_is_stable() {
        let a = event("Colloquium", "Jan 5 2024 2:00PM 3:00PM");
        let mut b = a.clone();
        b.location = "Elsewhere".to_string();
        b.source_link = "https://example.com".to_string();

        assert_eq!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_event_id_shape() {
        let id = event("Colloquium", "Jan 5 2024 2:00PM 3:00PM").event_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_event_id_differs_per_triple() {
        let base = event("Colloquium", "Jan 5 2024 2:00PM 3:00PM");
        let other_title = event("Seminar", "Jan 5 2024 2:00PM 3:00PM");
        let other_start = event("Colloquium", "Jan 5 2024 1:00PM 3:00PM");
        let other_end = event("Colloquium", "Jan 5 2024 2:00PM 4:00PM");

        assert_ne!(base.event_id(), other_title.event_id());
        assert_ne!(base.event_id(), other_start.event_id());
        assert_ne!(base.event_id(), other_end.event_id());
    }
}
