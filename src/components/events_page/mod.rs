//! Scraping of the department events listing.

pub mod dates;
pub mod models;
pub mod page;

pub use models::{ScrapedEvent, ScrapedPage};
pub use page::{HttpPageSource, PageScraper, PageSource};
