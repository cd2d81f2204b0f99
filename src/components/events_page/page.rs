use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dates::normalize;
use super::models::{ScrapedEvent, ScrapedPage, MISSING_LOCATION};
use crate::error::{scrape_error, BotResult, Error};

/// Number of `<time>` nodes the listing renders per event block
/// (month, day, year, start clock, end clock)
pub const TIME_NODES_PER_EVENT: usize = 5;

const TITLE_SELECTOR: &str = "h3.events-title";
const TITLE_LINK_SELECTOR: &str = "a";
const TIME_SELECTOR: &str = "time";
const LOCATION_SELECTOR: &str = "div.metainfo";
const LAST_PAGE_SELECTOR: &str = "li.pager__item--last a";

/// Source of raw listing HTML, one page at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> BotResult<String>;
}

/// Fetches listing pages over HTTP
pub struct HttpPageSource {
    client: Client,
    events_url: String,
}

impl HttpPageSource {
    pub fn new(client: Client, events_url: impl Into<String>) -> Self {
        Self {
            client,
            events_url: events_url.into(),
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> BotResult<String> {
        debug!("Fetching events page {}", page);

        let response = self
            .client
            .get(&self.events_url)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| scrape_error(&format!("Failed to fetch page {}: {}", page, e)))?;

        if !response.status().is_success() {
            return Err(scrape_error(&format!(
                "Events page {} returned HTTP {}",
                page,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| scrape_error(&format!("Failed to read page {}: {}", page, e)))
    }
}

/// Turns listing pages into scraped events
#[derive(Clone)]
pub struct PageScraper {
    source: Arc<dyn PageSource>,
    base_url: String,
}

impl PageScraper {
    pub fn new(source: Arc<dyn PageSource>, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
        }
    }

    /// Fetch and parse one listing page
    pub async fn scrape(&self, page: u32) -> BotResult<ScrapedPage> {
        let html = self.source.fetch_page(page).await?;
        let scraped = parse_page(&html, &self.base_url)?;
        info!(
            "Page {}: found {} events, skipped {}",
            page,
            scraped.events.len(),
            scraped.skipped
        );
        Ok(scraped)
    }
}

fn selector(css: &str) -> BotResult<Selector> {
    Selector::parse(css).map_err(|e| scrape_error(&format!("Invalid selector '{}': {:?}", css, e)))
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

/// Extract every event block and the pager bound from listing HTML
pub fn parse_page(html: &str, base_url: &str) -> BotResult<ScrapedPage> {
    let document = Html::parse_document(html);

    let title_selector = selector(TITLE_SELECTOR)?;
    let link_selector = selector(TITLE_LINK_SELECTOR)?;

    let mut titles = Vec::new();
    let mut links = Vec::new();
    for heading in document.select(&title_selector) {
        let anchor = heading.select(&link_selector).next().ok_or_else(|| {
            Error::PageLayout(format!(
                "event title without a link: '{}'",
                text_of(&heading).trim()
            ))
        })?;
        titles.push(text_of(&anchor).trim().to_string());

        let href = anchor.value().attr("href").unwrap_or_default();
        links.push(absolute_link(base_url, href));
    }

    let locations: Vec<String> = document
        .select(&selector(LOCATION_SELECTOR)?)
        .map(|div| {
            let text = text_of(&div);
            let last_line = text.rsplit('\n').next().unwrap_or_default().trim();
            if last_line.is_empty() {
                MISSING_LOCATION.to_string()
            } else {
                last_line.to_string()
            }
        })
        .collect();

    let time_nodes: Vec<String> = document
        .select(&selector(TIME_SELECTOR)?)
        .map(|t| text_of(&t).trim().to_string())
        .collect();
    let time_strings = group_time_nodes(&time_nodes)?;

    if time_strings.len() != titles.len() || locations.len() != titles.len() {
        return Err(Error::PageLayout(format!(
            "{} titles, {} locations and {} time blocks do not line up",
            titles.len(),
            locations.len(),
            time_strings.len()
        )));
    }

    let mut events = Vec::with_capacity(titles.len());
    let mut skipped = 0;
    for (((title, location), times), source_link) in titles
        .into_iter()
        .zip(locations)
        .zip(time_strings)
        .zip(links)
    {
        let (start_time, end_time) = match normalize(&times) {
            Ok(pair) => pair,
            Err(e @ Error::DateParse { .. }) => {
                warn!("Skipping '{}': {}", title, e);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        events.push(ScrapedEvent {
            title,
            location,
            start_time,
            end_time,
            source_link,
        });
    }

    Ok(ScrapedPage {
        events,
        skipped,
        max_page: max_page(&document)?,
    })
}

/// Join the flat list of time nodes into one string per event.
///
/// Event `k` owns nodes `k * TIME_NODES_PER_EVENT ..` up to the next block.
pub fn group_time_nodes(nodes: &[String]) -> BotResult<Vec<String>> {
    if nodes.len() % TIME_NODES_PER_EVENT != 0 {
        return Err(Error::PageLayout(format!(
            "found {} time nodes, expected a multiple of {}",
            nodes.len(),
            TIME_NODES_PER_EVENT
        )));
    }

    Ok(nodes
        .chunks_exact(TIME_NODES_PER_EVENT)
        .map(|group| group.join(" "))
        .collect())
}

fn absolute_link(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", base_url, href)
    }
}

/// Highest page index from the "last page" pager link, 0 when absent
fn max_page(document: &Html) -> BotResult<u32> {
    let Some(link) = document.select(&selector(LAST_PAGE_SELECTOR)?).next() else {
        return Ok(0);
    };

    let href = link.value().attr("href").unwrap_or_default();
    match href.rsplit('=').next().and_then(|v| v.trim().parse::<u32>().ok()) {
        Some(max) => Ok(max),
        None => {
            warn!("Could not read last page from pager link '{}', assuming one page", href);
            Ok(0)
        }
    }
}
