use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::models::{CalendarEvent, EventsPage};
use crate::error::{google_calendar_error, BotResult, Error};

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Largest page the events.list endpoint hands out
const LIST_PAGE_SIZE: &str = "250";

/// The calendar operations the sync needs
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// All single (expanded) events of the calendar
    async fn list_events(&self, calendar_id: &str) -> BotResult<Vec<CalendarEvent>>;

    /// Insert an event with a caller-chosen id.
    ///
    /// A rejection surfaces as `Error::GoogleCalendarApi` carrying the HTTP status,
    /// 409 for an id that already exists and 400 for an invalid event.
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> BotResult<CalendarEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> BotResult<()>;
}

/// REST client for the Google Calendar v3 API
pub struct GoogleCalendarClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(client: Client, access_token: impl Into<String>) -> Self {
        Self::with_base(client, GOOGLE_CALENDAR_API, access_token)
    }

    pub fn with_base(
        client: Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            access_token: access_token.into(),
        }
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]` with escaped segments
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> BotResult<Url> {
        let mut url = Url::parse(&self.api_base)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| google_calendar_error("API base URL cannot hold a path"))?;
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> BotResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(Error::GoogleCalendarApi { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendarClient {
    async fn list_events(&self, calendar_id: &str) -> BotResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.events_url(calendar_id, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("singleEvents", "true");
                query.append_pair("maxResults", LIST_PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.send(self.client.get(url), "fetch events").await?;
            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| {
                    google_calendar_error(&format!("Failed to parse events response: {}", e))
                })?;

            debug!("Listed {} events", page.items.len());
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> BotResult<CalendarEvent> {
        let url = self.events_url(calendar_id, None)?;
        let response = self
            .send(self.client.post(url).json(event), "insert event")
            .await?;

        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse inserted event: {}", e)))
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> BotResult<()> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        match self.send(self.client.delete(url), "delete event").await {
            Ok(_) => Ok(()),
            Err(Error::GoogleCalendarApi { status, .. }) if status == StatusCode::GONE.as_u16() => {
                warn!("Event {} was already deleted", event_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CALENDAR: &str = "abc@group.calendar.google.com";

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::with_base(Client::new(), server.uri(), "token")
    }

    #[test]
    fn test_events_url_escapes_ids() {
        let client = GoogleCalendarClient::new(Client::new(), "t");
        let url = client.events_url("a#b@group", Some("ev1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/a%23b@group/events/ev1"
        );
    }

    #[tokio::test]
    async fn test_list_events_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/calendars/{}/events", CALENDAR)))
            .and(query_param("pageToken", "second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "b"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/calendars/{}/events", CALENDAR)))
            .and(query_param("singleEvents", "true"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "a"}],
                "nextPageToken": "second"
            })))
            .mount(&server)
            .await;

        let events = client(&server).list_events(CALENDAR).await.unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_insert_conflict_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"id": "dup"})))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
            .mount(&server)
            .await;

        let event = CalendarEvent {
            id: "dup".to_string(),
            ..Default::default()
        };
        let err = client(&server).insert_event(CALENDAR, &event).await.unwrap_err();
        assert_eq!(err.api_status(), Some(409));
    }

    #[tokio::test]
    async fn test_delete_treats_gone_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/calendars/{}/events/old", CALENDAR)))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/calendars/{}/events/locked", CALENDAR)))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.delete_event(CALENDAR, "old").await.is_ok());
        assert_eq!(
            client.delete_event(CALENDAR, "locked").await.unwrap_err().api_status(),
            Some(403)
        );
    }
}
