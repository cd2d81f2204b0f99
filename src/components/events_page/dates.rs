use crate::error::{BotResult, Error};
use chrono::NaiveDateTime;

/// Layout of the date part of an event time block, e.g. "Jan 5 2024"
const DATE_FORMAT: &str = "%b %d %Y";

/// Layout of a clock time, e.g. "2:00PM"
const CLOCK_FORMAT: &str = "%I:%M%p";

/// Rendering used for event start/end (naive local, no offset)
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Number of whitespace separated tokens in an event time string
pub const TIME_TOKENS: usize = 5;

fn parse_error(input: &str, reason: impl Into<String>) -> Error {
    Error::DateParse {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse "Mon D YYYY H:MMAM H:MMPM" into local start and end times
pub fn normalize(text: &str) -> BotResult<(NaiveDateTime, NaiveDateTime)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [month, day, year, start, end] = tokens.as_slice() else {
        return Err(parse_error(
            text,
            format!("expected {} tokens, found {}", TIME_TOKENS, tokens.len()),
        ));
    };

    let date = format!("{} {} {}", month, day, year);
    let format = format!("{} {}", DATE_FORMAT, CLOCK_FORMAT);

    let start_time = NaiveDateTime::parse_from_str(&format!("{} {}", date, start), &format)
        .map_err(|e| parse_error(text, format!("start time: {}", e)))?;
    let end_time = NaiveDateTime::parse_from_str(&format!("{} {}", date, end), &format)
        .map_err(|e| parse_error(text, format!("end time: {}", e)))?;

    if end_time < start_time {
        return Err(parse_error(text, "end time is before start time"));
    }

    Ok((start_time, end_time))
}

/// Normalize every string, failing on the first malformed one
pub fn normalize_all<S: AsRef<str>>(
    texts: &[S],
) -> BotResult<Vec<(NaiveDateTime, NaiveDateTime)>> {
    texts.iter().map(|t| normalize(t.as_ref())).collect()
}

/// Render a time the way the calendar expects a zone-less dateTime
pub fn to_local_string(time: &NaiveDateTime) -> String {
    time.format(LOCAL_TIMESTAMP_FORMAT).to_string()
}
