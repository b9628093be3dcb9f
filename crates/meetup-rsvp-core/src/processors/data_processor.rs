use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, info, warn, Span};

use crate::api::raw::{text_of, RawEvent, RawRsvp, RawScalar, RawVenue};
use crate::models::{Event, EventFields, ModelError, Rsvp, RsvpStatus, Summary, Venue};

/// Placeholder when the API omits a group's display name.
const UNKNOWN_GROUP: &str = "Unknown Group";

/// Placeholder when the API omits a venue's city.
const UNKNOWN_CITY: &str = "Unknown City";

/// Placeholder when the API omits a member's display name.
const UNKNOWN_MEMBER: &str = "Unknown Member";

/// Naive layouts tried after RFC 3339 and explicit offsets; read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Why a single raw record was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid dateTime format: {0}")]
    InvalidDateTime(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Parse the datetime shapes the Meetup API has been seen to send.
///
/// Tries RFC 3339, then `%Y-%m-%dT%H:%M:%S%z`, then naive date-times and a
/// bare date (interpreted as UTC), and finally a Unix timestamp in seconds.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ProcessError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProcessError::InvalidDateTime(
            "Datetime string cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Some(dt) = value
        .parse::<f64>()
        .ok()
        .filter(|ts| ts.is_finite())
        .and_then(|ts| {
            let secs = ts.floor();
            let nanos = ((ts - secs) * 1e9) as u32;
            Utc.timestamp_opt(secs as i64, nanos).single()
        })
    {
        return Ok(dt);
    }

    Err(ProcessError::InvalidDateTime(format!(
        "Unable to parse datetime: {}",
        value
    )))
}

/// Turns raw API payloads into validated domain records.
///
/// Every operation is per-record tolerant: a record that cannot be turned
/// into a valid model is logged and skipped, never failing the batch.
pub struct DataProcessor {
    span: Span,
}

impl DataProcessor {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn process_events(&self, raw_events: &[RawEvent]) -> Vec<Event> {
        let _enter = self.span.enter();

        let events: Vec<Event> = raw_events
            .iter()
            .filter_map(|raw| match Self::process_event(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(event_id = %raw.label(), error = %e, "Failed to process event");
                    None
                }
            })
            .collect();

        info!(
            processed = events.len(),
            total = raw_events.len(),
            "Processed events"
        );
        events
    }

    fn process_event(raw: &RawEvent) -> Result<Event, ProcessError> {
        let id = text_of(&raw.id);
        if id.is_empty() {
            return Err(ProcessError::MissingField("id"));
        }
        let title = text_of(&raw.title);
        if title.is_empty() {
            return Err(ProcessError::MissingField("title"));
        }
        let date_time = match raw.date_time.as_ref().map(RawScalar::as_text) {
            Some(text) if !text.is_empty() => parse_datetime(&text)?,
            _ => return Err(ProcessError::MissingField("dateTime")),
        };

        let group = raw.group.clone().unwrap_or_default();
        let group_id = text_of(&group.id);
        if group_id.is_empty() {
            return Err(ProcessError::MissingField("group.id"));
        }
        let mut group_name = text_of(&group.name);
        if group_name.is_empty() {
            group_name = UNKNOWN_GROUP.to_string();
        }

        let rsvp_limit = raw
            .max_tickets
            .as_ref()
            .and_then(RawScalar::as_i64)
            .and_then(|limit| u32::try_from(limit).ok());

        let event = Event::new(EventFields {
            id: &id,
            title: &title,
            description: &text_of(&raw.description),
            date_time,
            group_name: &group_name,
            group_id: &group_id,
            venue: raw.venue.as_ref().and_then(Self::process_venue),
            rsvp_limit,
        })?;
        Ok(event)
    }

    /// `None` when there is no usable venue; a nameless venue counts as none.
    fn process_venue(raw: &RawVenue) -> Option<Venue> {
        let name = text_of(&raw.name);
        if name.is_empty() {
            return None;
        }
        let mut city = text_of(&raw.city);
        if city.is_empty() {
            city = UNKNOWN_CITY.to_string();
        }

        match Venue::new(&name, &text_of(&raw.address), &city, &text_of(&raw.state)) {
            Ok(venue) => Some(venue),
            Err(e) => {
                warn!(error = %e, "Failed to process venue data");
                None
            }
        }
    }

    pub fn process_rsvps(&self, raw_rsvps: &[RawRsvp]) -> Vec<Rsvp> {
        let _enter = self.span.enter();

        let rsvps: Vec<Rsvp> = raw_rsvps
            .iter()
            .filter_map(|raw| match Self::process_rsvp(raw) {
                Ok(rsvp) => Some(rsvp),
                Err(e) => {
                    warn!(rsvp_id = %raw.label(), error = %e, "Failed to process RSVP");
                    None
                }
            })
            .collect();

        debug!(
            processed = rsvps.len(),
            total = raw_rsvps.len(),
            "Processed RSVPs"
        );
        rsvps
    }

    fn process_rsvp(raw: &RawRsvp) -> Result<Rsvp, ProcessError> {
        let response_text = text_of(&raw.response);
        if response_text.is_empty() {
            return Err(ProcessError::MissingField("response"));
        }

        let member = raw.member.clone().unwrap_or_default();
        let member_id = text_of(&member.id);
        if member_id.is_empty() {
            return Err(ProcessError::MissingField("member.id"));
        }
        let mut member_name = text_of(&member.name);
        if member_name.is_empty() {
            member_name = UNKNOWN_MEMBER.to_string();
        }

        let response = RsvpStatus::parse(&response_text).unwrap_or_else(|| {
            warn!(response = %response_text, "Unknown RSVP response type, defaulting to 'no'");
            RsvpStatus::No
        });

        let response_time = match parse_datetime(&text_of(&raw.created)) {
            Ok(dt) => dt,
            Err(_) => {
                warn!(rsvp_id = %raw.label(), "Invalid response time for RSVP, using current time");
                Utc::now()
            }
        };

        let guests = raw
            .guests
            .as_ref()
            .and_then(RawScalar::as_i64)
            .map(|g| u32::try_from(g.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0);

        Ok(Rsvp::new(
            &member_id,
            &member_name,
            response,
            response_time,
            guests,
        )?)
    }

    /// Aggregate statistics over the final event list.
    pub fn generate_summary(&self, events: &[Event]) -> Summary {
        let _enter = self.span.enter();

        let (Some(first), Some(last)) = (
            events.iter().map(Event::date_time).min(),
            events.iter().map(Event::date_time).max(),
        ) else {
            debug!("No events, returning empty summary");
            return Summary::empty(Utc::now());
        };

        let mut rsvp_breakdown: BTreeMap<RsvpStatus, usize> =
            RsvpStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut events_by_group: BTreeMap<String, usize> = BTreeMap::new();

        for event in events {
            for rsvp in event.rsvps() {
                *rsvp_breakdown.entry(rsvp.response()).or_insert(0) += 1;
            }
            *events_by_group
                .entry(event.group_name().to_string())
                .or_insert(0) += 1;
        }

        let summary = Summary {
            total_events: events.len(),
            total_rsvps: events.iter().map(Event::total_rsvps).sum(),
            rsvp_breakdown,
            events_by_group,
            date_range: (first, last),
        };

        info!(
            total_events = summary.total_events,
            total_rsvps = summary.total_rsvps,
            groups = summary.events_by_group.len(),
            "Generated summary"
        );
        summary
    }
}
