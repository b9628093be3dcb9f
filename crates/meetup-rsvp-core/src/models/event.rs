use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invariant violations when building domain records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

fn require(value: &str, field: &'static str) -> Result<String, ModelError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ModelError::Empty(field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Yes,
    No,
    Waitlist,
}

impl RsvpStatus {
    pub const ALL: [RsvpStatus; 3] = [RsvpStatus::Yes, RsvpStatus::No, RsvpStatus::Waitlist];

    /// Parse an API response string ("YES", "no", " Waitlist ").
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(RsvpStatus::Yes),
            "no" => Some(RsvpStatus::No),
            "waitlist" => Some(RsvpStatus::Waitlist),
            _ => None,
        }
    }
}

impl std::fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RsvpStatus::Yes => write!(f, "Yes"),
            RsvpStatus::No => write!(f, "No"),
            RsvpStatus::Waitlist => write!(f, "Waitlist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Venue {
    name: String,
    address: String,
    city: String,
    state: String,
}

impl Venue {
    pub fn new(name: &str, address: &str, city: &str, state: &str) -> Result<Self, ModelError> {
        Ok(Self {
            name: require(name, "Venue name")?,
            address: address.trim().to_string(),
            city: require(city, "Venue city")?,
            state: state.trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// "Name, Address, City, State" skipping blank parts
    pub fn display_line(&self) -> String {
        [
            self.name.as_str(),
            self.address.as_str(),
            self.city.as_str(),
            self.state.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rsvp {
    member_id: String,
    member_name: String,
    response: RsvpStatus,
    response_time: DateTime<Utc>,
    guests: u32,
}

impl Rsvp {
    pub fn new(
        member_id: &str,
        member_name: &str,
        response: RsvpStatus,
        response_time: DateTime<Utc>,
        guests: u32,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            member_id: require(member_id, "Member ID")?,
            member_name: require(member_name, "Member name")?,
            response,
            response_time,
            guests,
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    pub fn response(&self) -> RsvpStatus {
        self.response
    }

    pub fn response_time(&self) -> DateTime<Utc> {
        self.response_time
    }

    pub fn guests(&self) -> u32 {
        self.guests
    }
}

/// Builder input for [`Event::new`]; keeps the constructor signature sane.
#[derive(Debug, Clone)]
pub struct EventFields<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub date_time: DateTime<Utc>,
    pub group_name: &'a str,
    pub group_id: &'a str,
    pub venue: Option<Venue>,
    pub rsvp_limit: Option<u32>,
}

/// A meetup event. Immutable once built; attaching RSVPs yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: String,
    title: String,
    description: String,
    date_time: DateTime<Utc>,
    group_name: String,
    group_id: String,
    venue: Option<Venue>,
    rsvp_limit: Option<u32>,
    rsvps: Vec<Rsvp>,
}

impl Event {
    pub fn new(fields: EventFields<'_>) -> Result<Self, ModelError> {
        Ok(Self {
            id: require(fields.id, "Event ID")?,
            title: require(fields.title, "Event title")?,
            description: fields.description.trim().to_string(),
            date_time: fields.date_time,
            group_name: require(fields.group_name, "Group name")?,
            group_id: require(fields.group_id, "Group ID")?,
            venue: fields.venue,
            rsvp_limit: fields.rsvp_limit,
            rsvps: Vec::new(),
        })
    }

    /// A copy of this event carrying `rsvps` in place of the current list.
    pub fn with_rsvps(&self, rsvps: Vec<Rsvp>) -> Self {
        Self {
            rsvps,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        self.date_time
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn venue(&self) -> Option<&Venue> {
        self.venue.as_ref()
    }

    pub fn rsvp_limit(&self) -> Option<u32> {
        self.rsvp_limit
    }

    pub fn rsvps(&self) -> &[Rsvp] {
        &self.rsvps
    }

    pub fn total_rsvps(&self) -> usize {
        self.rsvps.len()
    }

    pub fn count_with(&self, status: RsvpStatus) -> usize {
        self.rsvps.iter().filter(|r| r.response == status).count()
    }

    pub fn yes_rsvps(&self) -> usize {
        self.count_with(RsvpStatus::Yes)
    }

    pub fn no_rsvps(&self) -> usize {
        self.count_with(RsvpStatus::No)
    }

    pub fn waitlist_rsvps(&self) -> usize {
        self.count_with(RsvpStatus::Waitlist)
    }

    /// People expected at the event: each YES plus the guests they bring.
    pub fn total_attendees(&self) -> usize {
        self.rsvps
            .iter()
            .filter(|r| r.response == RsvpStatus::Yes)
            .map(|r| 1 + r.guests as usize)
            .sum()
    }
}
