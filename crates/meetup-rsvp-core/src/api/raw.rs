//! Typed shapes of the GraphQL payloads this crate consumes.
//!
//! Everything here is deliberately lenient: every field is optional and
//! scalars accept strings, numbers or booleans. Validation happens later in
//! the data processor, which turns these into domain records.

use serde::Deserialize;
use serde_json::Value;

/// A JSON scalar as the API happens to send it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl RawScalar {
    /// Trimmed string form of the value
    pub fn as_text(&self) -> String {
        match self {
            RawScalar::Text(s) => s.trim().to_string(),
            RawScalar::Integer(n) => n.to_string(),
            RawScalar::Float(f) => f.to_string(),
            RawScalar::Bool(b) => b.to_string(),
        }
    }

    /// Integer form; floats are truncated, numeric strings are parsed
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawScalar::Integer(n) => Some(*n),
            RawScalar::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            RawScalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for RawScalar {
    fn from(value: &str) -> Self {
        RawScalar::Text(value.to_string())
    }
}

impl From<i64> for RawScalar {
    fn from(value: i64) -> Self {
        RawScalar::Integer(value)
    }
}

/// Text of an optional scalar, empty when absent
pub(crate) fn text_of(value: &Option<RawScalar>) -> String {
    value.as_ref().map(RawScalar::as_text).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawGroup {
    pub id: Option<RawScalar>,
    pub name: Option<RawScalar>,
    pub urlname: Option<RawScalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVenue {
    pub name: Option<RawScalar>,
    pub address: Option<RawScalar>,
    pub city: Option<RawScalar>,
    pub state: Option<RawScalar>,
}

/// One `eventsSearch` node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: Option<RawScalar>,
    pub title: Option<RawScalar>,
    pub description: Option<RawScalar>,
    pub date_time: Option<RawScalar>,
    pub group: Option<RawGroup>,
    pub venue: Option<RawVenue>,
    pub max_tickets: Option<RawScalar>,
}

impl RawEvent {
    /// Identifier for log lines
    pub fn label(&self) -> String {
        self.id
            .as_ref()
            .map(RawScalar::as_text)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMember {
    pub id: Option<RawScalar>,
    pub name: Option<RawScalar>,
}

/// One `rsvps` node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRsvp {
    pub id: Option<RawScalar>,
    pub response: Option<RawScalar>,
    pub created: Option<RawScalar>,
    pub guests: Option<RawScalar>,
    pub member: Option<RawMember>,
}

impl RawRsvp {
    /// Identifier for log lines
    pub fn label(&self) -> String {
        self.id
            .as_ref()
            .map(RawScalar::as_text)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// ============================================================================
// Envelope and pagination shapes (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope {
    pub data: Option<Value>,
    pub errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlErrorEntry {
    pub message: Option<String>,
}

/// "msg one; msg two" from an `errors[]` array
pub(crate) fn join_error_messages(errors: &[GraphQlErrorEntry], separator: &str) -> String {
    errors
        .iter()
        .map(|e| e.message.as_deref().unwrap_or("Unknown error"))
        .collect::<Vec<_>>()
        .join(separator)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge {
    pub node: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Connection {
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub edges: Option<Vec<Edge>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NetworkEventsData {
    pub pro_network_by_urlname: Option<ProNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProNetwork {
    pub events_search: Connection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRsvpsData {
    pub event: Option<EventRsvps>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRsvps {
    pub rsvps: Option<Connection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdentityData {
    #[serde(rename = "self")]
    pub me: Option<Identity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Identity {
    pub id: Option<RawScalar>,
    pub name: Option<RawScalar>,
}
