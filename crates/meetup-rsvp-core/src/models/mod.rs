//! Domain models for the RSVP report.
//!
//! - `Event`, `Venue`, `Rsvp`, `RsvpStatus`: validated records built by the
//!   data processor from raw API payloads
//! - `Summary`: aggregate statistics across all events in a run

pub mod event;
pub mod summary;

pub use event::{Event, EventFields, ModelError, Rsvp, RsvpStatus, Venue};
pub use summary::Summary;
