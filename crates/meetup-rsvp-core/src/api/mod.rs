//! GraphQL API client module for the Meetup API.
//!
//! This module provides the `GraphQlClient` for fetching MeetupPro network
//! events and per-event RSVPs, plus the typed raw payload shapes those
//! queries return.
//!
//! Requests carry an OAuth bearer token obtained through the
//! [`AuthManager`](crate::auth::AuthManager).

pub mod client;
pub mod error;
pub mod raw;
pub mod transport;

pub use client::{ApiStats, GraphQlClient, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use raw::{RawEvent, RawGroup, RawMember, RawRsvp, RawScalar, RawVenue};
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportError};
