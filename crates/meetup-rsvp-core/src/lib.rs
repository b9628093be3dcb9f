//! Meetup RSVP core library.
//!
//! Fetches every event of a MeetupPro network and the RSVPs for each event
//! through the Meetup GraphQL API, normalizes the payloads into typed models,
//! and renders a summary report.
//!
//! - `api`: GraphQL client, HTTP transport seam, error taxonomy, raw payloads
//! - `auth`: credential check and request headers
//! - `config`: layered configuration (defaults, JSON file, environment)
//! - `fetcher`: the end-to-end run
//! - `models`: events, venues, RSVPs and the run summary
//! - `processors`: raw payload normalization
//! - `report`: text and JSON output
//! - `utils`: retry with backoff, text formatting

pub mod api;
pub mod auth;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod processors;
pub mod report;
pub mod utils;

pub use api::{ApiError, GraphQlClient};
pub use auth::{AuthError, AuthManager};
pub use config::{Config, ConfigError, ConfigManager};
pub use fetcher::{FetchError, OutputFormat, RsvpFetcher, RunStage};
pub use models::{Event, Rsvp, RsvpStatus, Summary, Venue};
