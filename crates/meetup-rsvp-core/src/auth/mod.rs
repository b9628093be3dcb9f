//! Authentication with the Meetup GraphQL API.
//!
//! `AuthManager` validates the configured credentials once with an identity
//! query, then hands out copies of the resulting header set until reset.

pub mod manager;

pub use manager::{AuthError, AuthManager, AuthenticatedUser};
