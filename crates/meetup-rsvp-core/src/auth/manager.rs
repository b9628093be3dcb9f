use std::sync::Arc;

use reqwest::header;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, Instrument, Span};

use crate::api::raw::{join_error_messages, text_of, GraphQlEnvelope, IdentityData};
use crate::api::transport::{Transport, TransportError};

/// Sent with every request so Meetup can identify the client.
const USER_AGENT: &str = "MeetupRSVPFetcher/1.0";

const IDENTITY_QUERY: &str = r#"
query TestAuth {
  self {
    id
    name
  }
}
"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0} cannot be empty")]
    MissingCredential(&'static str),

    #[error("Authentication failed: Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication failed: Access forbidden")]
    Forbidden,

    #[error("Authentication failed: HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Authentication failed: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Api(String),

    #[error("Authentication failed: Invalid response format")]
    InvalidResponse,

    #[error("Invalid authorization header: {0}")]
    InvalidHeader(String),

    #[error("Not authenticated. Call authenticate() first.")]
    NotAuthenticated,
}

/// The caller identity returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
enum AuthState {
    Unauthenticated,
    Authenticated {
        headers: header::HeaderMap,
        user: AuthenticatedUser,
    },
}

pub struct AuthManager {
    oauth_token: String,
    endpoint: String,
    transport: Arc<dyn Transport>,
    state: RwLock<AuthState>,
    span: Span,
}

impl AuthManager {
    /// Create an unauthenticated manager. Both credentials must be non-blank.
    pub fn new(
        api_key: &str,
        oauth_token: &str,
        endpoint: &str,
        transport: Arc<dyn Transport>,
        span: Span,
    ) -> Result<Self, AuthError> {
        if api_key.trim().is_empty() {
            return Err(AuthError::MissingCredential("API key"));
        }
        if oauth_token.trim().is_empty() {
            return Err(AuthError::MissingCredential("OAuth token"));
        }

        span.in_scope(|| info!("Auth manager initialized with credentials"));

        Ok(Self {
            oauth_token: oauth_token.trim().to_string(),
            endpoint: endpoint.to_string(),
            transport,
            state: RwLock::new(AuthState::Unauthenticated),
            span,
        })
    }

    fn build_headers(&self) -> Result<header::HeaderMap, AuthError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.oauth_token))
                .map_err(|e| AuthError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        Ok(headers)
    }

    /// Validate the credentials with an identity query.
    ///
    /// Nothing here is retried: 401/403 are credential problems, and whether
    /// to retry a network failure is up to the caller.
    pub async fn authenticate(&self) -> Result<AuthenticatedUser, AuthError> {
        async {
            let headers = self.build_headers()?;
            info!("Attempting to authenticate with Meetup API");

            let result = self
                .transport
                .post_json(&self.endpoint, &headers, &json!({ "query": IDENTITY_QUERY }))
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    let reason = match e {
                        TransportError::Timeout => "Request timeout".to_string(),
                        TransportError::Connection(_) => "Connection error".to_string(),
                        TransportError::Request(msg) => format!("Network error - {}", msg),
                    };
                    error!(reason = %reason, "Authentication failed");
                    return Err(AuthError::Network(reason));
                }
            };

            match response.status {
                200 => {}
                401 => {
                    error!("Authentication failed: Invalid credentials (401)");
                    return Err(AuthError::InvalidCredentials);
                }
                403 => {
                    error!("Authentication failed: Access forbidden (403)");
                    return Err(AuthError::Forbidden);
                }
                status => {
                    error!(status, "Authentication failed: unexpected HTTP status");
                    return Err(AuthError::UnexpectedStatus(status));
                }
            }

            let envelope: GraphQlEnvelope =
                serde_json::from_str(&response.body).map_err(|_| AuthError::InvalidResponse)?;

            if let Some(errors) = envelope.errors.as_deref() {
                let messages = join_error_messages(errors, ", ");
                error!(errors = %messages, "Authentication failed with API errors");
                return Err(AuthError::Api(messages));
            }

            let identity = envelope
                .data
                .and_then(|data| serde_json::from_value::<IdentityData>(data).ok())
                .and_then(|data| data.me)
                .ok_or_else(|| {
                    error!("Authentication failed: Invalid response format");
                    AuthError::InvalidResponse
                })?;

            let mut name = text_of(&identity.name);
            if name.is_empty() {
                name = "Unknown".to_string();
            }
            let user = AuthenticatedUser {
                id: text_of(&identity.id),
                name,
            };

            *self.state.write().await = AuthState::Authenticated {
                headers,
                user: user.clone(),
            };
            info!(user = %user.name, "Authentication successful");
            Ok(user)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Copy of the cached headers; fails before a successful `authenticate()`.
    pub async fn get_auth_headers(&self) -> Result<header::HeaderMap, AuthError> {
        match &*self.state.read().await {
            AuthState::Authenticated { headers, .. } => Ok(headers.clone()),
            AuthState::Unauthenticated => Err(AuthError::NotAuthenticated),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(&*self.state.read().await, AuthState::Authenticated { .. })
    }

    pub async fn user(&self) -> Option<AuthenticatedUser> {
        match &*self.state.read().await {
            AuthState::Authenticated { user, .. } => Some(user.clone()),
            AuthState::Unauthenticated => None,
        }
    }

    /// Drop cached headers; the next API call needs a fresh `authenticate()`.
    pub async fn reset(&self) {
        *self.state.write().await = AuthState::Unauthenticated;
        self.span.in_scope(|| info!("Authentication state reset"));
    }
}
