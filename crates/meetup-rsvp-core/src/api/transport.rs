//! HTTP transport seam.
//!
//! The GraphQL client and the auth manager only need "POST this JSON with
//! these headers and tell me what came back". `Transport` captures exactly
//! that, so the retry, pagination and auth logic can be driven by a scripted
//! transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use thiserror::Error;

/// The parts of an HTTP response the API layer looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header (seconds form only).
    pub retry_after: Option<Duration>,
    pub body: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &header::HeaderMap,
        body: &Value,
    ) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
        headers
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &header::HeaderMap,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .headers(headers.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory transport for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub url: String,
        pub headers: header::HeaderMap,
        pub body: Value,
    }

    impl RecordedRequest {
        pub fn query(&self) -> &str {
            self.body["query"].as_str().unwrap_or_default()
        }

        pub fn variable(&self, name: &str) -> Option<&str> {
            self.body["variables"][name].as_str()
        }
    }

    type Handler =
        Box<dyn Fn(&RecordedRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

    pub(crate) struct MockTransport {
        handler: Handler,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockTransport {
        /// Answer each request with `handler`.
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&RecordedRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Answer requests with `responses` in order; connection errors after that.
        pub fn scripted(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
            let queue = Mutex::new(VecDeque::from(responses));
            Self::new(move |_| {
                queue
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".into())))
            })
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post_json(
            &self,
            url: &str,
            headers: &header::HeaderMap,
            body: &Value,
        ) -> Result<HttpResponse, TransportError> {
            let request = RecordedRequest {
                url: url.to_string(),
                headers: headers.clone(),
                body: body.clone(),
            };
            let response = (self.handler)(&request);
            self.requests.lock().unwrap().push(request);
            response
        }
    }

    pub(crate) fn json_response(status: u16, body: Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            retry_after: None,
            body: body.to_string(),
        })
    }

    pub(crate) fn ok(body: Value) -> Result<HttpResponse, TransportError> {
        json_response(200, body)
    }

    pub(crate) fn raw_response(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            retry_after: None,
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(ReqwestTransport::parse_retry_after(&headers), None);

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("12"));
        assert_eq!(
            ReqwestTransport::parse_retry_after(&headers),
            Some(Duration::from_secs(12))
        );

        // HTTP-date form is not supported and is ignored
        headers.insert(
            header::RETRY_AFTER,
            header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(ReqwestTransport::parse_retry_after(&headers), None);
    }
}
