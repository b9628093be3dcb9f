//! GraphQL client for the Meetup API.
//!
//! `GraphQlClient` issues single GraphQL round trips through the
//! [`RetryExecutor`] and builds the two paginated reads the fetcher needs:
//! all events of a MeetupPro network, and all RSVPs of one event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::auth::AuthManager;
use crate::utils::{RetryConfig, RetryExecutor, Retryable};

use super::raw::{
    join_error_messages, Connection, EventRsvpsData, GraphQlEnvelope, NetworkEventsData,
    RawEvent, RawRsvp,
};
use super::transport::Transport;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.meetup.com/gql";

/// Pause between page requests so long paginations stay gentle on the API.
const PAGE_DELAY_MS: u64 = 100;

const NETWORK_EVENTS_QUERY: &str = r#"
query GetNetworkEvents($networkId: ID!, $after: String) {
  proNetworkByUrlname(urlname: $networkId) {
    eventsSearch(first: 50, after: $after) {
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          id
          title
          description
          dateTime
          group {
            id
            name
            urlname
          }
          venue {
            name
            address
            city
            state
          }
          maxTickets
        }
      }
    }
  }
}
"#;

const EVENT_RSVPS_QUERY: &str = r#"
query GetEventRSVPs($eventId: ID!, $after: String) {
  event(id: $eventId) {
    id
    title
    rsvps(first: 100, after: $after) {
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          id
          response
          created
          guests
          member {
            id
            name
          }
        }
      }
    }
  }
}
"#;

/// Snapshot of call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiStats {
    pub total_calls: u64,
    pub failed_calls: u64,
}

impl ApiStats {
    /// Percentage of calls that did not fail fatally; 0 when nothing was called
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.total_calls - self.failed_calls) as f64 / self.total_calls as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    total: AtomicU64,
    failed: AtomicU64,
}

pub struct GraphQlClient {
    transport: Arc<dyn Transport>,
    auth: Arc<AuthManager>,
    endpoint: String,
    retry: RetryExecutor,
    page_delay: Duration,
    counters: CallCounters,
    span: Span,
}

impl GraphQlClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<AuthManager>,
        endpoint: &str,
        retry_config: RetryConfig,
        span: Span,
    ) -> Self {
        span.in_scope(|| info!(retry = %retry_config, "GraphQL client initialized"));
        Self {
            transport,
            auth,
            endpoint: endpoint.to_string(),
            retry: RetryExecutor::new(retry_config),
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            counters: CallCounters::default(),
            span,
        }
    }

    /// Override the pause between page requests
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn stats(&self) -> ApiStats {
        ApiStats {
            total_calls: self.counters.total.load(Ordering::Relaxed),
            failed_calls: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Log final statistics. The connection pool itself is released on drop.
    pub fn close(&self) {
        let stats = self.stats();
        self.span.in_scope(|| {
            info!(
                total_calls = stats.total_calls,
                failed_calls = stats.failed_calls,
                success_rate = stats.success_rate(),
                "GraphQL client closed"
            )
        });
    }

    async fn headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = self.auth.get_auth_headers().await.map_err(|e| {
            error!(error = %e, "Failed to get authentication headers");
            ApiError::Auth(e)
        })?;
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    /// Execute a GraphQL query with retries, returning its `data` member.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        let payload = json!({ "query": query, "variables": variables });
        self.retry
            .execute(|| self.execute_once(&payload))
            .instrument(self.span.clone())
            .await
            .map_err(ApiError::from)
    }

    async fn execute_once(&self, payload: &Value) -> Result<Value, ApiError> {
        let attempt = self.counters.total.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(call = attempt, variables = %payload["variables"], "Executing GraphQL query");

        let result = self.round_trip(payload).await;
        if let Err(ref e) = result {
            if !e.is_retryable() {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// One HTTP call plus response classification, in precedence order.
    async fn round_trip(&self, payload: &Value) -> Result<Value, ApiError> {
        let headers = self.headers().await?;

        let response = self
            .transport
            .post_json(&self.endpoint, &headers, payload)
            .await
            .map_err(|e| {
                error!(error = %e, "GraphQL request failed");
                ApiError::Network(e.to_string())
            })?;

        debug!(status = response.status, "GraphQL response received");

        if !(200..300).contains(&response.status) {
            return Err(ApiError::from_status(
                response.status,
                &response.body,
                response.retry_after,
            ));
        }

        let envelope: GraphQlEnvelope = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid JSON response: {}", e)))?;

        if let Some(errors) = envelope.errors.as_deref() {
            let messages = join_error_messages(errors, "; ");
            error!(errors = %messages, "GraphQL errors");
            return Err(ApiError::from_graphql_messages(&messages));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::GraphQl("Response missing 'data' field".to_string()))
    }

    fn page_variables(id_name: &str, id: &str, cursor: Option<&str>) -> Value {
        let mut variables = Map::new();
        variables.insert(id_name.to_string(), Value::String(id.to_string()));
        if let Some(cursor) = cursor {
            variables.insert("after".to_string(), Value::String(cursor.to_string()));
        }
        Value::Object(variables)
    }

    fn decode<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, ApiError> {
        serde_json::from_value(data)
            .map_err(|e| ApiError::InvalidResponse(format!("Unexpected {} payload: {}", what, e)))
    }

    /// Typed nodes of one page; nodes that do not fit the shape are skipped.
    fn page_nodes<T: DeserializeOwned>(connection: &mut Connection, kind: &str) -> Vec<T> {
        connection
            .edges
            .take()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|edge| edge.node)
            .filter_map(|node| match serde_json::from_value(node) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(kind, error = %e, "Skipping malformed node");
                    None
                }
            })
            .collect()
    }

    /// Fetch every event of a MeetupPro network, following `endCursor`.
    ///
    /// Fails fast: an unknown network or any page failure aborts the fetch.
    pub async fn fetch_network_events(&self, network_id: &str) -> Result<Vec<RawEvent>, ApiError> {
        async {
            let mut all_events = Vec::new();
            let mut cursor: Option<String> = None;
            let mut page = 0u32;

            info!(network_id, "Starting to fetch network events");

            loop {
                page += 1;
                debug!(page, cursor = ?cursor, "Fetching events page");

                let variables = Self::page_variables("networkId", network_id, cursor.as_deref());
                let data = self.execute(NETWORK_EVENTS_QUERY, variables).await.map_err(|e| {
                    error!(page, error = %e, "Failed to fetch events page");
                    e
                })?;

                let network = Self::decode::<NetworkEventsData>(data, "network events")?
                    .pro_network_by_urlname
                    .ok_or_else(|| {
                        ApiError::GraphQl(format!(
                            "Network '{}' not found or not accessible",
                            network_id
                        ))
                    })?;

                let mut search = network.events_search;
                let events: Vec<RawEvent> = Self::page_nodes(&mut search, "event");
                debug!(page, count = events.len(), "Fetched events page");
                all_events.extend(events);

                let page_info = search.page_info.ok_or_else(|| {
                    ApiError::InvalidResponse("eventsSearch missing pageInfo".to_string())
                })?;
                if !page_info.has_next_page {
                    break;
                }
                match page_info.end_cursor.filter(|c| !c.is_empty()) {
                    Some(next) => cursor = Some(next),
                    None => {
                        warn!(page, "No cursor found for next page, stopping pagination");
                        break;
                    }
                }

                tokio::time::sleep(self.page_delay).await;
            }

            info!(count = all_events.len(), pages = page, "Fetched network events");
            Ok(all_events)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Fetch every RSVP of one event, surfacing failures.
    ///
    /// An event the API does not know is reported as [`ApiError::NotFound`];
    /// a null or empty RSVP connection is simply "no RSVPs".
    pub async fn try_fetch_event_rsvps(&self, event_id: &str) -> Result<Vec<RawRsvp>, ApiError> {
        async {
            let mut all_rsvps = Vec::new();
            let mut cursor: Option<String> = None;
            let mut page = 0u32;

            debug!(event_id, "Starting to fetch RSVPs");

            loop {
                page += 1;
                let variables = Self::page_variables("eventId", event_id, cursor.as_deref());
                let data = self.execute(EVENT_RSVPS_QUERY, variables).await?;

                let event = Self::decode::<EventRsvpsData>(data, "event RSVPs")?
                    .event
                    .ok_or_else(|| {
                        ApiError::NotFound(format!("Event '{}' not found or not accessible", event_id))
                    })?;

                let mut connection = match event.rsvps {
                    Some(connection) if connection.edges.as_ref().is_some_and(|e| !e.is_empty()) => {
                        connection
                    }
                    _ => {
                        debug!(event_id, page, "No RSVPs on page");
                        break;
                    }
                };

                let rsvps: Vec<RawRsvp> = Self::page_nodes(&mut connection, "rsvp");
                debug!(event_id, page, count = rsvps.len(), "Fetched RSVP page");
                all_rsvps.extend(rsvps);

                let page_info = connection.page_info.unwrap_or_default();
                if !page_info.has_next_page {
                    break;
                }
                match page_info.end_cursor.filter(|c| !c.is_empty()) {
                    Some(next) => cursor = Some(next),
                    None => {
                        warn!(event_id, page, "No cursor found for next page, stopping pagination");
                        break;
                    }
                }

                tokio::time::sleep(self.page_delay).await;
            }

            info!(event_id, count = all_rsvps.len(), pages = page, "Fetched RSVPs");
            Ok(all_rsvps)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Fetch every RSVP of one event; any failure yields an empty list.
    ///
    /// One event's RSVPs going missing must not stop the rest of a run.
    pub async fn fetch_event_rsvps(&self, event_id: &str) -> Vec<RawRsvp> {
        match self.try_fetch_event_rsvps(event_id).await {
            Ok(rsvps) => rsvps,
            Err(e) => {
                self.span.in_scope(|| {
                    warn!(event_id, error = %e, "Skipping RSVPs for event");
                });
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::{json_response, ok, raw_response, MockTransport};
    use crate::api::transport::{HttpResponse, TransportError};
    use serde_json::json;

    async fn authed() -> Arc<AuthManager> {
        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({
            "data": {"self": {"id": "1", "name": "Tester"}}
        }))]));
        let auth = AuthManager::new("key", "token", DEFAULT_ENDPOINT, transport, Span::none()).unwrap();
        auth.authenticate().await.unwrap();
        Arc::new(auth)
    }

    async fn new_client(transport: Arc<MockTransport>) -> GraphQlClient {
        GraphQlClient::new(
            transport,
            authed().await,
            DEFAULT_ENDPOINT,
            RetryConfig::api().with_jitter(false),
            Span::none(),
        )
        .with_page_delay(Duration::ZERO)
    }

    fn event_node(id: &str) -> Value {
        json!({
            "node": {
                "id": id,
                "title": format!("Event {}", id),
                "dateTime": "2024-05-01T18:00:00Z",
                "group": {"id": "g1", "name": "Rustaceans", "urlname": "rust"}
            }
        })
    }

    fn events_page(ids: &[&str], next: Option<&str>) -> Result<HttpResponse, TransportError> {
        ok(json!({
            "data": {
                "proNetworkByUrlname": {
                    "eventsSearch": {
                        "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next},
                        "edges": ids.iter().map(|id| event_node(id)).collect::<Vec<_>>()
                    }
                }
            }
        }))
    }

    fn rsvp_page(members: &[&str], has_next: bool, cursor: Option<&str>) -> Result<HttpResponse, TransportError> {
        let edges: Vec<Value> = members
            .iter()
            .map(|m| json!({"node": {"id": format!("r-{}", m), "response": "YES", "guests": 0,
                                      "member": {"id": m, "name": format!("Member {}", m)}}}))
            .collect();
        ok(json!({
            "data": {
                "event": {
                    "id": "e1",
                    "rsvps": {"pageInfo": {"hasNextPage": has_next, "endCursor": cursor}, "edges": edges}
                }
            }
        }))
    }

    #[tokio::test]
    async fn test_paginates_network_events_in_order() {
        let transport = Arc::new(MockTransport::scripted(vec![
            events_page(&["1", "2"], Some("c1")),
            events_page(&["3", "4"], Some("c2")),
            events_page(&["5"], None),
        ]));
        let client = new_client(transport.clone()).await;

        let events = client.fetch_network_events("rust-network").await.unwrap();

        let ids: Vec<String> = events.iter().map(RawEvent::label).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].variable("networkId"), Some("rust-network"));
        assert_eq!(requests[0].variable("after"), None);
        assert_eq!(requests[1].variable("after"), Some("c1"));
        assert_eq!(requests[2].variable("after"), Some("c2"));
        assert!(requests[0].query().contains("eventsSearch(first: 50"));
        assert_eq!(requests[0].headers[header::AUTHORIZATION], "Bearer token");
        assert_eq!(requests[0].headers[header::ACCEPT], "application/json");
        assert_eq!(client.stats(), ApiStats { total_calls: 3, failed_calls: 0 });
    }

    #[tokio::test]
    async fn test_event_pagination_stops_without_cursor() {
        for cursor in [json!(null), json!("")] {
            let page = |id: &str| {
                ok(json!({
                    "data": {
                        "proNetworkByUrlname": {
                            "eventsSearch": {
                                "pageInfo": {"hasNextPage": true, "endCursor": cursor},
                                "edges": [event_node(id)]
                            }
                        }
                    }
                }))
            };
            let transport = Arc::new(MockTransport::scripted(vec![page("1"), page("2")]));
            let client = new_client(transport.clone()).await;

            let events = client.fetch_network_events("rust-network").await.unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(transport.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_unknown_network_is_fatal() {
        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({
            "data": {"proNetworkByUrlname": null}
        }))]));
        let client = new_client(transport).await;

        let err = client.fetch_network_events("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::GraphQl(ref msg) if msg.contains("'nope' not found")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried() {
        let transport = Arc::new(MockTransport::scripted(vec![
            raw_response(500, "boom"),
            raw_response(502, "bad gateway"),
            events_page(&["1"], None),
        ]));
        let client = new_client(transport.clone()).await;

        let events = client.fetch_network_events("net").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(client.stats(), ApiStats { total_calls: 3, failed_calls: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_surfaces_last_error() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Connection("refused".into())),
        ]));
        let client = new_client(transport.clone()).await;

        let err = client.execute("{ ping }", json!({})).await.unwrap_err();
        match err {
            ApiError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ApiError::Network(ref m) if m.contains("refused")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Ok(HttpResponse {
                status: 429,
                retry_after: Some(Duration::from_secs(2)),
                body: "slow down".into(),
            }),
            ok(json!({"data": {"ok": true}})),
        ]));
        let client = new_client(transport.clone()).await;

        let data = client.execute("{ ok }", json!({})).await.unwrap();
        assert_eq!(data, json!({"ok": true}));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fatal_responses_are_not_retried() {
        let cases: Vec<Result<HttpResponse, TransportError>> = vec![
            raw_response(401, ""),
            raw_response(400, "bad query"),
            raw_response(200, "not json"),
            ok(json!({"errors": [{"message": "Field 'nope' doesn't exist"}]})),
            ok(json!({"extensions": {}})),
        ];

        for case in cases {
            let transport = Arc::new(MockTransport::scripted(vec![case]));
            let client = new_client(transport.clone()).await;
            let err = client.execute("{ x }", json!({})).await.unwrap_err();
            assert!(!err.is_retryable(), "retryable: {:?}", err);
            assert_eq!(transport.call_count(), 1);
            assert_eq!(client.stats().failed_calls, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_flavoured_graphql_errors_are_retried() {
        let transport = Arc::new(MockTransport::scripted(vec![
            ok(json!({"errors": [{"message": "Internal error, try again"}]})),
            ok(json!({"data": {"ok": 1}})),
        ]));
        let client = new_client(transport.clone()).await;

        assert_eq!(client.execute("{ ok }", json!({})).await.unwrap(), json!({"ok": 1}));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_client_fails_without_http() {
        let auth_transport = Arc::new(MockTransport::scripted(vec![]));
        let auth = Arc::new(
            AuthManager::new("key", "token", DEFAULT_ENDPOINT, auth_transport, Span::none()).unwrap(),
        );
        let transport = Arc::new(MockTransport::scripted(vec![]));
        let client = GraphQlClient::new(
            transport.clone(),
            auth,
            DEFAULT_ENDPOINT,
            RetryConfig::api(),
            Span::none(),
        );

        let err = client.execute("{ x }", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_paginates_rsvps() {
        let transport = Arc::new(MockTransport::scripted(vec![
            rsvp_page(&["m1", "m2"], true, Some("r1")),
            rsvp_page(&["m3"], false, None),
        ]));
        let client = new_client(transport.clone()).await;

        let rsvps = client.fetch_event_rsvps("e1").await;
        assert_eq!(rsvps.len(), 3);

        let requests = transport.requests();
        assert_eq!(requests[0].variable("eventId"), Some("e1"));
        assert_eq!(requests[1].variable("after"), Some("r1"));
        assert!(requests[0].query().contains("rsvps(first: 100"));
    }

    #[tokio::test]
    async fn test_rsvp_pagination_stops_without_cursor() {
        let transport = Arc::new(MockTransport::scripted(vec![
            rsvp_page(&["m1"], true, None),
            rsvp_page(&["m2"], false, None),
        ]));
        let client = new_client(transport.clone()).await;

        let rsvps = client.fetch_event_rsvps("e1").await;
        assert_eq!(rsvps.len(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rsvp_fetch_tolerates_missing_event_and_payload() {
        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({"data": {"event": null}}))]));
        let client = new_client(transport).await;
        assert!(client.fetch_event_rsvps("gone").await.is_empty());

        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({"data": {"event": null}}))]));
        let client = new_client(transport).await;
        assert!(matches!(
            client.try_fetch_event_rsvps("gone").await,
            Err(ApiError::NotFound(_))
        ));

        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({
            "data": {"event": {"id": "e1", "rsvps": null}}
        }))]));
        let client = new_client(transport).await;
        assert_eq!(client.try_fetch_event_rsvps("e1").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_rsvp_fetch_swallows_errors_on_later_pages() {
        let transport = Arc::new(MockTransport::scripted(vec![
            rsvp_page(&["m1"], true, Some("r1")),
            json_response(403, json!({"message": "forbidden"})),
        ]));
        let client = new_client(transport).await;
        assert!(client.fetch_event_rsvps("e1").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_nodes_are_skipped() {
        let transport = Arc::new(MockTransport::scripted(vec![ok(json!({
            "data": {
                "proNetworkByUrlname": {
                    "eventsSearch": {
                        "pageInfo": {"hasNextPage": false, "endCursor": null},
                        "edges": [
                            {"node": {"id": "1", "title": {"nested": true}}},
                            {"node": null},
                            event_node("2")
                        ]
                    }
                }
            }
        }))]));
        let client = new_client(transport).await;

        let events = client.fetch_network_events("net").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label(), "2");
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(ApiStats::default().success_rate(), 0.0);
        let stats = ApiStats { total_calls: 4, failed_calls: 1 };
        assert_eq!(stats.success_rate(), 75.0);
    }
}
