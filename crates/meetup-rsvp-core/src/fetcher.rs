//! Run orchestration: authenticate, fetch, normalize, summarize, report.
//!
//! The fetch is fail-fast for the event list and fault-tolerant per event
//! for RSVPs: one event's RSVPs going missing is recorded as an issue and
//! the event is kept with an empty RSVP list.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::api::{
    ApiError, ApiStats, GraphQlClient, ReqwestTransport, Transport, TransportError,
};
use crate::auth::{AuthError, AuthManager};
use crate::config::{Config, ConfigError, ConfigManager};
use crate::models::{Event, Summary};
use crate::processors::DataProcessor;
use crate::report::{render_json, render_report, ReportInput};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Failed to set up HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("GraphQL client not initialized")]
    NotInitialized,

    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),
}

/// Progress of a run. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Init,
    Authenticated,
    EventsFetched,
    RsvpsFetched,
    Summarized,
    Reported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Non-fatal problems collected during a run for the issues section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct RsvpFetcher {
    config_manager: ConfigManager,
    transport: Option<Arc<dyn Transport>>,
    processor: DataProcessor,
    config: Option<Config>,
    client: Option<GraphQlClient>,
    issues: Issues,
    stage: RunStage,
    span: Span,
}

impl RsvpFetcher {
    pub fn new(config_manager: ConfigManager, span: Span) -> Self {
        let processor = DataProcessor::new(info_span!(parent: &span, "processor"));
        span.in_scope(|| info!("RSVP fetcher initialized"));
        Self {
            config_manager,
            transport: None,
            processor,
            config: None,
            client: None,
            issues: Issues::default(),
            stage: RunStage::Init,
            span,
        }
    }

    /// Send requests through `transport` instead of a reqwest client.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn issues(&self) -> &Issues {
        &self.issues
    }

    /// Call statistics, while the client is alive
    pub fn api_stats(&self) -> Option<ApiStats> {
        self.client.as_ref().map(GraphQlClient::stats)
    }

    /// Run the whole workflow, writing the report to `out`.
    ///
    /// Cleanup runs whether or not the workflow succeeded.
    pub async fn run<W: Write>(&mut self, out: &mut W, format: OutputFormat) -> Result<(), FetchError> {
        let span = self.span.clone();
        let result = async {
            info!("Starting Meetup RSVP Fetcher workflow");
            self.initialize().await?;
            let (events, summary) = self.fetch_all_data().await?;
            self.output_results(out, format, &events, &summary)?;
            info!("Meetup RSVP Fetcher workflow completed successfully");
            Ok::<(), FetchError>(())
        }
        .instrument(span.clone())
        .await;

        if let Err(ref e) = result {
            span.in_scope(|| error!(error = %e, stage = ?self.stage, "Workflow failed"));
        }
        self.cleanup();
        result
    }

    /// Load configuration, authenticate and build the GraphQL client.
    pub async fn initialize(&mut self) -> Result<(), FetchError> {
        info!("Loading configuration");
        let config = self.config_manager.load()?;

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(config.timeout())?),
        };

        info!("Authenticating with Meetup API");
        let auth = AuthManager::new(
            &config.api_key,
            &config.oauth_token,
            &config.base_url,
            transport.clone(),
            info_span!(parent: &self.span, "auth"),
        )?;
        auth.authenticate().await?;
        self.stage = RunStage::Authenticated;

        self.client = Some(GraphQlClient::new(
            transport,
            Arc::new(auth),
            &config.base_url,
            config.retry_config(),
            info_span!(parent: &self.span, "graphql"),
        ));
        self.config = Some(config);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Fetch events and their RSVPs, then summarize.
    pub async fn fetch_all_data(&mut self) -> Result<(Vec<Event>, Summary), FetchError> {
        let (Some(client), Some(config)) = (self.client.as_ref(), self.config.as_ref()) else {
            return Err(FetchError::NotInitialized);
        };

        info!(network_id = %config.network_id, "Fetching network events");
        let raw_events = client.fetch_network_events(&config.network_id).await?;
        self.stage = RunStage::EventsFetched;
        info!(count = raw_events.len(), "Retrieved events from network");

        if raw_events.is_empty() {
            warn!("No events found in network");
            self.stage = RunStage::Summarized;
            return Ok((Vec::new(), Summary::empty(Utc::now())));
        }

        let events = self.processor.process_events(&raw_events);

        info!("Fetching RSVPs for all events");
        let events = fetch_rsvps_for_events(client, &self.processor, &events, &mut self.issues).await;
        self.stage = RunStage::RsvpsFetched;

        let summary = self.processor.generate_summary(&events);
        self.stage = RunStage::Summarized;
        info!(
            total_events = summary.total_events,
            total_rsvps = summary.total_rsvps,
            "Data collection complete"
        );

        Ok((events, summary))
    }

    pub fn output_results<W: Write>(
        &mut self,
        out: &mut W,
        format: OutputFormat,
        events: &[Event],
        summary: &Summary,
    ) -> Result<(), FetchError> {
        info!(?format, "Formatting and displaying results");
        let input = ReportInput {
            events,
            summary,
            errors: &self.issues.errors,
            warnings: &self.issues.warnings,
            generated_at: Utc::now(),
        };
        match format {
            OutputFormat::Text => render_report(out, &input)?,
            OutputFormat::Json => render_json(out, &input)?,
        }
        out.flush()?;
        self.stage = RunStage::Reported;
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
            self.span.in_scope(|| debug!("GraphQL client closed"));
        }
    }
}

/// Attach RSVPs to each event, one event at a time.
///
/// A failed fetch keeps the event with no RSVPs and records an error; any
/// failures add one aggregate warning.
async fn fetch_rsvps_for_events(
    client: &GraphQlClient,
    processor: &DataProcessor,
    events: &[Event],
    issues: &mut Issues,
) -> Vec<Event> {
    let mut with_rsvps = Vec::with_capacity(events.len());
    let mut failed = 0usize;

    for (i, event) in events.iter().enumerate() {
        debug!(
            index = i + 1,
            total = events.len(),
            event_id = %event.id(),
            "Fetching RSVPs for event"
        );

        match client.try_fetch_event_rsvps(event.id()).await {
            Ok(raw) => {
                let rsvps = processor.process_rsvps(&raw);
                debug!(event_id = %event.id(), count = rsvps.len(), "Attached RSVPs");
                with_rsvps.push(event.with_rsvps(rsvps));
            }
            Err(e) => {
                let message = format!("Failed to fetch RSVPs for event '{}': {}", event.title(), e);
                warn!(event_id = %event.id(), error = %e, "Failed to fetch RSVPs for event");
                issues.errors.push(message);
                with_rsvps.push(event.with_rsvps(Vec::new()));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        issues.warnings.push(format!(
            "RSVP fetching completed with {} failures out of {} events",
            failed,
            events.len()
        ));
    }
    info!(
        successful = events.len() - failed,
        failed,
        total = events.len(),
        "RSVP fetching complete"
    );
    with_rsvps
}
