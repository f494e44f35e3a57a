//! Session and trace telemetry for Cartloop.
//!
//! The agent reports every session, processing cycle, oracle call and tool
//! execution to an [`ObservabilitySink`]. [`TelemetryEngine`] buffers these
//! and flushes them to a [`TraceExporter`]; [`NoopSink`] discards them.

pub mod engine;
pub mod exporter;
pub mod model;
pub mod sink;

pub use engine::{EngineStats, TelemetryEngine};
pub use exporter::{HttpExporter, JsonlExporter, TraceExporter};
pub use model::{ExportBatch, SessionRecord, Span, SpanKind, Trace};
pub use sink::{NoopSink, ObservabilitySink};

use cartloop_config::{ExporterKind, TelemetryConfig};
use std::sync::Arc;
use std::time::Duration;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("session already started: {0}")]
    DuplicateSession(String),

    #[error("session already concluded: {0}")]
    SessionConcluded(String),

    #[error("unknown trace: {0}")]
    UnknownTrace(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Timeout for one export request. It stays below the agent's bound on the
/// whole sink call (`flush_timeout_secs`), so a slow collector fails the
/// export cleanly instead of the flush being cancelled.
pub fn exporter_timeout(flush_timeout_secs: u64) -> Duration {
    Duration::from_millis(flush_timeout_secs.saturating_mul(750).max(1))
}

/// Build the sink described by the `[telemetry]` config section.
pub fn build_sink(config: &TelemetryConfig) -> Result<Arc<dyn ObservabilitySink>, SinkError> {
    if !config.enabled {
        return Ok(Arc::new(NoopSink));
    }

    let engine = TelemetryEngine::new(&config.project);
    let engine = match config.exporter {
        ExporterKind::None => engine,
        ExporterKind::Jsonl => engine.with_exporter(Box::new(JsonlExporter::new(&config.jsonl_path))),
        ExporterKind::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| SinkError::Export("telemetry.endpoint is not set".into()))?;
            engine.with_exporter(Box::new(HttpExporter::new(
                endpoint,
                config.api_key.clone(),
                exporter_timeout(config.flush_timeout_secs),
            )?))
        }
    };
    tracing::info!(project = %config.project, exporter = ?config.exporter, "Telemetry enabled");
    Ok(Arc::new(engine))
}
