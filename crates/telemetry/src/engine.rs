//! Thread-safe telemetry engine: buffers sessions and traces, then hands
//! them to an exporter on flush.

use crate::SinkError;
use crate::exporter::TraceExporter;
use crate::model::*;
use crate::sink::ObservabilitySink;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// How many exported traces are kept for inspection.
const RETAINED_TRACES: usize = 1_000;

/// Default cap on traces waiting for export.
const PENDING_TRACES: usize = 1_000;

/// Buffering [`ObservabilitySink`].
///
/// Thread-safe via `RwLock`; no lock is held across an await. Traces stay
/// in `pending` until an export of them succeeds, so a flush that fails or
/// is cancelled mid-export loses nothing.
pub struct TelemetryEngine {
    project: String,
    exporter: Option<Box<dyn TraceExporter>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    open_traces: RwLock<HashMap<String, Trace>>,
    /// Concluded traces waiting for the next flush, oldest first.
    pending: RwLock<VecDeque<Trace>>,
    /// When full, the oldest pending trace is dropped.
    pending_limit: usize,
    retained: RwLock<VecDeque<Trace>>,
    stats: RwLock<EngineStats>,
    /// Serializes flushes so one batch is never exported twice.
    flush_lock: tokio::sync::Mutex<()>,
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub sessions_started: u64,
    pub sessions_concluded: u64,
    pub traces_concluded: u64,
    pub spans_recorded: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub traces_exported: u64,
    pub traces_dropped: u64,
}

impl TelemetryEngine {
    /// An engine that keeps flushed traces in memory only.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            exporter: None,
            sessions: RwLock::new(HashMap::new()),
            open_traces: RwLock::new(HashMap::new()),
            pending: RwLock::new(VecDeque::new()),
            pending_limit: PENDING_TRACES,
            retained: RwLock::new(VecDeque::new()),
            stats: RwLock::new(EngineStats::default()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_exporter(mut self, exporter: Box<dyn TraceExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Cap on traces waiting for export (at least 1).
    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit.max(1);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stats(&self) -> EngineStats {
        *self.stats.read().unwrap()
    }

    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    pub fn pending_traces(&self) -> usize {
        self.pending.read().unwrap().len()
    }

    /// The most recent flushed traces, newest last.
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let retained = self.retained.read().unwrap();
        let skip = retained.len().saturating_sub(limit);
        retained.iter().skip(skip).cloned().collect()
    }

    fn add_span(&self, trace_id: &str, span: Span) -> Result<(), SinkError> {
        let mut traces = self.open_traces.write().unwrap();
        let trace = traces
            .get_mut(trace_id)
            .ok_or_else(|| SinkError::UnknownTrace(trace_id.to_string()))?;
        trace.add_span(span);
        self.stats.write().unwrap().spans_recorded += 1;
        Ok(())
    }

    fn enqueue(&self, trace: Trace) {
        let mut pending = self.pending.write().unwrap();
        pending.push_back(trace);
        let overflow = pending.len().saturating_sub(self.pending_limit);
        if overflow > 0 {
            pending.drain(..overflow);
            self.stats.write().unwrap().traces_dropped += overflow as u64;
            warn!(
                dropped = overflow,
                limit = self.pending_limit,
                "Pending trace buffer full, dropping oldest traces"
            );
        }
    }

    /// Copy what is waiting to be exported. Sessions are included when
    /// concluded or referenced by a pending trace. Nothing is removed here.
    fn snapshot_batch(&self) -> ExportBatch {
        let traces: Vec<Trace> = self.pending.read().unwrap().iter().cloned().collect();
        let sessions = self.sessions.read().unwrap();
        let batch_sessions = sessions
            .values()
            .filter(|s| s.is_concluded() || traces.iter().any(|t| t.session_id == s.id))
            .cloned()
            .collect();
        ExportBatch {
            project: self.project.clone(),
            sessions: batch_sessions,
            traces,
        }
    }

    /// Drop the exported traces from `pending` and forget the exported
    /// concluded sessions.
    fn finish_batch(&self, batch: ExportBatch) {
        let exported_ids: HashSet<&str> = batch.traces.iter().map(|t| t.id.as_str()).collect();
        self.pending
            .write()
            .unwrap()
            .retain(|t| !exported_ids.contains(t.id.as_str()));

        let exported_sessions: HashSet<&str> = batch
            .sessions
            .iter()
            .filter(|s| s.is_concluded())
            .map(|s| s.id.as_str())
            .collect();
        self.sessions
            .write()
            .unwrap()
            .retain(|id, _| !exported_sessions.contains(id.as_str()));

        let exported = batch.traces.len() as u64;
        let mut retained = self.retained.write().unwrap();
        retained.extend(batch.traces);
        while retained.len() > RETAINED_TRACES {
            retained.pop_front();
        }

        let mut stats = self.stats.write().unwrap();
        stats.flushes += 1;
        stats.traces_exported += exported;
    }
}

#[async_trait]
impl ObservabilitySink for TelemetryEngine {
    async fn start_session(&self, session_id: &str, name: Option<&str>) -> Result<(), SinkError> {
        let mut sessions = self.sessions.write().unwrap();
        if sessions.contains_key(session_id) {
            return Err(SinkError::DuplicateSession(session_id.to_string()));
        }
        sessions.insert(
            session_id.to_string(),
            SessionRecord::new(session_id, name.map(str::to_string)),
        );
        self.stats.write().unwrap().sessions_started += 1;
        debug!(session_id, project = %self.project, "Telemetry session started");
        Ok(())
    }

    async fn start_trace(&self, session_id: &str, input: &str) -> Result<String, SinkError> {
        {
            let sessions = self.sessions.read().unwrap();
            match sessions.get(session_id) {
                None => return Err(SinkError::UnknownSession(session_id.to_string())),
                Some(s) if s.is_concluded() => {
                    return Err(SinkError::SessionConcluded(session_id.to_string()));
                }
                Some(_) => {}
            }
        }
        let trace = Trace::new(session_id, input);
        let id = trace.id.clone();
        self.open_traces.write().unwrap().insert(id.clone(), trace);
        Ok(id)
    }

    async fn add_llm_span(&self, trace_id: &str, span: Span) -> Result<(), SinkError> {
        self.add_span(trace_id, span)
    }

    async fn add_tool_span(&self, trace_id: &str, span: Span) -> Result<(), SinkError> {
        self.add_span(trace_id, span)
    }

    async fn conclude_trace(
        &self,
        trace_id: &str,
        output: &str,
        success: bool,
    ) -> Result<(), SinkError> {
        let mut trace = self
            .open_traces
            .write()
            .unwrap()
            .remove(trace_id)
            .ok_or_else(|| SinkError::UnknownTrace(trace_id.to_string()))?;

        let elapsed = chrono::Utc::now()
            .signed_duration_since(trace.started_at)
            .num_milliseconds()
            .max(0) as u64;
        trace.add_span(Span::turn(elapsed, success));
        trace.end(output, success);

        if let Some(session) = self.sessions.write().unwrap().get_mut(&trace.session_id) {
            session.trace_count += 1;
        }
        self.stats.write().unwrap().traces_concluded += 1;
        self.enqueue(trace);
        Ok(())
    }

    async fn conclude_session(&self, session_id: &str) -> Result<(), SinkError> {
        // Traces still open for this session are closed as failed.
        let orphaned: Vec<String> = self
            .open_traces
            .read()
            .unwrap()
            .values()
            .filter(|t| t.session_id == session_id)
            .map(|t| t.id.clone())
            .collect();
        for trace_id in orphaned {
            self.conclude_trace(&trace_id, "", false).await?;
        }

        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SinkError::UnknownSession(session_id.to_string()))?;
        if session.is_concluded() {
            return Err(SinkError::SessionConcluded(session_id.to_string()));
        }
        session.concluded_at = Some(chrono::Utc::now());
        self.stats.write().unwrap().sessions_concluded += 1;
        info!(session_id, traces = session.trace_count, "Telemetry session concluded");
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let _flushing = self.flush_lock.lock().await;
        let batch = self.snapshot_batch();
        if batch.is_empty() {
            return Ok(());
        }

        if let Some(exporter) = &self.exporter
            && let Err(e) = exporter.export(&batch).await
        {
            // The traces never left `pending`; the next flush retries them.
            self.stats.write().unwrap().failed_flushes += 1;
            return Err(e);
        }

        debug!(
            traces = batch.traces.len(),
            sessions = batch.sessions.len(),
            exporter = self.exporter.as_ref().map(|e| e.name()).unwrap_or("memory"),
            "Telemetry flushed"
        );
        self.finish_batch(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingExporter {
        batches: Arc<Mutex<Vec<ExportBatch>>>,
        fail: Arc<AtomicBool>,
        stall: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TraceExporter for RecordingExporter {
        fn name(&self) -> &str {
            "recording"
        }

        async fn export(&self, batch: &ExportBatch) -> Result<(), SinkError> {
            if self.stall.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SinkError::Export("collector down".into()));
            }
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn engine() -> (TelemetryEngine, Arc<Mutex<Vec<ExportBatch>>>, Arc<AtomicBool>) {
        let exporter = RecordingExporter::default();
        let batches = exporter.batches.clone();
        let fail = exporter.fail.clone();
        (
            TelemetryEngine::new("cartloop").with_exporter(Box::new(exporter)),
            batches,
            fail,
        )
    }

    async fn concluded_trace(engine: &TelemetryEngine, session_id: &str, input: &str) {
        let trace_id = engine.start_trace(session_id, input).await.unwrap();
        engine.conclude_trace(&trace_id, "ok", true).await.unwrap();
    }

    #[tokio::test]
    async fn full_session_is_exported_on_flush() {
        let (engine, batches, _) = engine();
        engine.start_session("s-1", Some("demo")).await.unwrap();

        let trace_id = engine.start_trace("s-1", "list products").await.unwrap();
        engine
            .add_llm_span(&trace_id, Span::llm_call("gpt-4o-mini", 50, true))
            .await
            .unwrap();
        engine
            .add_tool_span(
                &trace_id,
                Span::tool_execution("list_products", serde_json::json!({}), "[]", 5, true),
            )
            .await
            .unwrap();
        engine.conclude_trace(&trace_id, "We sell telescopes", true).await.unwrap();
        engine.conclude_session("s-1").await.unwrap();
        engine.flush().await.unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.traces.len(), 1);
        assert_eq!(batch.traces[0].llm_call_count(), 1);
        assert_eq!(batch.traces[0].tool_execution_count(), 1);
        assert_eq!(batch.sessions[0].trace_count, 1);
        assert!(batch.sessions[0].is_concluded());

        assert!(engine.session("s-1").is_none());
        assert_eq!(engine.stats().traces_exported, 1);
    }

    #[tokio::test]
    async fn failed_export_keeps_traces_for_retry() {
        let (engine, batches, fail) = engine();
        engine.start_session("s-1", None).await.unwrap();
        let trace_id = engine.start_trace("s-1", "hi").await.unwrap();
        engine.conclude_trace(&trace_id, "hello", true).await.unwrap();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(engine.flush().await, Err(SinkError::Export(_))));
        assert_eq!(engine.pending_traces(), 1);

        fail.store(false, Ordering::SeqCst);
        engine.flush().await.unwrap();
        assert_eq!(engine.pending_traces(), 0);
        assert_eq!(batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let (engine, _, _) = engine();
        assert!(matches!(
            engine.start_trace("missing", "hi").await,
            Err(SinkError::UnknownSession(_))
        ));
        assert!(matches!(
            engine
                .add_llm_span("nope", Span::llm_call("m", 1, true))
                .await,
            Err(SinkError::UnknownTrace(_))
        ));
        assert!(matches!(
            engine.conclude_session("missing").await,
            Err(SinkError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn double_conclusion_is_rejected() {
        let (engine, _, _) = engine();
        engine.start_session("s-1", None).await.unwrap();
        engine.conclude_session("s-1").await.unwrap();
        assert!(matches!(
            engine.conclude_session("s-1").await,
            Err(SinkError::SessionConcluded(_))
        ));
        assert!(matches!(
            engine.start_trace("s-1", "late").await,
            Err(SinkError::SessionConcluded(_))
        ));
    }

    #[tokio::test]
    async fn concluding_session_closes_open_traces() {
        let engine = TelemetryEngine::new("cartloop");
        engine.start_session("s-1", None).await.unwrap();
        engine.start_trace("s-1", "dangling").await.unwrap();
        engine.conclude_session("s-1").await.unwrap();
        assert_eq!(engine.pending_traces(), 1);

        engine.flush().await.unwrap();
        let recent = engine.recent_traces(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].success, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_flush_keeps_the_batch() {
        let exporter = RecordingExporter::default();
        let batches = exporter.batches.clone();
        let stall = exporter.stall.clone();
        let engine = TelemetryEngine::new("cartloop").with_exporter(Box::new(exporter));

        engine.start_session("s-1", None).await.unwrap();
        concluded_trace(&engine, "s-1", "hi").await;
        engine.conclude_session("s-1").await.unwrap();

        stall.store(true, Ordering::SeqCst);
        let timed_out = tokio::time::timeout(Duration::from_secs(20), engine.flush()).await;
        assert!(timed_out.is_err());
        assert_eq!(engine.pending_traces(), 1);
        assert!(engine.session("s-1").is_some());
        assert_eq!(engine.stats().traces_exported, 0);

        stall.store(false, Ordering::SeqCst);
        engine.flush().await.unwrap();
        assert_eq!(engine.pending_traces(), 0);
        assert_eq!(batches.lock().unwrap()[0].traces.len(), 1);
        assert!(engine.session("s-1").is_none());
    }

    #[tokio::test]
    async fn traces_concluded_during_a_flush_stay_pending() {
        let (engine, batches, _) = engine();
        engine.start_session("s-1", None).await.unwrap();
        concluded_trace(&engine, "s-1", "first").await;
        engine.flush().await.unwrap();
        concluded_trace(&engine, "s-1", "second").await;

        assert_eq!(engine.pending_traces(), 1);
        assert_eq!(batches.lock().unwrap().len(), 1);
        // The open session was exported with its trace but is still tracked.
        assert!(engine.session("s-1").is_some());
    }

    #[tokio::test]
    async fn collector_outage_caps_pending_traces() {
        let exporter = RecordingExporter::default();
        let batches = exporter.batches.clone();
        let fail = exporter.fail.clone();
        let engine = TelemetryEngine::new("cartloop")
            .with_exporter(Box::new(exporter))
            .with_pending_limit(3);
        engine.start_session("s-1", None).await.unwrap();

        fail.store(true, Ordering::SeqCst);
        for turn in 0..10 {
            concluded_trace(&engine, "s-1", &format!("turn {turn}")).await;
            assert!(engine.flush().await.is_err());
            assert!(engine.pending_traces() <= 3);
        }

        let stats = engine.stats();
        assert_eq!(stats.failed_flushes, 10);
        assert_eq!(stats.traces_dropped, 7);

        fail.store(false, Ordering::SeqCst);
        engine.flush().await.unwrap();
        let batches = batches.lock().unwrap();
        let inputs: Vec<&str> = batches[0].traces.iter().map(|t| t.input.as_str()).collect();
        assert_eq!(inputs, vec!["turn 7", "turn 8", "turn 9"]);
    }
}
