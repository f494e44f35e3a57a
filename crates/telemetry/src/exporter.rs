//! Exporters: where a flushed batch ends up.

use crate::SinkError;
use crate::model::ExportBatch;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait TraceExporter: Send + Sync {
    fn name(&self) -> &str;

    async fn export(&self, batch: &ExportBatch) -> Result<(), SinkError>;
}

/// Appends one JSON object per trace to a local file.
///
/// Each line carries the project and the trace's session so the file can
/// be grepped or loaded line by line.
pub struct JsonlExporter {
    path: PathBuf,
}

impl JsonlExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl TraceExporter for JsonlExporter {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn export(&self, batch: &ExportBatch) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = String::new();
        for trace in &batch.traces {
            let session = batch.sessions.iter().find(|s| s.id == trace.session_id);
            let line = serde_json::json!({
                "project": batch.project,
                "session": session,
                "trace": trace,
            });
            buf.push_str(&serde_json::to_string(&line)?);
            buf.push('\n');
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), traces = batch.traces.len(), "Traces appended");
        Ok(())
    }
}

/// POSTs each batch as JSON to a collector endpoint.
pub struct HttpExporter {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpExporter {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Export(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl TraceExporter for HttpExporter {
    fn name(&self) -> &str {
        "http"
    }

    async fn export(&self, batch: &ExportBatch) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Export(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Export(format!(
                "collector returned HTTP {}: {body}",
                status.as_u16()
            )));
        }
        debug!(endpoint = %self.endpoint, traces = batch.traces.len(), "Batch exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionRecord, Span, Trace};

    fn batch() -> ExportBatch {
        let mut trace = Trace::new("s-1", "buy a telescope");
        trace.add_span(Span::llm_call("gpt-4o-mini", 100, true));
        trace.end("Here is your link", true);
        ExportBatch {
            project: "cartloop".into(),
            sessions: vec![SessionRecord::new("s-1", Some("demo".into()))],
            traces: vec![trace],
        }
    }

    #[tokio::test]
    async fn jsonl_appends_one_line_per_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("traces.jsonl");
        let exporter = JsonlExporter::new(&path);

        exporter.export(&batch()).await.unwrap();
        exporter.export(&batch()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["project"], "cartloop");
        assert_eq!(first["session"]["name"], "demo");
        assert_eq!(first["trace"]["input"], "buy a telescope");
    }

    #[tokio::test]
    async fn jsonl_skips_empty_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.jsonl");
        let exporter = JsonlExporter::new(&path);
        let empty = ExportBatch {
            project: "cartloop".into(),
            sessions: vec![],
            traces: vec![],
        };
        exporter.export(&empty).await.unwrap();
        assert!(!path.exists());
    }
}
