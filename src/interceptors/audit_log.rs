//! Audit log interceptor
//!
//! Appends one JSON line per tool call and model call event. The log is a
//! write-only trace; nothing in the agent reads it back.

use super::{
    InterceptorDecision, LlmCallContext, LlmInterceptor, ToolCallContext, ToolInterceptor,
};
use crate::llm::LlmError;
use crate::tools::ToolError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    call_id: Option<String>,
    tool_name: Option<String>,
    operation: Option<String>,
    args: Value,
    args_digest: Option<String>,
    result: Option<Value>,
    error: Option<String>,
    duration_ms: u64,
    status: &'static str,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Interceptor that logs all operations to a file
pub struct AuditLogInterceptor {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLogInterceptor {
    /// Create a new audit log interceptor
    ///
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter::new(log_path.into()))),
        }
    }

    async fn record(&self, entry: AuditEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[async_trait]
impl ToolInterceptor for AuditLogInterceptor {
    async fn intercept_tool_call(
        &self,
        context: &ToolCallContext,
    ) -> crate::Result<InterceptorDecision> {
        self.record(AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tool_call_start",
            call_id: Some(context.call_id.clone()),
            tool_name: Some(context.tool_name.clone()),
            operation: None,
            args: context.args.clone(),
            args_digest: Some(context.args_digest.clone()),
            result: None,
            error: None,
            duration_ms: 0,
            status: "pending",
        })
        .await;

        // Audit logging never blocks
        Ok(InterceptorDecision::Allow)
    }

    async fn on_tool_call_complete(
        &self,
        context: &ToolCallContext,
        result: &Result<Value, ToolError>,
        duration_ms: u64,
    ) {
        let (result_value, error, status) = match result {
            Ok(v) => (Some(truncate(v, 1000)), None, "success"),
            Err(e) => (None, Some(e.to_string()), "error"),
        };

        self.record(AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tool_call_complete",
            call_id: Some(context.call_id.clone()),
            tool_name: Some(context.tool_name.clone()),
            operation: None,
            args: Value::Null,
            args_digest: Some(context.args_digest.clone()),
            result: result_value,
            error,
            duration_ms,
            status,
        })
        .await;
    }
}

#[async_trait]
impl LlmInterceptor for AuditLogInterceptor {
    async fn intercept_llm_call(
        &self,
        context: &LlmCallContext,
    ) -> crate::Result<InterceptorDecision> {
        self.record(AuditEntry {
            timestamp: Utc::now(),
            entry_type: "llm_call_start",
            call_id: None,
            tool_name: None,
            operation: Some(context.operation.clone()),
            args: serde_json::json!({
                "model": context.model,
                "iteration": context.iteration,
                "prompt_preview": truncate(&context.prompt, 500)
            }),
            args_digest: None,
            result: None,
            error: None,
            duration_ms: 0,
            status: "pending",
        })
        .await;

        // Audit logging never blocks
        Ok(InterceptorDecision::Allow)
    }

    async fn on_llm_call_complete(
        &self,
        context: &LlmCallContext,
        result: &Result<Value, LlmError>,
        duration_ms: u64,
    ) {
        let (result_value, error, status) = match result {
            Ok(v) => (Some(truncate(v, 1000)), None, "success"),
            Err(e) => (None, Some(e.to_string()), "error"),
        };

        self.record(AuditEntry {
            timestamp: Utc::now(),
            entry_type: "llm_call_complete",
            call_id: None,
            tool_name: None,
            operation: Some(context.operation.clone()),
            args: serde_json::json!({
                "model": context.model,
                "iteration": context.iteration,
            }),
            args_digest: None,
            result: result_value,
            error,
            duration_ms,
            status,
        })
        .await;
    }
}

/// Truncate large values for logging (don't log full prompts)
fn truncate(value: &Value, max_len: usize) -> Value {
    let s = serde_json::to_string(value).unwrap_or_default();
    if s.len() > max_len {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        serde_json::json!(format!("{}... [truncated]", &s[..end]))
    } else {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_logs_tool_call() {
        let temp_file = NamedTempFile::new().unwrap();
        let interceptor = AuditLogInterceptor::new(temp_file.path());

        let context = ToolCallContext::new(
            "holder_distribution",
            json!({ "token_address": "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263" }),
        );

        // Should always allow
        let decision = interceptor.intercept_tool_call(&context).await.unwrap();
        assert!(matches!(decision, InterceptorDecision::Allow));

        interceptor
            .on_tool_call_complete(&context, &Ok(json!({ "top10_pct": 41.2 })), 150)
            .await;

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["entry_type"], "tool_call_start");
        assert_eq!(lines[1]["entry_type"], "tool_call_complete");
        assert_eq!(lines[1]["duration_ms"], 150);
        assert_eq!(lines[0]["call_id"], lines[1]["call_id"]);
        assert_eq!(lines[0]["args_digest"], json!(context.args_digest));
    }

    #[tokio::test]
    async fn test_logs_llm_failure() {
        let temp_file = NamedTempFile::new().unwrap();
        let interceptor = AuditLogInterceptor::new(temp_file.path());
        let context = LlmCallContext {
            model: "gemini-2.0-flash".to_string(),
            operation: "chat".to_string(),
            iteration: 0,
            prompt: json!("x".repeat(2000)),
        };

        interceptor.intercept_llm_call(&context).await.unwrap();
        interceptor
            .on_llm_call_complete(&context, &Err(LlmError::EmptyResponse), 20)
            .await;

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[truncated]"));
        assert!(content.contains("\"status\":\"error\""));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let value = json!("é".repeat(600));
        let truncated = truncate(&value, 501);
        assert!(truncated.as_str().unwrap().ends_with("[truncated]"));
    }
}
