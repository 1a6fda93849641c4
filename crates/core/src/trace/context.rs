use std::time::{Duration, Instant};

use serde_json::Value;

use super::Redactor;

/// Per-call trace state. Arguments are redacted on construction so the raw
/// values never reach a log line.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub component: String,
    pub method: &'static str,
    pub args: Value,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn start(
        component: impl Into<String>,
        method: &'static str,
        args: &Value,
        redactor: &Redactor,
    ) -> Self {
        Self {
            component: component.into(),
            method,
            args: redactor.redact(args),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// The `id` argument, when the call has one.
    pub fn target_id(&self) -> Option<&str> {
        self.args.get("id").and_then(Value::as_str)
    }
}
