use std::collections::BTreeMap;
use std::error::Error;

use serde_json::Value;

/// Context attached to a reported exception.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportContext {
    pub tags: BTreeMap<String, String>,
    pub extra: Value,
}

impl ReportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

/// Sink for failures the tracer observes.
pub trait ExceptionReporter: Send + Sync {
    fn capture_exception(&self, error: &(dyn Error + 'static), context: &ReportContext);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ExceptionReporter for NoopReporter {
    fn capture_exception(&self, _error: &(dyn Error + 'static), _context: &ReportContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_context_builder() {
        let context = ReportContext::new()
            .with_tag("component", "UserRepository")
            .with_tag("action", "update")
            .with_extra(json!({ "id": "1" }));

        assert_eq!(context.tags["component"], "UserRepository");
        assert_eq!(context.tags["action"], "update");
        assert_eq!(context.extra["id"], json!("1"));
    }
}
