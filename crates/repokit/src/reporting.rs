//! Exception reporting sinks.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

use repokit_core::trace::{ExceptionReporter, ReportContext};

/// Reports exceptions as `error`-level tracing events under the
/// `repokit::exceptions` target, so they can be routed to their own sink.
#[derive(Debug, Default)]
pub struct TracingReporter {
    reported: AtomicU64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of exceptions captured so far.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ExceptionReporter for TracingReporter {
    fn capture_exception(&self, error: &(dyn Error + 'static), context: &ReportContext) {
        self.reported.fetch_add(1, Ordering::Relaxed);

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        tracing::error!(
            target: "repokit::exceptions",
            error = %error,
            causes = ?chain,
            tags = ?context.tags,
            extra = %context.extra,
            "Exception captured"
        );
    }
}
