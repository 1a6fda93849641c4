mod context;
mod redaction;
mod reporter;

pub use context::TraceContext;
pub use redaction::{Redactor, DEFAULT_SENSITIVE_FIELDS, REDACTED};
pub use reporter::{ExceptionReporter, NoopReporter, ReportContext};
