//! Diagnostics that must not abort the caller.
//!
//! Some failures are reported and then either re-raised (argument
//! deserialization) or swallowed (progress notifications). Both go through a
//! [`DiagnosticSink`] so the host decides where they end up; the default sink
//! writes them to `tracing`.

use std::fmt;

use tracing::{error, warn};

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticEvent {
    ArgumentDeserializationFailure,
    ProgressNotificationError,
}

impl DiagnosticEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticEvent::ArgumentDeserializationFailure => "argument_deserialization_failure",
            DiagnosticEvent::ProgressNotificationError => "progress_notification_error",
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn warning(&self, event: DiagnosticEvent, message: &str);

    fn error(&self, event: DiagnosticEvent, message: &str);
}

/// Default sink: `warn!` for warnings, `error!` for errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warning(&self, event: DiagnosticEvent, message: &str) {
        warn!(event = %event, "{}", message);
    }

    fn error(&self, event: DiagnosticEvent, message: &str) {
        error!(event = %event, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_tracing_diagnostics() {
        let sink = TracingDiagnostics;
        sink.warning(DiagnosticEvent::ArgumentDeserializationFailure, "bad argument");
        sink.error(DiagnosticEvent::ProgressNotificationError, "bad progress");

        assert!(logs_contain("bad argument"));
        assert!(logs_contain("argument_deserialization_failure"));
        assert!(logs_contain("bad progress"));
        assert!(logs_contain("progress_notification_error"));
    }
}
