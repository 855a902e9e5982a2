use crate::models::{Decision, DecisionSource};
use log::{error, info, warn};

/// Log target of decision records
pub const AUDIT_TARGET: &str = "audit";

/// Receives every decision the engine produces.
///
/// Recording is fire-and-forget: implementations swallow their own failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, decision: &Decision);
}

/// Writes one JSON line per decision on the `audit` log target.
/// Degraded-mode decisions are emitted at `warn` so they stand out.
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, decision: &Decision) {
        let line = match serde_json::to_string(decision) {
            Ok(line) => line,
            Err(e) => {
                error!(target: AUDIT_TARGET, "Failed to serialize decision: {}", e);
                return;
            }
        };
        match decision.source {
            DecisionSource::Fallback => warn!(target: AUDIT_TARGET, "{}", line),
            DecisionSource::Cache | DecisionSource::Remote => info!(target: AUDIT_TARGET, "{}", line),
        }
    }
}
