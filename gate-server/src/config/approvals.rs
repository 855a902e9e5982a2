use confique::Config;
use std::time::Duration;

/// Configuration for escalating denied requests to a human approver
#[derive(Debug, Config, Clone)]
pub struct ApprovalsConfig {
    /// Allow denied checks to be escalated (default: true)
    #[config(env = "GATE_APPROVALS_ENABLED", default = true)]
    pub enabled: bool,

    /// Seconds a request may stay pending before it expires (default: 900)
    #[config(env = "GATE_APPROVALS_TIMEOUT_SECS", default = 900)]
    pub timeout_secs: u64,

    /// Relation an approver must hold on the resource (default: owner)
    #[config(env = "GATE_APPROVALS_APPROVER_RELATION", default = "owner")]
    pub approver_relation: String,
}

impl ApprovalsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
