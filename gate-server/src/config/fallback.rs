use confique::Config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for degraded-mode decisions
#[derive(Debug, Config, Clone)]
pub struct FallbackConfig {
    /// Optional JSON file with additional rules (a list of rule objects)
    #[config(env = "GATE_FALLBACK_RULES_FILE")]
    pub rules_file: Option<String>,

    /// Development only: principals containing this marker are treated as
    /// holding every relation while the remote service is unreachable.
    /// Rejected when running in production.
    #[config(env = "GATE_FALLBACK_DEV_ADMIN_MARKER")]
    pub dev_admin_marker: Option<String>,

    /// Rules from the config file (`[[fallback.rules]]`)
    pub rules: Option<Vec<FallbackRule>>,
}

/// One explicitly allowed (resource pattern, relation) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Exact resource (`document:handbook`) or a type wildcard (`document:*`)
    pub resource: String,
    pub relation: String,
    /// Principals the rule applies to; empty means any authenticated principal
    #[serde(default)]
    pub principals: Vec<String>,
}

impl FallbackConfig {
    /// Collects the rules of the config file and of the rules file
    pub fn load_rules(&self) -> Result<Vec<FallbackRule>, String> {
        let mut rules = self.rules.clone().unwrap_or_default();
        if let Some(path) = &self.rules_file {
            rules.extend(load_rules_file(path)?);
        }
        Ok(rules)
    }
}

/// Load fallback rules from a JSON file.
/// Unlike optional config files, a configured rules file must exist and parse.
pub fn load_rules_file<P: AsRef<Path>>(path: P) -> Result<Vec<FallbackRule>, String> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read fallback rules file at {}: {}",
            path.display(),
            e
        )
    })?;

    let rules: Vec<FallbackRule> = serde_json::from_str(&contents).map_err(|e| {
        format!(
            "Failed to parse fallback rules file at {}: {}",
            path.display(),
            e
        )
    })?;
    log::info!(
        "Loaded {} fallback rule(s) from {}",
        rules.len(),
        path.display()
    );
    Ok(rules)
}
