use crate::config::{Environment, FallbackRule, GateConfig};
use crate::models::{fga_user, resource_type, AccessQuery};
use log::{info, warn};

/// Degraded-mode decision table, consulted only while the authorization
/// service is unreachable.
///
/// Anything not explicitly listed is denied.
#[derive(Debug, Clone, Default)]
pub struct FallbackPolicy {
    rules: Vec<FallbackRule>,
    dev_admin_marker: Option<String>,
}

impl FallbackPolicy {
    pub fn new(rules: Vec<FallbackRule>, dev_admin_marker: Option<String>) -> Self {
        Self {
            rules,
            dev_admin_marker,
        }
    }

    /// Builds the table from the configured rules.
    /// The admin marker is only honoured in development.
    pub fn from_config(config: &GateConfig) -> Result<Self, String> {
        let rules = config.fallback.load_rules()?;
        for rule in &rules {
            validate_rule(rule)?;
        }

        let dev_admin_marker = match config.environment()? {
            Environment::Development => config.fallback.dev_admin_marker.clone(),
            Environment::Production => None,
        };
        if let Some(marker) = &dev_admin_marker {
            warn!(
                "Development fallback enabled: principals containing '{}' hold every relation during outages",
                marker
            );
        }
        info!("Loaded {} fallback rule(s)", rules.len());
        Ok(Self::new(rules, dev_admin_marker))
    }

    /// Degraded-mode answer for the query; `false` unless a rule matches
    pub fn decide(&self, query: &AccessQuery) -> bool {
        if let Some(marker) = &self.dev_admin_marker {
            if query.principal.contains(marker.as_str()) {
                return true;
            }
        }
        self.rules.iter().any(|rule| {
            rule.relation == query.relation
                && resource_matches(&rule.resource, &query.resource)
                && principal_matches(rule, &query.principal)
        })
    }

    /// Explicitly listed resources of `resource_type` the principal holds
    /// `relation` on. Wildcard rules cannot be enumerated and are skipped.
    pub fn objects(&self, principal: &str, relation: &str, resource_type: &str) -> Vec<String> {
        let mut objects: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.relation == relation
                    && !is_wildcard(&rule.resource)
                    && rule
                        .resource
                        .split_once(':')
                        .is_some_and(|(kind, _)| kind == resource_type)
                    && principal_matches(rule, principal)
            })
            .map(|rule| rule.resource.clone())
            .collect();
        objects.sort();
        objects.dedup();
        objects
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.ends_with(":*")
}

fn validate_rule(rule: &FallbackRule) -> Result<(), String> {
    if rule.relation.is_empty() {
        return Err(format!(
            "Fallback rule for '{}' has an empty relation",
            rule.resource
        ));
    }
    resource_type(&rule.resource).map(|_| ())
}

fn resource_matches(pattern: &str, resource: &str) -> bool {
    match pattern.strip_suffix(":*") {
        Some(kind) => resource
            .split_once(':')
            .is_some_and(|(resource_kind, id)| resource_kind == kind && !id.is_empty()),
        None => pattern == resource,
    }
}

fn principal_matches(rule: &FallbackRule, principal: &str) -> bool {
    rule.principals.is_empty()
        || rule
            .principals
            .iter()
            .any(|p| fga_user(p) == fga_user(principal))
}
