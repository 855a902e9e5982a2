use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// One authorization question: may `principal` hold `relation` on `resource`?
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq, Hash)]
pub struct AccessQuery {
    /// Authenticated actor identifier (e.g. `user:42`)
    pub principal: String,
    /// Access level relative to the resource (e.g. `viewer`)
    pub relation: String,
    /// Typed resource identifier (`type:instance-id`)
    pub resource: String,
}

impl AccessQuery {
    pub fn new(
        principal: impl Into<String>,
        relation: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            relation: relation.into(),
            resource: resource.into(),
        }
    }

    /// Type part of the resource identifier
    pub fn resource_type(&self) -> Result<&str, String> {
        resource_type(&self.resource)
    }
}

impl fmt::Display for AccessQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.resource, self.relation, self.principal)
    }
}

/// Which path produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Cache,
    Remote,
    Fallback,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Result of one authorization query. Never mutated after creation.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub source: DecisionSource,
    pub resource: String,
    pub relation: String,
    pub principal: String,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn new(query: &AccessQuery, allowed: bool, source: DecisionSource) -> Self {
        Self {
            allowed,
            source,
            resource: query.resource.clone(),
            relation: query.relation.clone(),
            principal: query.principal.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Degraded-mode decisions never authorize privileged operations
    pub fn is_authoritative(&self) -> bool {
        self.source != DecisionSource::Fallback
    }
}

/// Splits `type:instance-id` and returns the type.
pub fn resource_type(resource: &str) -> Result<&str, String> {
    match resource.split_once(':') {
        Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(kind),
        _ => Err(format!(
            "Invalid resource '{}', expected 'type:instance-id'",
            resource
        )),
    }
}

/// Principal identifier as sent to the authorization service.
///
/// Untyped subject ids are treated as users.
pub fn fga_user(principal: &str) -> String {
    if principal.contains(':') {
        principal.to_string()
    } else {
        format!("user:{}", principal)
    }
}
