use crate::audit::AuditSink;
use crate::cache::{Cache, CacheBackend};
use crate::config::GateConfig;
use crate::fallback::FallbackPolicy;
use crate::fga_client::{AuthorizationClient, FgaError};
use crate::models::{resource_type, AccessQuery, Decision, DecisionSource};
use approvals::{
    ApprovalError, ApprovalManager, ApprovalRequest, NewApprovalRequest, Resolution,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Model errors that indicate a misconfigured deployment rather than a bad request
const MODEL_ERROR_CODES: [&str; 2] = [
    "authorization_model_not_found",
    "latest_authorization_model_not_found",
];

#[derive(Debug, Error)]
pub enum EngineError {
    /// The authorization service failed in a way that allows no decision
    #[error("Permission system degraded: {0}")]
    AuthorizationUnavailable(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl From<FgaError> for EngineError {
    fn from(err: FgaError) -> Self {
        match err {
            FgaError::Remote { status: 400, code, message }
                if !MODEL_ERROR_CODES.contains(&code.as_str()) =>
            {
                Self::BadRequest(format!("{}: {}", code, message))
            }
            other => Self::AuthorizationUnavailable(other.to_string()),
        }
    }
}

/// How a single check may use the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Look up and populate
    #[default]
    Use,
    /// Skip the lookup but store the fresh result
    Refresh,
    /// Neither look up nor store
    Bypass,
}

impl CacheMode {
    fn reads(self) -> bool {
        self == Self::Use
    }

    fn writes(self) -> bool {
        self != Self::Bypass
    }
}

/// Final answer to the caller of [`DecisionEngine::authorize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Allowed,
    Denied,
    /// Denied for now, escalated to a human approver
    Pending,
}

#[derive(Debug, Clone)]
pub struct Authorization {
    pub decision: Decision,
    pub outcome: Outcome,
    pub approval: Option<ApprovalRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedObjects {
    pub objects: Vec<String>,
    pub source: DecisionSource,
}

#[derive(Debug, Clone)]
pub struct ApprovalResolution {
    pub request: ApprovalRequest,
    /// Whether the approved access was written to the authorization service
    pub grant_applied: bool,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Relation an actor needs on a resource to grant access to it
    pub grant_relation: String,
    /// Relation an approver needs on the resource of a request
    pub approver_relation: String,
    pub approvals_enabled: bool,
    /// Valid relations per resource type; `None` disables local validation
    pub relations: Option<HashMap<String, Vec<String>>>,
}

impl EngineOptions {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            grant_relation: config.grant_relation.clone(),
            approver_relation: config.approvals.approver_relation.clone(),
            approvals_enabled: config.approvals.enabled,
            relations: config.fga.relations.clone(),
        }
    }
}

/// Orchestrates cache, remote service and fallback table into decisions.
///
/// Each call is independent. The only retries happen inside the client.
pub struct DecisionEngine {
    client: Arc<dyn AuthorizationClient>,
    cache: Arc<Cache>,
    fallback: FallbackPolicy,
    approvals: Arc<ApprovalManager>,
    audit: Arc<dyn AuditSink>,
    options: EngineOptions,
}

impl DecisionEngine {
    pub fn new(
        client: Arc<dyn AuthorizationClient>,
        cache: Arc<Cache>,
        fallback: FallbackPolicy,
        approvals: Arc<ApprovalManager>,
        audit: Arc<dyn AuditSink>,
        options: EngineOptions,
    ) -> Self {
        Self {
            client,
            cache,
            fallback,
            approvals,
            audit,
            options,
        }
    }

    pub fn approvals(&self) -> &Arc<ApprovalManager> {
        &self.approvals
    }

    /// Rejects malformed identifiers and, when configured, unknown relations
    fn validate(&self, query: &AccessQuery) -> Result<(), EngineError> {
        if query.principal.trim().is_empty() {
            return Err(EngineError::BadRequest("principal must not be empty".to_string()));
        }
        let kind = query.resource_type().map_err(EngineError::BadRequest)?;
        self.validate_relation(kind, &query.relation)
    }

    fn validate_relation(&self, kind: &str, relation: &str) -> Result<(), EngineError> {
        if relation.trim().is_empty() {
            return Err(EngineError::BadRequest("relation must not be empty".to_string()));
        }
        let Some(relations) = &self.options.relations else {
            return Ok(());
        };
        match relations.get(kind) {
            None => Err(EngineError::BadRequest(format!(
                "Unknown resource type '{}'",
                kind
            ))),
            Some(valid) if !valid.iter().any(|r| r == relation) => Err(EngineError::BadRequest(
                format!("Relation '{}' is not defined for type '{}'", relation, kind),
            )),
            Some(_) => Ok(()),
        }
    }

    fn emit(&self, decision: Decision) -> Decision {
        self.audit.record(&decision);
        decision
    }

    /// Cache lookup, then remote check, then the fallback table.
    ///
    /// Only a transport-level failure falls back; a rejection by the service
    /// is returned as an error.
    pub async fn check(&self, query: &AccessQuery, mode: CacheMode) -> Result<Decision, EngineError> {
        self.validate(query)?;

        if mode.reads() {
            match self.cache.get(query).await {
                Ok(Some(allowed)) => {
                    debug!("Cache hit for {}", query);
                    return Ok(self.emit(Decision::new(query, allowed, DecisionSource::Cache)));
                }
                Ok(None) => debug!("Cache miss for {}", query),
                Err(e) => {
                    warn!("Dropping unusable cache entry for {}: {}", query, e);
                    self.cache.remove(query).await;
                }
            }
        }

        // Read before the remote call so a concurrent write wins over this result
        let generation = self.cache.generation(&query.resource).await;
        match self.client.check(query).await {
            Ok(allowed) => {
                if mode.writes() {
                    if let Err(e) = self
                        .cache
                        .put(query, allowed, self.cache.ttl(), generation)
                        .await
                    {
                        warn!("Failed to cache decision for {}: {}", query, e);
                    }
                }
                Ok(self.emit(Decision::new(query, allowed, DecisionSource::Remote)))
            }
            Err(FgaError::Unavailable(reason)) => {
                let allowed = self.fallback.decide(query);
                warn!(
                    "Degraded mode: authorization service unavailable ({}), fallback {} for {}",
                    reason,
                    if allowed { "allows" } else { "denies" },
                    query
                );
                Ok(self.emit(Decision::new(query, allowed, DecisionSource::Fallback)))
            }
            Err(err) => {
                error!("Authorization service rejected check for {}: {}", query, err);
                Err(err.into())
            }
        }
    }

    /// `check`, escalating a deny to an approval request when the caller
    /// gave a justification
    pub async fn authorize(
        &self,
        query: &AccessQuery,
        justification: Option<&str>,
        mode: CacheMode,
    ) -> Result<Authorization, EngineError> {
        let decision = self.check(query, mode).await?;
        if decision.allowed {
            return Ok(Authorization {
                decision,
                outcome: Outcome::Allowed,
                approval: None,
            });
        }

        let justification = justification.map(str::trim).filter(|j| !j.is_empty());
        match justification {
            Some(justification) if self.options.approvals_enabled => {
                let request = self.approvals.create_request(NewApprovalRequest {
                    principal: query.principal.clone(),
                    action: query.relation.clone(),
                    resource: query.resource.clone(),
                    justification: justification.to_string(),
                });
                Ok(Authorization {
                    decision,
                    outcome: Outcome::Pending,
                    approval: Some(request),
                })
            }
            _ => Ok(Authorization {
                decision,
                outcome: Outcome::Denied,
                approval: None,
            }),
        }
    }

    /// Requires a decision that came from the service (or its cache)
    async fn require_relation(&self, query: &AccessQuery) -> Result<(), EngineError> {
        let decision = self.check(query, CacheMode::Refresh).await?;
        if !decision.is_authoritative() {
            return Err(EngineError::AuthorizationUnavailable(format!(
                "cannot verify that {} holds {} on {}",
                query.principal, query.relation, query.resource
            )));
        }
        if !decision.allowed {
            return Err(EngineError::PermissionDenied(format!(
                "'{}' lacks '{}' on '{}'",
                query.principal, query.relation, query.resource
            )));
        }
        Ok(())
    }

    /// Checks that `actor` may grant `tuple`. Nothing is changed.
    ///
    /// Granting is split in two so callers can bound this check with a
    /// deadline while [`Self::commit_write`] always completes.
    pub async fn authorize_write(
        &self,
        actor: &str,
        tuple: &AccessQuery,
    ) -> Result<(), EngineError> {
        self.validate(tuple)?;
        let grant = AccessQuery::new(
            actor,
            self.options.grant_relation.clone(),
            tuple.resource.clone(),
        );
        self.require_relation(&grant).await
    }

    /// Writes the tuple and invalidates its resource. Cached entries for the
    /// resource are gone once this returns.
    ///
    /// Runs on its own task, so dropping the returned future does not stop it
    /// between the remote write and the invalidation.
    pub async fn commit_write(&self, tuple: &AccessQuery) -> Result<(), EngineError> {
        let client = self.client.clone();
        let cache = self.cache.clone();
        let tuple = tuple.clone();
        tokio::spawn(async move { write_and_invalidate(client.as_ref(), &cache, &tuple).await })
            .await
            .map_err(|e| {
                EngineError::AuthorizationUnavailable(format!("write task failed: {}", e))
            })?
    }

    /// Resources of a type the principal holds the relation on
    pub async fn list_objects(
        &self,
        principal: &str,
        relation: &str,
        kind: &str,
    ) -> Result<ListedObjects, EngineError> {
        if principal.trim().is_empty() {
            return Err(EngineError::BadRequest("principal must not be empty".to_string()));
        }
        if kind.is_empty() || kind.contains(':') {
            return Err(EngineError::BadRequest(format!(
                "Invalid resource type '{}'",
                kind
            )));
        }
        self.validate_relation(kind, relation)?;

        match self.client.list_objects(principal, relation, kind).await {
            Ok(objects) => Ok(ListedObjects {
                objects,
                source: DecisionSource::Remote,
            }),
            Err(FgaError::Unavailable(reason)) => {
                let objects = self.fallback.objects(principal, relation, kind);
                warn!(
                    "Degraded mode: authorization service unavailable ({}), listing {} fallback {} object(s) for {}",
                    reason,
                    objects.len(),
                    kind,
                    principal
                );
                Ok(ListedObjects {
                    objects,
                    source: DecisionSource::Fallback,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Validates and files an approval request without a preceding check
    pub fn request_approval(
        &self,
        new: NewApprovalRequest,
    ) -> Result<ApprovalRequest, EngineError> {
        if !self.options.approvals_enabled {
            return Err(EngineError::BadRequest(
                "Approval workflow is disabled".to_string(),
            ));
        }
        if new.justification.trim().is_empty() {
            return Err(EngineError::BadRequest(
                "justification must not be empty".to_string(),
            ));
        }
        self.validate(&AccessQuery::new(
            new.principal.clone(),
            new.action.clone(),
            new.resource.clone(),
        ))?;
        Ok(self.approvals.create_request(new))
    }

    /// Checks that the request is still open and that `resolved_by` may
    /// resolve it. Nothing is changed.
    pub async fn authorize_resolution(
        &self,
        id: Uuid,
        resolved_by: &str,
    ) -> Result<ApprovalRequest, EngineError> {
        let request = self.approvals.get_status(id)?;
        if request.status.is_terminal() {
            return Err(ApprovalError::AlreadyResolved {
                id,
                status: request.status,
            }
            .into());
        }

        let approver = AccessQuery::new(
            resolved_by,
            self.options.approver_relation.clone(),
            request.resource.clone(),
        );
        self.require_relation(&approver).await?;
        Ok(request)
    }

    /// Records the resolution and, for an approval, writes the grant to the
    /// authorization service and primes the cache.
    ///
    /// Runs on its own task: once the status has changed, the grant is carried
    /// through even if the caller stops waiting.
    pub async fn commit_resolution(
        &self,
        id: Uuid,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<ApprovalResolution, EngineError> {
        let approvals = self.approvals.clone();
        let client = self.client.clone();
        let cache = self.cache.clone();
        let resolved_by = resolved_by.to_string();

        tokio::spawn(async move {
            let request = approvals.resolve(id, resolution, &resolved_by)?;
            let grant_applied = request.status.grants_access()
                && apply_grant(client.as_ref(), &cache, &request).await;
            Ok::<_, EngineError>(ApprovalResolution {
                request,
                grant_applied,
            })
        })
        .await
        .map_err(|e| {
            EngineError::AuthorizationUnavailable(format!("resolution task failed: {}", e))
        })?
    }
}

/// Writes a tuple, then drops every cached decision on its resource.
///
/// An unavailable service may still have applied the write, so the resource
/// is invalidated in that case too.
async fn write_and_invalidate(
    client: &dyn AuthorizationClient,
    cache: &Cache,
    tuple: &AccessQuery,
) -> Result<(), EngineError> {
    match client.write(tuple).await {
        Ok(()) => {
            let removed = cache.invalidate_resource(&tuple.resource).await;
            debug!("Wrote {} ({} cached decision(s) invalidated)", tuple, removed);
            Ok(())
        }
        Err(err) => {
            error!("Failed to write {}: {}", tuple, err);
            if err.is_unavailable() {
                cache.invalidate_resource(&tuple.resource).await;
            }
            Err(err.into())
        }
    }
}

async fn apply_grant(
    client: &dyn AuthorizationClient,
    cache: &Cache,
    request: &ApprovalRequest,
) -> bool {
    let tuple = AccessQuery::new(
        request.principal.clone(),
        request.action.clone(),
        request.resource.clone(),
    );
    if let Err(e) = write_and_invalidate(client, cache, &tuple).await {
        error!(
            "Approval request {} approved but granting {} failed: {}",
            request.id, tuple, e
        );
        return false;
    }

    let generation = cache.generation(&tuple.resource).await;
    if let Err(e) = cache.put(&tuple, true, cache.ttl(), generation).await {
        warn!("Failed to prime cache for {}: {}", tuple, e);
    }
    info!("Approval request {} granted {}", request.id, tuple);
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audit::tests::RecordingAuditSink;
    use crate::cache::memory::InMemoryCache;
    use crate::config::FallbackRule;
    use approvals::{ApprovalManagerOptions, ApprovalStatus};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-process stand-in for the authorization service
    #[derive(Default)]
    pub(crate) struct StubClient {
        tuples: Mutex<HashSet<AccessQuery>>,
        failure: Mutex<Option<FgaError>>,
        write_failure: Mutex<Option<FgaError>>,
        pub checks: AtomicUsize,
        pub writes: AtomicUsize,
        pub lists: AtomicUsize,
    }

    impl StubClient {
        pub(crate) fn grant(&self, principal: &str, relation: &str, resource: &str) {
            self.tuples
                .lock()
                .unwrap()
                .insert(AccessQuery::new(principal, relation, resource));
        }

        pub(crate) fn revoke(&self, principal: &str, relation: &str, resource: &str) {
            self.tuples
                .lock()
                .unwrap()
                .remove(&AccessQuery::new(principal, relation, resource));
        }

        pub(crate) fn fail_with(&self, err: Option<FgaError>) {
            *self.failure.lock().unwrap() = err;
        }

        pub(crate) fn fail_writes_with(&self, err: Option<FgaError>) {
            *self.write_failure.lock().unwrap() = err;
        }
    }

    #[async_trait::async_trait]
    impl AuthorizationClient for StubClient {
        async fn check(&self, query: &AccessQuery) -> Result<bool, FgaError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failure.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(self.tuples.lock().unwrap().contains(query))
        }

        async fn write(&self, tuple: &AccessQuery) -> Result<(), FgaError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let failure = self
                .write_failure
                .lock()
                .unwrap()
                .clone()
                .or_else(|| self.failure.lock().unwrap().clone());
            if let Some(err) = failure {
                return Err(err);
            }
            self.tuples.lock().unwrap().insert(tuple.clone());
            Ok(())
        }

        async fn list_objects(
            &self,
            principal: &str,
            relation: &str,
            resource_type: &str,
        ) -> Result<Vec<String>, FgaError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failure.lock().unwrap().clone() {
                return Err(err);
            }
            let mut objects: Vec<String> = self
                .tuples
                .lock()
                .unwrap()
                .iter()
                .filter(|t| {
                    t.principal == principal
                        && t.relation == relation
                        && t.resource_type().ok() == Some(resource_type)
                })
                .map(|t| t.resource.clone())
                .collect();
            objects.sort();
            Ok(objects)
        }

        async fn health_check(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct Harness {
        engine: DecisionEngine,
        client: Arc<StubClient>,
        cache: Arc<Cache>,
        audit: Arc<RecordingAuditSink>,
    }

    fn options() -> EngineOptions {
        EngineOptions {
            grant_relation: "owner".to_string(),
            approver_relation: "owner".to_string(),
            approvals_enabled: true,
            relations: None,
        }
    }

    fn harness_with(options: EngineOptions) -> Harness {
        let client = Arc::new(StubClient::default());
        let cache = Arc::new(Cache::InMemory(InMemoryCache::new(60, 1000).unwrap()));
        let audit = Arc::new(RecordingAuditSink::default());
        let fallback = FallbackPolicy::new(
            vec![FallbackRule {
                resource: "document:handbook".to_string(),
                relation: "viewer".to_string(),
                principals: vec![],
            }],
            None,
        );
        let approvals = Arc::new(ApprovalManager::new(ApprovalManagerOptions {
            timeout: Duration::from_secs(60),
        }));
        let engine = DecisionEngine::new(
            client.clone(),
            cache.clone(),
            fallback,
            approvals,
            audit.clone(),
            options,
        );
        Harness {
            engine,
            client,
            cache,
            audit,
        }
    }

    fn harness() -> Harness {
        harness_with(options())
    }

    async fn write(
        engine: &DecisionEngine,
        actor: &str,
        tuple: &AccessQuery,
    ) -> Result<(), EngineError> {
        engine.authorize_write(actor, tuple).await?;
        engine.commit_write(tuple).await
    }

    async fn resolve(
        engine: &DecisionEngine,
        id: Uuid,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<ApprovalResolution, EngineError> {
        engine.authorize_resolution(id, resolved_by).await?;
        engine.commit_resolution(id, resolution, resolved_by).await
    }

    fn plan_viewer() -> AccessQuery {
        AccessQuery::new("user:42", "viewer", "document:plan")
    }

    fn unavailable() -> FgaError {
        FgaError::Unavailable("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_warm_cache_issues_no_remote_call() {
        let h = harness();
        let query = plan_viewer();
        let generation = h.cache.generation(&query.resource).await;
        h.cache
            .put(&query, true, h.cache.ttl(), generation)
            .await
            .unwrap();

        let decision = h.engine.check(&query, CacheMode::Use).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.source, DecisionSource::Cache);
        assert_eq!(h.client.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_checks_are_served_from_cache() {
        let h = harness();
        h.client.grant("user:42", "viewer", "document:plan");

        let first = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(first.source, DecisionSource::Remote);
        for _ in 0..3 {
            let next = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
            assert_eq!(next.allowed, first.allowed);
            assert_eq!(next.source, DecisionSource::Cache);
        }
        assert_eq!(h.client.checks.load(Ordering::SeqCst), 1);
        assert_eq!(h.audit.decisions.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cache_modes() {
        let h = harness();
        h.client.grant("user:42", "viewer", "document:plan");

        // Bypass neither reads nor stores
        let decision = h.engine.check(&plan_viewer(), CacheMode::Bypass).await.unwrap();
        assert_eq!(decision.source, DecisionSource::Remote);
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), None);

        // Refresh skips the lookup but stores
        h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        let decision = h.engine.check(&plan_viewer(), CacheMode::Refresh).await.unwrap();
        assert_eq!(decision.source, DecisionSource::Remote);
        assert_eq!(h.client.checks.load(Ordering::SeqCst), 3);
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_decisions() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");

        // Warm a deny for user:42
        let before = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert!(!before.allowed);
        let cached = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(cached.source, DecisionSource::Cache);

        write(&h.engine, "admin:1", &plan_viewer()).await.unwrap();

        let after = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_ne!(after.source, DecisionSource::Cache);
        assert!(after.allowed);
    }

    #[tokio::test]
    async fn test_write_requires_grant_relation() {
        let h = harness();
        let err = write(&h.engine, "user:7", &plan_viewer()).await.unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied(_)));
        assert_eq!(h.client.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_never_uses_fallback() {
        let h = harness_with(options());
        h.client.fail_with(Some(unavailable()));
        // The fallback table would allow this principal everything in development
        let engine = DecisionEngine {
            fallback: FallbackPolicy::new(vec![], Some("admin".to_string())),
            ..h.engine
        };

        let err = write(&engine, "admin:1", &plan_viewer()).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthorizationUnavailable(_)));
        assert_eq!(h.client.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_when_unavailable() {
        let h = harness();
        h.client.fail_with(Some(unavailable()));

        let denied = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(denied.source, DecisionSource::Fallback);
        assert!(!denied.allowed);

        let handbook = AccessQuery::new("user:42", "viewer", "document:handbook");
        let allowed = h.engine.check(&handbook, CacheMode::Use).await.unwrap();
        assert_eq!(allowed.source, DecisionSource::Fallback);
        assert!(allowed.allowed);

        // Degraded decisions are never cached
        assert_eq!(h.cache.get(&handbook).await.unwrap(), None);
        let audit = h.audit.decisions.lock().unwrap();
        assert!(audit.iter().all(|d| d.source == DecisionSource::Fallback));
    }

    #[tokio::test]
    async fn test_remote_error_is_not_a_fallback() {
        let h = harness();
        h.client.fail_with(Some(FgaError::Remote {
            status: 400,
            code: "authorization_model_not_found".to_string(),
            message: "model not found".to_string(),
        }));
        let err = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthorizationUnavailable(_)));

        h.client.fail_with(Some(FgaError::Remote {
            status: 400,
            code: "validation_error".to_string(),
            message: "invalid object".to_string(),
        }));
        let err = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert!(h.audit.decisions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let h = harness();
        h.client.grant("user:42", "viewer", "document:plan");
        let Cache::InMemory(memory) = h.cache.as_ref() else {
            panic!("expected in-memory cache");
        };
        memory.insert_raw(&plan_viewer(), "garbage").await;

        let decision = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(decision.source, DecisionSource::Remote);
        assert!(decision.allowed);
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_invalid_queries_are_rejected_locally() {
        let mut relations = HashMap::new();
        relations.insert(
            "document".to_string(),
            vec!["viewer".to_string(), "owner".to_string()],
        );
        let h = harness_with(EngineOptions {
            relations: Some(relations),
            ..options()
        });

        for query in [
            AccessQuery::new("user:42", "viewer", "plan"),
            AccessQuery::new("", "viewer", "document:plan"),
            AccessQuery::new("user:42", "manager", "document:plan"),
            AccessQuery::new("user:42", "viewer", "folder:shared"),
        ] {
            let err = h.engine.check(&query, CacheMode::Use).await.unwrap_err();
            assert!(matches!(err, EngineError::BadRequest(_)), "{query}");
        }
        assert_eq!(h.client.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorize_escalates_with_justification() {
        let h = harness();

        let denied = h
            .engine
            .authorize(&plan_viewer(), None, CacheMode::Use)
            .await
            .unwrap();
        assert_eq!(denied.outcome, Outcome::Denied);
        assert!(denied.approval.is_none());

        let pending = h
            .engine
            .authorize(&plan_viewer(), Some("quarterly review"), CacheMode::Use)
            .await
            .unwrap();
        assert_eq!(pending.outcome, Outcome::Pending);
        let request = pending.approval.unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.action, "viewer");
        assert_eq!(request.resource, "document:plan");

        h.client.grant("user:42", "viewer", "document:budget");
        let allowed = h
            .engine
            .authorize(
                &AccessQuery::new("user:42", "viewer", "document:budget"),
                Some("ignored"),
                CacheMode::Use,
            )
            .await
            .unwrap();
        assert_eq!(allowed.outcome, Outcome::Allowed);
    }

    #[tokio::test]
    async fn test_authorize_without_approvals_denies() {
        let h = harness_with(EngineOptions {
            approvals_enabled: false,
            ..options()
        });
        let result = h
            .engine
            .authorize(&plan_viewer(), Some("please"), CacheMode::Use)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Denied);
        assert!(h.engine.approvals().list(None).is_empty());
    }

    #[tokio::test]
    async fn test_approved_request_grants_and_primes_cache() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");

        // Cached deny that the approval must replace
        h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();

        let pending = h
            .engine
            .authorize(&plan_viewer(), Some("need access"), CacheMode::Refresh)
            .await
            .unwrap();
        let id = pending.approval.unwrap().id;

        let resolution = resolve(&h.engine, id, Resolution::Approved, "admin:1")
            .await
            .unwrap();
        assert!(resolution.grant_applied);
        assert_eq!(resolution.request.status, ApprovalStatus::Approved);
        assert_eq!(resolution.request.resolved_by.as_deref(), Some("admin:1"));

        let checks = h.client.checks.load(Ordering::SeqCst);
        let decision = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(decision.source, DecisionSource::Cache);
        assert!(decision.allowed);
        assert_eq!(h.client.checks.load(Ordering::SeqCst), checks);

        // Second resolution conflicts and keeps the first outcome
        let err = resolve(&h.engine, id, Resolution::Denied, "admin:1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Approval(ApprovalError::AlreadyResolved {
                status: ApprovalStatus::Approved,
                ..
            })
        ));
        assert_eq!(
            h.engine.approvals().get_status(id).unwrap().status,
            ApprovalStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_denied_request_writes_nothing() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");
        let id = h
            .engine
            .authorize(&plan_viewer(), Some("need access"), CacheMode::Use)
            .await
            .unwrap()
            .approval
            .unwrap()
            .id;

        let resolution = resolve(&h.engine, id, Resolution::Denied, "admin:1")
            .await
            .unwrap();
        assert!(!resolution.grant_applied);
        assert_eq!(resolution.request.status, ApprovalStatus::Denied);
        assert_eq!(h.client.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolution_requires_approver_relation() {
        let h = harness();
        let id = h
            .engine
            .authorize(&plan_viewer(), Some("need access"), CacheMode::Use)
            .await
            .unwrap()
            .approval
            .unwrap()
            .id;

        let err = resolve(&h.engine, id, Resolution::Approved, "user:42")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied(_)));
        assert_eq!(
            h.engine.approvals().get_status(id).unwrap().status,
            ApprovalStatus::Pending
        );

        let err = resolve(&h.engine, Uuid::new_v4(), Resolution::Approved, "admin:1")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Approval(ApprovalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_grant_is_reported() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");
        let id = h
            .engine
            .authorize(&plan_viewer(), Some("need access"), CacheMode::Use)
            .await
            .unwrap()
            .approval
            .unwrap()
            .id;

        h.client.fail_writes_with(Some(unavailable()));
        let resolution = resolve(&h.engine, id, Resolution::Approved, "admin:1")
            .await
            .unwrap();
        assert!(!resolution.grant_applied);
        assert_eq!(resolution.request.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_unavailable_write_still_invalidates() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");

        // Warm a deny that an applied-but-unacknowledged write would make stale
        h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), Some(false));

        h.client.fail_writes_with(Some(unavailable()));
        let err = write(&h.engine, "admin:1", &plan_viewer()).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthorizationUnavailable(_)));
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_cache() {
        let h = harness();
        h.client.grant("admin:1", "owner", "document:plan");
        h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();

        h.client.fail_writes_with(Some(FgaError::Remote {
            status: 400,
            code: "validation_error".to_string(),
            message: "invalid tuple".to_string(),
        }));
        let err = write(&h.engine, "admin:1", &plan_viewer()).await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert_eq!(h.cache.get(&plan_viewer()).await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_list_objects_falls_back_to_enumerated_resources() {
        let h = harness();
        h.client.grant("user:42", "viewer", "document:plan");

        let listed = h
            .engine
            .list_objects("user:42", "viewer", "document")
            .await
            .unwrap();
        assert_eq!(listed.source, DecisionSource::Remote);
        assert_eq!(listed.objects, vec!["document:plan"]);

        h.client.fail_with(Some(unavailable()));
        let listed = h
            .engine
            .list_objects("user:42", "viewer", "document")
            .await
            .unwrap();
        assert_eq!(listed.source, DecisionSource::Fallback);
        assert_eq!(listed.objects, vec!["document:handbook"]);

        assert!(matches!(
            h.engine.list_objects("user:42", "viewer", "document:plan").await,
            Err(EngineError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_tuple_is_visible_after_ttl_only_through_write() {
        let h = harness();
        h.client.grant("user:42", "viewer", "document:plan");
        h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();

        // Revocation outside this process is only seen once the entry expires
        // or the resource is invalidated
        h.client.revoke("user:42", "viewer", "document:plan");
        let cached = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert!(cached.allowed);
        h.cache.invalidate_resource("document:plan").await;
        let fresh = h.engine.check(&plan_viewer(), CacheMode::Use).await.unwrap();
        assert!(!fresh.allowed);
    }
}
