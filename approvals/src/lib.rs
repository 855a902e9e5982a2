//! `ApprovalManager` turns a denied access check into an asynchronous human decision.
//!
//! Every request starts `pending` and moves exactly once to `approved`, `denied`
//! or `expired`. Each pending request owns a timer task that expires it when the
//! configured window elapses; the timer never approves anything. Resolving a
//! request cancels its timer, and dropping the manager cancels all of them.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

mod error;
mod notifier;
mod request;
mod stats;

pub use error::ApprovalError;
pub use notifier::{LogNotifier, Notifier};
pub use request::{ApprovalRequest, ApprovalStatus, NewApprovalRequest, Resolution};
pub use stats::ApprovalStatsSnapshot;

use stats::ApprovalStats;

#[derive(Debug, Clone)]
pub struct ApprovalManagerOptions {
    /// How long a request may stay pending before it expires (default: 15 min)
    pub timeout: Duration,
}

impl Default for ApprovalManagerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

struct Slot {
    request: ApprovalRequest,
    /// Monotonic deadline, mirrors `request.expires_at`
    deadline: Instant,
    /// Cancels the timeout task once the request leaves `pending`
    timer: CancellationToken,
}

type Store = Arc<Mutex<HashMap<Uuid, Slot>>>;

pub struct ApprovalManager {
    store: Store,
    notifier: Arc<dyn Notifier>,
    stats: Arc<ApprovalStats>,
    /// Parent of every per-request timer token
    shutdown_token: CancellationToken,
    opt: ApprovalManagerOptions,
}

impl ApprovalManager {
    /// Creates a manager that reports to the log only.
    pub fn new(opt: ApprovalManagerOptions) -> Self {
        Self::with_notifier(opt, Arc::new(LogNotifier))
    }

    pub fn with_notifier(opt: ApprovalManagerOptions, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            notifier,
            stats: Arc::new(ApprovalStats::default()),
            shutdown_token: CancellationToken::new(),
            opt,
        }
    }

    /// Records a new pending request and starts its timeout timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_request(&self, new: NewApprovalRequest) -> ApprovalRequest {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(self.opt.timeout)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let deadline = Instant::now()
            .checked_add(self.opt.timeout)
            .unwrap_or_else(far_future);

        let request = ApprovalRequest {
            id,
            principal: new.principal,
            action: new.action,
            resource: new.resource,
            justification: new.justification,
            status: ApprovalStatus::Pending,
            created_at: now,
            expires_at,
            resolved_at: None,
            resolved_by: None,
        };

        let timer = self.shutdown_token.child_token();
        lock(&self.store).insert(
            id,
            Slot {
                request: request.clone(),
                deadline,
                timer: timer.clone(),
            },
        );
        self.stats.increment_created();
        self.spawn_timer(id, timer, deadline);

        self.notifier.request_created(&request);
        request
    }

    /// Moves a pending request to `approved` or `denied`.
    ///
    /// The status check and the update happen under one lock, so of two
    /// concurrent resolutions exactly one succeeds.
    pub fn resolve(
        &self,
        id: Uuid,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut expired = None;
        let result = {
            let mut store = lock(&self.store);
            let slot = store.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
            if expire_if_overdue(slot, &self.stats) {
                expired = Some(slot.request.clone());
            }

            if slot.request.status.is_terminal() {
                Err(ApprovalError::AlreadyResolved {
                    id,
                    status: slot.request.status,
                })
            } else {
                slot.request.status = resolution.into();
                slot.request.resolved_at = Some(Utc::now());
                slot.request.resolved_by = Some(resolved_by.to_string());
                slot.timer.cancel();
                match resolution {
                    Resolution::Approved => self.stats.increment_approved(),
                    Resolution::Denied => self.stats.increment_denied(),
                }
                Ok(slot.request.clone())
            }
        };

        if let Some(expired) = expired {
            self.notifier.request_resolved(&expired);
        }
        match &result {
            Ok(resolved) => {
                info!(
                    "Approval request {} {} by '{}'",
                    id, resolved.status, resolved_by
                );
                self.notifier.request_resolved(resolved);
            }
            Err(e) => warn!("Rejected resolution of approval request {}: {}", id, e),
        }
        result
    }

    /// Returns the current state of a request.
    pub fn get_status(&self, id: Uuid) -> Result<ApprovalRequest, ApprovalError> {
        let (request, newly_expired) = {
            let mut store = lock(&self.store);
            let slot = store.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
            let newly_expired = expire_if_overdue(slot, &self.stats);
            (slot.request.clone(), newly_expired)
        };
        if newly_expired {
            self.notifier.request_resolved(&request);
        }
        Ok(request)
    }

    /// Lists requests ordered by creation time, optionally filtered by status.
    pub fn list(&self, status: Option<ApprovalStatus>) -> Vec<ApprovalRequest> {
        let (mut requests, newly_expired) = {
            let mut store = lock(&self.store);
            let mut newly_expired = Vec::new();
            for slot in store.values_mut() {
                if expire_if_overdue(slot, &self.stats) {
                    newly_expired.push(slot.request.clone());
                }
            }
            let requests: Vec<ApprovalRequest> = store
                .values()
                .filter(|slot| status.is_none_or(|s| slot.request.status == s))
                .map(|slot| slot.request.clone())
                .collect();
            (requests, newly_expired)
        };
        for request in &newly_expired {
            self.notifier.request_resolved(request);
        }
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub fn stats(&self) -> ApprovalStatsSnapshot {
        ApprovalStatsSnapshot::from(self.stats.as_ref())
    }

    /// Starts the timeout task of a single request.
    fn spawn_timer(&self, id: Uuid, timer: CancellationToken, deadline: Instant) {
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    debug!("Timer of approval request {} cancelled", id);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let expired = {
                        let mut store = lock(&store);
                        match store.get_mut(&id) {
                            Some(slot) => {
                                if expire_if_overdue(slot, &stats) {
                                    Some(slot.request.clone())
                                } else {
                                    None
                                }
                            }
                            _ => None,
                        }
                    };
                    if let Some(expired) = expired {
                        info!("Approval request {} expired without a decision", id);
                        notifier.request_resolved(&expired);
                    }
                }
            }
        });
    }
}

impl Drop for ApprovalManager {
    fn drop(&mut self) {
        debug!("Approval manager is dropping, cancelling pending timers");
        self.shutdown_token.cancel();
    }
}

/// Expires a pending slot whose deadline has passed. Returns true on transition.
fn expire_if_overdue(slot: &mut Slot, stats: &ApprovalStats) -> bool {
    if slot.request.status != ApprovalStatus::Pending || Instant::now() < slot.deadline {
        return false;
    }
    slot.request.status = ApprovalStatus::Expired;
    slot.request.resolved_at = Some(Utc::now());
    slot.timer.cancel();
    stats.increment_expired();
    true
}

fn lock(store: &Store) -> MutexGuard<'_, HashMap<Uuid, Slot>> {
    // A panic while holding the lock cannot leave a slot half-updated
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(100 * 365 * 24 * 60 * 60)
}
