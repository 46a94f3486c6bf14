//! Session Recovery Coordinator: single-flight credential refresh.
//!
//! State is a slot holding the pending exchange. Empty slot means Idle; a
//! filled slot means Refreshing, and every caller that finds it filled
//! awaits the same shared result instead of starting its own exchange.
//!
//! The check and the install happen under one lock acquisition, before the
//! first caller yields, so a second caller can never observe Idle while an
//! exchange is being started.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use http::StatusCode;
use parking_lot::Mutex;

use crate::call::OutgoingCall;

type PendingRefresh = Shared<BoxFuture<'static, bool>>;
type Slot = Arc<Mutex<Option<PendingRefresh>>>;

/// What the caller path does after a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Return the original failure unchanged.
    Surface,
    /// The session was refreshed: re-issue this call (already marked as the retry).
    Retry(OutgoingCall),
}

/// Whether a response to `call` should enter session recovery.
///
/// Only a received 401 qualifies, and only for a call that is neither the
/// retry itself nor aimed at the refresh endpoint.
#[must_use]
pub fn wants_refresh(call: &OutgoingCall, status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED && !call.is_retry() && !call.targets_refresh_endpoint()
}

/// Coordinates at most one outstanding refresh exchange per client.
///
/// The exchange runs on its own task, so it completes and resets the state
/// even if every caller waiting on it is dropped.
#[derive(Default)]
pub struct RefreshCoordinator {
    pending: Slot,
    started: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("exchanges_started", &self.exchanges_started())
            .finish()
    }
}

impl RefreshCoordinator {
    /// Idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an exchange is outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Number of exchanges started since creation.
    #[must_use]
    pub fn exchanges_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Join the exchange in flight, or start one built by `exchange`.
    ///
    /// `exchange` is only invoked when no exchange is outstanding. All
    /// callers that join the same exchange receive the same result. A
    /// panicking exchange counts as a failed refresh.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn refresh<F, Fut>(&self, exchange: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let pending = {
            let mut slot = self.pending.lock();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.start(exchange());
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Decide what to do with a 401 for `call`.
    ///
    /// Calls that do not qualify (see [`wants_refresh`]) are surfaced without
    /// touching the refresh state.
    pub async fn recover<F, Fut>(
        &self,
        call: &OutgoingCall,
        status: StatusCode,
        exchange: F,
    ) -> Recovery
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if !wants_refresh(call, status) {
            return Recovery::Surface;
        }
        if self.refresh(exchange).await {
            Recovery::Retry(call.as_retry())
        } else {
            Recovery::Surface
        }
    }

    fn start<Fut>(&self, exchange: Fut) -> PendingRefresh
    where
        Fut: Future<Output = bool> + Send + 'static,
    {
        let generation = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Arc::clone(&self.pending);

        tracing::info!(target: "polaris::gateway", generation, "session refresh started");
        let task = tokio::spawn(async move {
            let _reset = ResetOnDrop(slot);
            let refreshed = exchange.await;
            if refreshed {
                tracing::info!(target: "polaris::gateway", generation, "session refresh succeeded");
            } else {
                tracing::warn!(target: "polaris::gateway", generation, "session refresh failed");
            }
            refreshed
        });

        task.map(|joined| joined.unwrap_or(false)).boxed().shared()
    }
}

/// Returns the coordinator to Idle when the exchange task ends, however it ends.
struct ResetOnDrop(Slot);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}
