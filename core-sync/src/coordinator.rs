//! # Reconcile Coordinator
//!
//! Runs reconciles on worker tasks with single-flight semantics per scope.
//!
//! ## Overview
//!
//! - A second request for a scope that is already reconciling joins the running
//!   pass and receives the same result
//! - At most `max_concurrent` passes run at once; the rest wait on a semaphore
//! - Every pass gets its own `CancellationToken`, reachable through
//!   [`ReconcileCoordinator::cancel`] and [`ReconcileCoordinator::cancel_all`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::ReconcileCoordinator;
//! use bridge_traits::index::Scope;
//! use std::sync::Arc;
//!
//! # async fn example(coordinator: Arc<ReconcileCoordinator>) -> core_sync::Result<()> {
//! let report = coordinator.reconcile(Scope::subtree("/dcim/cam")).await?;
//! println!("{} added, {} removed", report.added, report.removed);
//! # Ok(())
//! # }
//! ```

use crate::reconciler::Reconciler;
use crate::run::ReconcileReport;
use crate::{Result, SyncError};
use bridge_traits::index::Scope;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

type SharedRun = Shared<BoxFuture<'static, Result<ReconcileReport>>>;

/// A pass that callers can join or cancel.
#[derive(Clone)]
struct InFlight {
    run: SharedRun,
    cancellation_token: CancellationToken,
}

/// Clones share the in-flight map and the concurrency limit.
#[derive(Clone)]
pub struct ReconcileCoordinator {
    reconciler: Arc<Reconciler>,
    limiter: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<Scope, InFlight>>>,
}

impl ReconcileCoordinator {
    pub fn new(reconciler: Arc<Reconciler>, max_concurrent: usize) -> Self {
        Self {
            reconciler,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Reconcile `scope`, joining a pass that is already running for it.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn reconcile(&self, scope: Scope) -> Result<ReconcileReport> {
        let run = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&scope) {
                Some(existing) => {
                    debug!("Joining in-flight reconcile");
                    existing.run.clone()
                }
                None => {
                    let entry = self.spawn_run(scope.clone());
                    let run = entry.run.clone();
                    in_flight.insert(scope, entry);
                    run
                }
            }
        };

        run.await
    }

    /// Spawn the pass onto the runtime. The task removes its own entry when done;
    /// it cannot do so before the caller inserts it because both hold the map lock.
    fn spawn_run(&self, scope: Scope) -> InFlight {
        let reconciler = Arc::clone(&self.reconciler);
        let limiter = Arc::clone(&self.limiter);
        let in_flight = Arc::clone(&self.in_flight);
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let handle = tokio::spawn(async move {
            let result = match limiter.acquire_owned().await {
                Ok(_permit) => reconciler.reconcile(&scope, &token).await,
                Err(e) => Err(SyncError::Aborted(e.to_string())),
            };
            in_flight.lock().await.remove(&scope);
            result
        });

        let run = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(SyncError::Aborted(e.to_string())))
        }
        .boxed()
        .shared();

        InFlight {
            run,
            cancellation_token,
        }
    }

    /// Cancel the pass running for `scope`. Returns `false` when none is running.
    pub async fn cancel(&self, scope: &Scope) -> bool {
        let in_flight = self.in_flight.lock().await;
        match in_flight.get(scope) {
            Some(entry) => {
                entry.cancellation_token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running pass.
    pub async fn cancel_all(&self) {
        let in_flight = self.in_flight.lock().await;
        for entry in in_flight.values() {
            entry.cancellation_token.cancel();
        }
    }

    pub async fn is_running(&self, scope: &Scope) -> bool {
        self.in_flight.lock().await.contains_key(scope)
    }
}

impl std::fmt::Debug for ReconcileCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileCoordinator")
            .field("available_permits", &self.limiter.available_permits())
            .finish_non_exhaustive()
    }
}
