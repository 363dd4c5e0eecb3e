//! # Event Bus System
//!
//! Broadcasts what the catalog and vault are doing using `tokio::sync::broadcast`,
//! so hosts can react without polling and tests can observe side effects.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Typed enums per domain (catalog, vault, library)
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ Reconciler  ├──────────────>│           │
//! └─────────────┘               │           │
//!                               │ EventBus  │
//! ┌─────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │Vault Manager├──────────────>│  channel) ├─────────────────>│ Subscriber │
//! └─────────────┘               │           │                  └────────────┘
//!                               │           │
//! ┌─────────────┐     emit      │           │     subscribe    ┌────────────┐
//! │  Service    ├──────────────>│           ├─────────────────>│ Subscriber │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, VaultEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut vault_events =
//!     EventStream::new(event_bus.subscribe()).filter(|e| matches!(e, CoreEvent::Vault(_)));
//!
//! event_bus
//!     .emit(CoreEvent::Vault(VaultEvent::Hidden {
//!         original_path: "/dcim/cam/a.jpg".to_string(),
//!         vault_path: "/data/.vault/1700000000000_a.jpg".to_string(),
//!     }))
//!     .ok();
//!
//! let event = vault_events.recv().await.unwrap();
//! assert_eq!(event.description(), "File moved into the vault");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Scanning and reconciliation
    Catalog(CatalogEvent),
    /// Hide and restore
    Vault(VaultEvent),
    /// User-driven catalog changes
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Vault(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Catalog(CatalogEvent::ReconcileFailed { .. }) => EventSeverity::Error,
            CoreEvent::Vault(VaultEvent::LedgerFailure { .. }) => EventSeverity::Error,
            CoreEvent::Catalog(CatalogEvent::ScanUnavailable { .. }) => EventSeverity::Warning,
            CoreEvent::Vault(VaultEvent::ResidualOriginal { .. }) => EventSeverity::Warning,
            CoreEvent::Vault(VaultEvent::ConsistencyChecked {
                orphan_files,
                missing_files,
            }) if *orphan_files > 0 || *missing_files > 0 => EventSeverity::Warning,
            CoreEvent::Catalog(CatalogEvent::ReconcileCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Vault(VaultEvent::Hidden { .. } | VaultEvent::Restored { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events emitted by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// A reconcile run began.
    ReconcileStarted {
        /// Unique identifier for this run.
        run_id: String,
        /// Rendered scope (`everything` or `subtree:<path>`).
        scope: String,
    },
    /// A reconcile run applied all changes.
    ReconcileCompleted {
        run_id: String,
        scope: String,
        added: u64,
        updated: u64,
        removed: u64,
        unchanged: u64,
        directories_updated: u64,
        directories_removed: u64,
        duration_ms: u64,
    },
    /// A reconcile run stopped early; aggregates for applied changes were still refreshed.
    ReconcileCancelled {
        run_id: String,
        scope: String,
        /// Item mutations committed before cancellation.
        applied: u64,
    },
    /// A reconcile run failed after the scan (store error).
    ReconcileFailed {
        run_id: String,
        scope: String,
        message: String,
    },
    /// The media index could not be queried; the cache was kept as is.
    ScanUnavailable { scope: String, message: String },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::ReconcileStarted { .. } => "Catalog reconcile started",
            CatalogEvent::ReconcileCompleted { .. } => "Catalog reconcile completed",
            CatalogEvent::ReconcileCancelled { .. } => "Catalog reconcile cancelled",
            CatalogEvent::ReconcileFailed { .. } => "Catalog reconcile failed",
            CatalogEvent::ScanUnavailable { .. } => "Media index unavailable, serving cached catalog",
        }
    }
}

// ============================================================================
// Vault Events
// ============================================================================

/// Events emitted by the vault manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum VaultEvent {
    /// A file was copied into the vault, recorded and its original removed.
    Hidden {
        original_path: String,
        vault_path: String,
    },
    /// A file was copied back out and its ledger record removed.
    Restored {
        original_path: String,
        vault_path: String,
    },
    /// A hide succeeded but the original could not be deleted; a duplicate remains.
    ResidualOriginal {
        original_path: String,
        vault_path: String,
        message: String,
    },
    /// Writing or removing a ledger record failed.
    LedgerFailure { path: String, message: String },
    /// Vault storage was compared against the ledger.
    ConsistencyChecked {
        /// Files in the vault with no ledger record.
        orphan_files: u64,
        /// Ledger records whose vault file is gone.
        missing_files: u64,
    },
}

impl VaultEvent {
    fn description(&self) -> &str {
        match self {
            VaultEvent::Hidden { .. } => "File moved into the vault",
            VaultEvent::Restored { .. } => "File restored from the vault",
            VaultEvent::ResidualOriginal { .. } => "Original left in place after hide",
            VaultEvent::LedgerFailure { .. } => "Vault ledger write failed",
            VaultEvent::ConsistencyChecked { .. } => "Vault consistency checked",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events for catalog changes made on behalf of the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Favorite flag toggled.
    FavoriteChanged { path: String, is_favorite: bool },
    /// An item left the catalog because it was hidden.
    ItemHidden { path: String },
    /// An item re-entered the catalog after a restore.
    ItemRestored { path: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::FavoriteChanged { .. } => "Favorite toggled",
            LibraryEvent::ItemHidden { .. } => "Item hidden from catalog",
            LibraryEvent::ItemRestored { .. } => "Item restored to catalog",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every publisher in the core.
///
/// Cloning is cheap and every clone publishes into the same channel. Each
/// [`subscribe`](Self::subscribe) call sees only events emitted after it; a
/// subscriber that falls more than `capacity` events behind gets
/// [`RecvError::Lagged`] and then continues with the newest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber and return how many there were.
    ///
    /// Fails only when nobody is subscribed; publishers in this workspace ignore that.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A subscription that can drop events it is not interested in.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream};
///
/// let bus = EventBus::default();
/// let problems = EventStream::new(bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Keep only events for which `predicate` returns true. Replaces any earlier filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |keep| keep(event))
    }

    /// Wait for the next matching event.
    ///
    /// Lag and closure are reported as they happen, even if the missed events
    /// would have been filtered out.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event that is already queued, or `None`.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(path: &str) -> CoreEvent {
        CoreEvent::Vault(VaultEvent::Hidden {
            original_path: path.to_string(),
            vault_path: format!("/vault/1_{}", path.trim_start_matches('/')),
        })
    }

    fn completed() -> CoreEvent {
        CoreEvent::Catalog(CatalogEvent::ReconcileCompleted {
            run_id: "run-1".to_string(),
            scope: "everything".to_string(),
            added: 3,
            updated: 1,
            removed: 2,
            unchanged: 10,
            directories_updated: 2,
            directories_removed: 1,
            duration_ms: 40,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(hidden("/a.jpg")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = completed();
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Vault(_)));

        bus.emit(completed()).ok();
        let vault_event = hidden("/dcim/a.jpg");
        bus.emit(vault_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), vault_event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(hidden(&format!("/{}.jpg", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let ledger = CoreEvent::Vault(VaultEvent::LedgerFailure {
            path: "/a.jpg".to_string(),
            message: "disk full".to_string(),
        });
        assert_eq!(ledger.severity(), EventSeverity::Error);

        let unavailable = CoreEvent::Catalog(CatalogEvent::ScanUnavailable {
            scope: "everything".to_string(),
            message: "index offline".to_string(),
        });
        assert_eq!(unavailable.severity(), EventSeverity::Warning);

        let clean = CoreEvent::Vault(VaultEvent::ConsistencyChecked {
            orphan_files: 0,
            missing_files: 0,
        });
        assert_eq!(clean.severity(), EventSeverity::Debug);

        let dirty = CoreEvent::Vault(VaultEvent::ConsistencyChecked {
            orphan_files: 1,
            missing_files: 0,
        });
        assert_eq!(dirty.severity(), EventSeverity::Warning);

        assert_eq!(completed().severity(), EventSeverity::Info);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(hidden("/a.jpg").description(), "File moved into the vault");
        assert_eq!(completed().description(), "Catalog reconcile completed");
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                bus1.emit(hidden(&format!("/{}.jpg", i))).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for _ in 0..10 {
                bus2.emit(completed()).ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_event_serialization() {
        let event = completed();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ReconcileCompleted"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        let event = CoreEvent::Library(LibraryEvent::FavoriteChanged {
            path: "/a.jpg".to_string(),
            is_favorite: true,
        });
        bus.emit(event.clone()).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, event);
    }
}
