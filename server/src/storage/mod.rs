//! Process-wide storage handle with lazy, single-flight connection setup.
//!
//! [`StorageManager`] owns the one handle every request handler shares. The
//! first [`StorageManager::acquire`] call dials the store on a spawned task;
//! callers arriving while that attempt is in flight subscribe to its outcome
//! instead of dialing again. A successful handle is cached for the lifetime
//! of the process. A failed attempt is reported to everyone waiting on it and
//! the manager returns to idle, so the next call dials again.
//!
//! ```text
//!   Idle ──acquire──▶ Connecting ──ok──▶ Ready ──close──▶ Closed
//!    ▲                    │
//!    └────────err─────────┘
//! ```
//!
//! The connection step itself sits behind [`Connector`] so the SQLite pool in
//! [`database`] and test stubs plug in the same way.

mod database;

pub use database::{Database, SqliteConnector, StorageOptions, WriteAck};

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::watch;

/// Errors from establishing or using the storage handle.
///
/// `Clone` because a single failed attempt is delivered to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage options: {0}")]
    InvalidOptions(String),
    #[error("failed to connect to storage: {0}")]
    Connect(String),
    #[error("storage migration failed: {0}")]
    Migration(String),
    #[error("storage readiness check failed: {0}")]
    Readiness(String),
    #[error("connection attempt ended without a result")]
    ConnectAborted,
    #[error("storage handle has been closed")]
    Closed,
}

/// A live, cheaply cloneable handle to the backing store.
pub trait StorageHandle: Clone + Send + Sync + 'static {
    /// Whether the handle can still serve requests. A handle closed outside
    /// the manager reports `false` and is replaced on the next acquire.
    fn is_open(&self) -> bool;

    /// Release the underlying connections.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Establishes a [`StorageHandle`]: dial, handshake and readiness check.
pub trait Connector: Send + Sync + 'static {
    type Handle: StorageHandle;

    fn connect(&self) -> impl Future<Output = Result<Self::Handle, StorageError>> + Send;
}

/// The storage manager used by the server: a lazily opened SQLite pool.
pub type SqliteStorage = StorageManager<SqliteConnector>;

type Outcome<H> = Option<Result<H, StorageError>>;

enum Slot<H> {
    Idle,
    Connecting(watch::Receiver<Outcome<H>>),
    Ready(H),
    Closed,
}

struct Inner<C: Connector> {
    connector: C,
    slot: Mutex<Slot<C::Handle>>,
}

impl<C: Connector> Inner<C> {
    fn lock_slot(&self) -> MutexGuard<'_, Slot<C::Handle>> {
        // The slot is only ever replaced wholesale, so a poisoned guard still
        // holds a consistent value.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum CloseStep<H> {
    Release(H),
    Await(watch::Receiver<Outcome<H>>),
    Done,
}

/// Shared owner of the storage handle. Clones refer to the same handle.
pub struct StorageManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for StorageManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> StorageManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                slot: Mutex::new(Slot::Idle),
            }),
        }
    }

    /// Get the shared handle, connecting first if no handle exists yet.
    ///
    /// At most one connection attempt is in flight at any time. Concurrent
    /// callers await that attempt and all observe its result.
    pub async fn acquire(&self) -> Result<C::Handle, StorageError> {
        let mut rx = {
            let mut slot = self.inner.lock_slot();
            match &*slot {
                Slot::Ready(handle) if handle.is_open() => return Ok(handle.clone()),
                Slot::Closed => return Err(StorageError::Closed),
                Slot::Connecting(rx) => rx.clone(),
                Slot::Idle | Slot::Ready(_) => {
                    if matches!(*slot, Slot::Ready(_)) {
                        tracing::warn!("Storage handle was closed, reconnecting");
                    }
                    let rx = self.spawn_connect();
                    *slot = Slot::Connecting(rx.clone());
                    rx
                }
            }
        };

        match wait_for_outcome(&mut rx).await {
            Err(StorageError::ConnectAborted) => {
                self.reset_stale(&rx);
                Err(StorageError::ConnectAborted)
            }
            outcome => outcome,
        }
    }

    /// Whether a handle is currently established.
    pub fn is_connected(&self) -> bool {
        matches!(&*self.inner.lock_slot(), Slot::Ready(handle) if handle.is_open())
    }

    /// Close the handle if one exists. Safe to call more than once; the
    /// underlying handle is released exactly once. An in-flight connection
    /// attempt is awaited and its handle released.
    pub async fn close(&self) {
        loop {
            let step = {
                let mut slot = self.inner.lock_slot();
                match std::mem::replace(&mut *slot, Slot::Closed) {
                    Slot::Ready(handle) => CloseStep::Release(handle),
                    Slot::Connecting(rx) => {
                        *slot = Slot::Connecting(rx.clone());
                        CloseStep::Await(rx)
                    }
                    Slot::Idle | Slot::Closed => CloseStep::Done,
                }
            };

            match step {
                CloseStep::Release(handle) => {
                    handle.close().await;
                    tracing::info!("Storage handle closed");
                    return;
                }
                CloseStep::Await(mut rx) => {
                    if wait_for_outcome(&mut rx).await.is_err() {
                        self.reset_stale(&rx);
                    }
                }
                CloseStep::Done => return,
            }
        }
    }

    fn spawn_connect(&self) -> watch::Receiver<Outcome<C::Handle>> {
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tracing::info!("Connecting to storage");
            let started = Instant::now();
            let outcome = inner.connector.connect().await;

            {
                let mut slot = inner.lock_slot();
                *slot = match &outcome {
                    Ok(handle) => Slot::Ready(handle.clone()),
                    Err(_) => Slot::Idle,
                };
            }

            match &outcome {
                Ok(_) => tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Storage connected"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Storage connection failed: {}",
                    e
                ),
            }

            // Waiters may all have gone away; the cached slot is what matters.
            let _ = tx.send(Some(outcome));
        });

        rx
    }

    /// Return to idle if the slot still points at an attempt whose task died
    /// without reporting.
    fn reset_stale(&self, rx: &watch::Receiver<Outcome<C::Handle>>) {
        let mut slot = self.inner.lock_slot();
        if let Slot::Connecting(current) = &*slot {
            if current.same_channel(rx) {
                *slot = Slot::Idle;
            }
        }
    }
}

async fn wait_for_outcome<H: Clone>(
    rx: &mut watch::Receiver<Outcome<H>>,
) -> Result<H, StorageError> {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone().unwrap_or(Err(StorageError::ConnectAborted)),
        Err(_) => Err(StorageError::ConnectAborted),
    }
}
