//! Broadcast-once completion signal.
//!
//! A [`OnceSignal`] carries exactly one value from one producer to any number
//! of waiters. Waiters that arrive after the value was published observe it
//! immediately, so the value is never consumed by the first reader.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Single-assignment value shared by many waiters.
///
/// Cloning yields another handle to the same signal.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use streamx_core::signal::OnceSignal;
///
/// # #[tokio::main]
/// # async fn main() {
/// let signal: OnceSignal<bool> = OnceSignal::new();
/// let waiter = signal.clone();
/// let task = tokio::spawn(async move { waiter.wait(Duration::from_secs(1)).await });
/// assert!(signal.publish(true));
/// assert!(!signal.publish(false));
/// assert_eq!(task.await.unwrap(), Some(true));
/// # }
/// ```
#[derive(Debug)]
pub struct OnceSignal<T> {
    tx: Arc<watch::Sender<Option<T>>>,
    waiters: Arc<AtomicUsize>,
}

impl<T> Clone for OnceSignal<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
            waiters: Arc::clone(&self.waiters),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for OnceSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> OnceSignal<T> {
    /// Creates an unresolved signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            waiters: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolves the signal. Returns false if it was already resolved, in
    /// which case the stored value is kept.
    pub fn publish(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    /// Returns the value if the signal is resolved.
    pub fn peek(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Number of callers currently blocked in [`OnceSignal::wait`].
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Returns true if both handles point at the same signal.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }

    /// Waits up to `timeout` for the value. Returns `None` on timeout.
    pub async fn wait(&self, timeout: Duration) -> Option<T> {
        let mut rx = self.tx.subscribe();
        self.waiters.fetch_add(1, Ordering::AcqRel);
        let res = tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await;
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        match res {
            Ok(Ok(value)) => value.clone(),
            // Sender lives as long as any handle, so the channel cannot close here.
            Ok(Err(_)) | Err(_) => None,
        }
    }
}
