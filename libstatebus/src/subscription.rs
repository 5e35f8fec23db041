//! Teardown handles
//!
//! A [`Subscription`] owns one teardown action and runs it exactly once,
//! either on [`Subscription::unsubscribe`] or when dropped. A
//! [`SubscriptionSet`] aggregates every subscription a store owns and
//! releases them together on dispose.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

type Teardown = Box<dyn FnOnce() + Send>;

/// RAII handle for a live subscription
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Wrap a teardown action
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to release
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Abort a spawned task on teardown
    ///
    /// The task is cancelled at its next suspension point; it is not
    /// awaited.
    pub fn from_task<T>(handle: JoinHandle<T>) -> Self
    where
        T: Send + 'static,
    {
        Self::new(move || handle.abort())
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.is_none()
    }

    /// Run the teardown now. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T: Send + 'static> From<JoinHandle<T>> for Subscription {
    fn from(handle: JoinHandle<T>) -> Self {
        Subscription::from_task(handle)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Composite of every subscription owned by one store
///
/// Once disposed, the set stays closed: subscriptions added afterwards
/// are torn down on the spot.
pub struct SubscriptionSet {
    members: Mutex<Option<Vec<Subscription>>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Some(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<Subscription>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, subscription: Subscription) {
        let rejected = {
            let mut members = self.lock();
            match members.as_mut() {
                Some(list) => {
                    list.retain(|s| !s.is_closed());
                    list.push(subscription);
                    None
                }
                None => Some(subscription),
            }
        };
        // Teardown runs outside the lock; it may touch this set again.
        drop(rejected);
    }

    /// Tear down every member. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        let members = self.lock().take();
        match members {
            Some(list) => {
                for mut subscription in list {
                    subscription.unsubscribe();
                }
                true
            }
            None => false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().is_none()
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting() -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = {
            let count = Arc::clone(&count);
            Subscription::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, sub)
    }

    #[test]
    fn test_unsubscribe_runs_once() {
        let (count, mut sub) = counting();
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (count, sub) = counting();
        assert!(!sub.is_closed());
        drop(sub);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_dispose_is_idempotent() {
        let set = SubscriptionSet::new();
        let (a, sub_a) = counting();
        let (b, sub_b) = counting();
        set.add(sub_a);
        set.add(sub_b);
        assert_eq!(set.len(), 2);

        assert!(set.dispose());
        assert!(!set.dispose());

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert!(set.is_disposed());
        assert!(set.is_empty());
    }

    #[test]
    fn test_add_after_dispose_tears_down_immediately() {
        let set = SubscriptionSet::new();
        set.dispose();

        let (count, sub) = counting();
        set.add(sub);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_task_aborts() {
        struct FlagOnDrop(Arc<AtomicUsize>);

        impl Drop for FlagOnDrop {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let guard = FlagOnDrop(Arc::clone(&dropped));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;

        let mut sub = Subscription::from(handle);
        sub.unsubscribe();
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}
