//! Reactive snapshot store
//!
//! A [`Store`] owns the current snapshot of one controller, publishes
//! every write to its listeners, and owns the [`SubscriptionSet`] that
//! ties the controller's bus subscription and effect pipelines to its
//! lifetime.
//!
//! # Write rules
//!
//! - [`Store::emit`] merges a patch through [`State::merge`]. Record
//!   snapshots declare a patch type whose unset fields keep their prior
//!   value; scalar snapshots (see [`scalar_state!`](crate::scalar_state))
//!   are overwritten.
//! - [`Store::emit_opt`] with `None` is a no-op: nothing is published.
//! - [`Store::import_state`] replaces the snapshot outright.
//!
//! Every write is published, even when equal to the previous snapshot.
//! Duplicate suppression happens on the read side, in [`Store::select`]
//! and [`Store::stream`].

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::channel::mpsc;

use crate::action::Action;
use crate::bus::ActionBus;
use crate::compare::ShallowEq;
use crate::fanout::{Fanout, Listener};
use crate::stream::{Distinct, DistinctExt, Feed};
use crate::subscription::{Subscription, SubscriptionSet};

/// A snapshot type and its merge rule
pub trait State: ShallowEq + Clone + Send + Sync + 'static {
    /// Partial update accepted by [`Store::emit`]
    type Patch: Send + 'static;

    /// Apply `patch` on top of `self`
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// Implement [`State`] for opaque types: the patch is a full replacement
///
/// ```
/// use libstatebus::{scalar_state, ShallowEq};
///
/// #[derive(Clone, PartialEq)]
/// enum Phase {
///     Idle,
///     Busy,
/// }
///
/// impl ShallowEq for Phase {
///     fn shallow_eq(&self, other: &Self) -> bool {
///         self == other
///     }
/// }
///
/// scalar_state!(Phase);
/// ```
#[macro_export]
macro_rules! scalar_state {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::State for $ty {
                type Patch = $ty;

                fn merge(&self, patch: $ty) -> $ty {
                    patch
                }
            }
        )*
    };
}

scalar_state!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
);

impl<T> State for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    type Patch = Arc<T>;

    fn merge(&self, patch: Arc<T>) -> Arc<T> {
        patch
    }
}

impl<T> State for Option<T>
where
    T: ShallowEq + Clone + Send + Sync + 'static,
{
    type Patch = Option<T>;

    fn merge(&self, patch: Option<T>) -> Option<T> {
        patch
    }
}

impl<T> State for Vec<T>
where
    T: ShallowEq + Clone + Send + Sync + 'static,
{
    type Patch = Vec<T>;

    fn merge(&self, patch: Vec<T>) -> Vec<T> {
        patch
    }
}

/// Stream of change-filtered values read from a store
pub type StateStream<T> = Distinct<Feed<T>>;

struct Versioned<S> {
    version: u64,
    value: S,
}

struct Published<S> {
    version: u64,
    value: S,
}

struct Slot<S> {
    seen: AtomicU64,
    listener: Box<dyn Fn(&S) + Send + Sync>,
}

impl<S> Slot<S> {
    // A version is delivered at most once, and never after a newer one.
    fn offer(&self, version: u64, value: &S) {
        if self.seen.fetch_max(version, Ordering::SeqCst) < version {
            (self.listener)(value);
        }
    }
}

struct StoreInner<S> {
    name: &'static str,
    bus: ActionBus,
    snapshot: Mutex<Versioned<S>>,
    listeners: Fanout<Published<S>>,
    subscriptions: SubscriptionSet,
    disposed: AtomicBool,
}

impl<S> StoreInner<S> {
    fn snapshot(&self) -> MutexGuard<'_, Versioned<S>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to a snapshot store
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

/// Non-owning handle, used by background tasks so they do not keep a
/// disposed-but-forgotten store alive
pub struct WeakStore<S> {
    inner: Weak<StoreInner<S>>,
}

impl<S: State> Store<S> {
    /// Create a store named after its snapshot type
    pub fn new(bus: &ActionBus, initial: S) -> Self {
        Self::named(type_name::<S>(), bus, initial)
    }

    /// Create a store with a name used in log output
    pub fn named(name: &'static str, bus: &ActionBus, initial: S) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                name,
                bus: bus.clone(),
                snapshot: Mutex::new(Versioned {
                    version: 1,
                    value: initial,
                }),
                listeners: Fanout::new(name),
                subscriptions: SubscriptionSet::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn bus(&self) -> &ActionBus {
        &self.inner.bus
    }

    /// Current snapshot
    pub fn state(&self) -> S {
        self.inner.snapshot().value.clone()
    }

    /// Read the current snapshot without cloning it
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.inner.snapshot().value)
    }

    /// Merge `patch` into the snapshot and publish the result
    pub fn emit(&self, patch: S::Patch) {
        self.apply("emit", |current| current.merge(patch));
    }

    /// Like [`emit`](Self::emit), but `None` leaves the store untouched
    pub fn emit_opt(&self, patch: Option<S::Patch>) {
        match patch {
            Some(patch) => self.emit(patch),
            None => tracing::trace!(target: "statebus", store = self.name(), "emit_opt(None) ignored"),
        }
    }

    /// Replace the snapshot without merging
    ///
    /// Meant for seeding in tests and at bootstrap.
    pub fn import_state(&self, state: S) {
        self.apply("import_state", move |_| state);
    }

    fn apply<F>(&self, op: &'static str, update: F)
    where
        F: FnOnce(&S) -> S,
    {
        if self.is_disposed() {
            tracing::trace!(target: "statebus", store = self.name(), op, "write ignored: store disposed");
            return;
        }

        let published = {
            let mut snapshot = self.inner.snapshot();
            let next = update(&snapshot.value);
            snapshot.version += 1;
            snapshot.value = next;
            Published {
                version: snapshot.version,
                value: snapshot.value.clone(),
            }
        };

        tracing::trace!(target: "statebus", store = self.name(), op, version = published.version, "snapshot updated");
        self.inner.listeners.publish(published);
    }

    /// Call `listener` with the current snapshot and then with every write
    ///
    /// No change filtering happens here. A panicking listener is logged
    /// and does not affect other listeners. On a disposed store the
    /// listener sees the final snapshot once and is not registered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let slot = Slot {
            seen: AtomicU64::new(0),
            listener: Box::new(listener),
        };
        let entry: Listener<Published<S>> =
            Arc::new(move |p: &Published<S>| slot.offer(p.version, &p.value));

        if self.is_disposed() {
            self.inner.listeners.deliver(&entry, &self.current());
            return Subscription::empty();
        }

        // Register first, then read: a write racing with this call is
        // either published to the slot or already part of the read.
        let id = self.inner.listeners.add(Arc::clone(&entry));
        self.inner.listeners.deliver(&entry, &self.current());

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.remove(id);
            }
        })
    }

    fn current(&self) -> Published<S> {
        let snapshot = self.inner.snapshot();
        Published {
            version: snapshot.version,
            value: snapshot.value.clone(),
        }
    }

    /// Change-filtered stream of a projection of the snapshot
    ///
    /// The first item is the projection of the current snapshot; later
    /// items arrive only when the projection changes by [`ShallowEq`].
    /// The stream ends when the store is disposed.
    pub fn select<T, F>(&self, projection: F) -> StateStream<T>
    where
        T: ShallowEq + Clone + Send + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded();
        let subscription = self.subscribe(move |state| {
            let _ = tx.unbounded_send(projection(state));
        });
        Feed::new(rx, subscription).distinct_until_changed()
    }

    /// Change-filtered stream of whole snapshots
    pub fn stream(&self) -> StateStream<S> {
        self.select(S::clone)
    }

    /// Dispatch on the shared bus
    pub fn dispatch(&self, action: impl Into<Action>) {
        self.inner.bus.dispatch(action);
    }

    /// Tie `subscription` to this store's lifetime
    pub fn tear_down(&self, subscription: Subscription) {
        self.inner.subscriptions.add(subscription);
    }

    /// Release every owned subscription and close all read streams
    ///
    /// Returns `false` when the store was already disposed.
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.subscriptions.dispose();
        self.inner.listeners.clear();
        tracing::debug!(target: "statebus", store = self.name(), "store disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<S> WeakStore<S> {
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("version", &self.inner.snapshot().version)
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Debug, PartialEq)]
    struct Form {
        name: String,
        tags: Arc<Vec<String>>,
        busy: bool,
    }

    #[derive(Default)]
    struct FormPatch {
        name: Option<String>,
        tags: Option<Arc<Vec<String>>>,
        busy: Option<bool>,
    }

    impl ShallowEq for Form {
        fn shallow_eq(&self, other: &Self) -> bool {
            self.name.shallow_eq(&other.name)
                && self.tags.shallow_eq(&other.tags)
                && self.busy.shallow_eq(&other.busy)
        }
    }

    impl State for Form {
        type Patch = FormPatch;

        fn merge(&self, patch: FormPatch) -> Self {
            Form {
                name: patch.name.unwrap_or_else(|| self.name.clone()),
                tags: patch.tags.unwrap_or_else(|| Arc::clone(&self.tags)),
                busy: patch.busy.unwrap_or(self.busy),
            }
        }
    }

    fn form() -> Form {
        Form {
            name: "draft".to_string(),
            tags: Arc::new(vec!["a".to_string()]),
            busy: false,
        }
    }

    fn form_store() -> Store<Form> {
        Store::named("FormStore", &ActionBus::new(), form())
    }

    #[test]
    fn test_emit_shallow_merges_record() {
        let store = form_store();
        let tags = Arc::clone(&store.state().tags);

        store.emit(FormPatch {
            busy: Some(true),
            ..FormPatch::default()
        });

        let state = store.state();
        assert!(state.busy);
        assert_eq!(state.name, "draft");
        assert!(Arc::ptr_eq(&state.tags, &tags));
    }

    #[test]
    fn test_import_state_replaces_without_merge() {
        let store = form_store();
        let seeded = Form {
            name: "seed".to_string(),
            tags: Arc::new(Vec::new()),
            busy: true,
        };

        store.import_state(seeded.clone());

        assert_eq!(store.state(), seeded);
    }

    #[test]
    fn test_scalar_emit_overwrites() {
        let store = Store::new(&ActionBus::new(), 0_i64);
        store.emit(5);
        store.emit(-2);
        assert_eq!(store.state(), -2);
    }

    #[test]
    fn test_emit_opt_none_is_noop() {
        let store = Store::new(&ActionBus::new(), 7_i64);
        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let calls = Arc::clone(&calls);
            store.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        store.emit_opt(None);
        assert_eq!(store.state(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.emit_opt(Some(8));
        assert_eq!(store.state(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_equal_writes_are_still_published() {
        let store = Store::new(&ActionBus::new(), 1_u32);
        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let calls = Arc::clone(&calls);
            store.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        store.emit(1);
        store.emit(1);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_select_suppresses_equal_projections() {
        let store = form_store();
        let mut busy = store.select(|s| s.busy);

        store.emit(FormPatch {
            name: Some("renamed".to_string()),
            ..FormPatch::default()
        });
        store.emit(FormPatch {
            busy: Some(true),
            ..FormPatch::default()
        });
        store.emit(FormPatch {
            busy: Some(true),
            ..FormPatch::default()
        });

        assert_eq!(busy.next().await, Some(false));
        assert_eq!(busy.next().await, Some(true));
        assert!(busy.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_stream_compares_nested_by_reference() {
        let store = form_store();
        let mut states = store.stream();
        assert!(states.next().await.is_some());

        // Same contents, new allocation: a change.
        store.emit(FormPatch {
            tags: Some(Arc::new(vec!["a".to_string()])),
            ..FormPatch::default()
        });
        // Same allocation: no change.
        let tags = Arc::clone(&store.state().tags);
        store.emit(FormPatch {
            tags: Some(tags),
            ..FormPatch::default()
        });

        assert!(states.next().await.is_some());
        assert!(states.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_starts_from_latest() {
        let store = Store::new(&ActionBus::new(), 0_i64);
        for n in 1..=5 {
            store.emit(n);
        }

        let mut values = store.stream();

        assert_eq!(values.next().await, Some(5));
        assert!(values.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_dispose_ends_streams_and_ignores_writes() {
        let store = Store::new(&ActionBus::new(), 0_i64);
        let mut values = store.stream();
        assert_eq!(values.next().await, Some(0));

        assert!(store.dispose());
        assert!(!store.dispose());
        store.emit(9);

        assert_eq!(store.state(), 0);
        assert_eq!(values.next().await, None);
    }

    #[tokio::test]
    async fn test_select_after_dispose_yields_final_snapshot() {
        let store = Store::new(&ActionBus::new(), 3_i64);
        store.dispose();

        let values: Vec<i64> = store.stream().collect().await;

        assert_eq!(values, vec![3]);
    }

    #[test]
    fn test_dispose_releases_torn_down_subscriptions() {
        let store = Store::new(&ActionBus::new(), 0_u8);
        let released = Arc::new(AtomicUsize::new(0));
        let make = || {
            let released = Arc::clone(&released);
            Subscription::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            })
        };

        store.tear_down(make());
        store.dispose();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        store.tear_down(make());
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let store = Store::new(&ActionBus::new(), 0_i64);
        let _bad = store.subscribe(|v| {
            if *v == 2 {
                panic!("listener failure");
            }
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _good = {
            let seen = Arc::clone(&seen);
            store.subscribe(move |v| seen.lock().unwrap().push(*v))
        };

        store.emit(2);
        store.emit(3);

        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn test_weak_store_does_not_keep_store_alive() {
        let store = Store::new(&ActionBus::new(), 0_i64);
        let weak = store.downgrade();
        assert!(weak.upgrade().is_some());

        drop(store);

        assert!(weak.upgrade().is_none());
    }
}
