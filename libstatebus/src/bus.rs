//! Action bus
//!
//! One bus instance is shared, by handle, by every controller of an
//! application. Dispatch is synchronous: when [`ActionBus::dispatch`]
//! returns, every subscriber registered at that moment has seen the
//! action exactly once, in subscription order.
//!
//! # Reentrancy
//!
//! A handler that dispatches does not interrupt the fan-out in progress;
//! the nested action is queued and delivered right after it, before the
//! outermost `dispatch` call returns.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use libstatebus::ActionBus;
//!
//! let bus = ActionBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let _sub = {
//!     let seen = Arc::clone(&seen);
//!     bus.subscribe(move |action| seen.lock().unwrap().push(action.kind().to_string()))
//! };
//!
//! bus.dispatch("inc");
//! assert_eq!(*seen.lock().unwrap(), vec!["@INIT", "inc"]);
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::channel::mpsc;

use crate::action::Action;
use crate::fanout::{Fanout, Listener};
use crate::stream::Feed;
use crate::subscription::Subscription;

/// Stream of actions (or narrowed payloads) from the bus
pub type ActionStream<T = Action> = Feed<T>;

/// Shared handle to the action bus
#[derive(Clone)]
pub struct ActionBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    fanout: Fanout<Action>,
    // True until the first dispatch; new subscribers then see the seed.
    pristine: AtomicBool,
}

impl ActionBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                fanout: Fanout::new("action_bus"),
                pristine: AtomicBool::new(true),
            }),
        }
    }

    /// Deliver an action to every current subscriber
    pub fn dispatch(&self, action: impl Into<Action>) {
        let action = action.into();
        self.inner.pristine.store(false, Ordering::SeqCst);
        tracing::debug!(target: "statebus", kind = action.kind(), payload = action.has_payload(), "dispatch");
        self.inner.fanout.publish(action);
    }

    /// Register a handler for every action
    ///
    /// Until the first dispatch the handler is also called once, right
    /// away, with the `@INIT` seed. A panicking handler is logged and
    /// skipped; other subscribers still receive the action.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        let handler: Listener<Action> = Arc::new(handler);
        let id = self.inner.fanout.add(Arc::clone(&handler));

        if self.inner.pristine.load(Ordering::SeqCst) {
            self.inner.fanout.deliver(&handler, &Action::init());
        }

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.fanout.remove(id);
            }
        })
    }

    /// Every action
    pub fn actions(&self) -> ActionStream {
        self.filter_map(|action| Some(action.clone()))
    }

    /// Actions whose discriminator equals `kind`
    pub fn where_type(&self, kind: impl Into<Cow<'static, str>>) -> ActionStream {
        let kind = kind.into();
        self.filter_map(move |action| (action.kind() == kind).then(|| action.clone()))
    }

    /// Actions accepted by `predicate`
    pub fn matching<P>(&self, predicate: P) -> ActionStream
    where
        P: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |action| predicate(action).then(|| action.clone()))
    }

    /// Payloads whose runtime type is `T`
    ///
    /// Narrowing looks at the payload type only; an action that merely
    /// reuses `T`'s discriminator with another payload is skipped.
    pub fn is_a<T>(&self) -> ActionStream<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.filter_map(|action| action.downcast::<T>())
    }

    fn filter_map<T, F>(&self, select: F) -> ActionStream<T>
    where
        T: Send + 'static,
        F: Fn(&Action) -> Option<T> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded();
        let subscription = self.subscribe(move |action| {
            if let Some(value) = select(action) {
                // A closed receiver means the Feed is being dropped.
                let _ = tx.unbounded_send(value);
            }
        });
        Feed::new(rx, subscription)
    }

    /// Number of live subscriptions
    ///
    /// Intended for diagnostics and tests, not for control flow.
    pub fn subscriber_count(&self) -> usize {
        self.inner.fanout.len()
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBus")
            .field("subscribers", &self.subscriber_count())
            .field("pristine", &self.inner.pristine.load(Ordering::SeqCst))
            .finish()
    }
}
