//! Effect pipelines
//!
//! An effect turns a stream of trigger values into a stream of patches
//! that are merged back into the owning store. The pipeline runs on its
//! own Tokio task, which is aborted when the store disposes: work still
//! in flight is dropped, not awaited. The intake closes during `dispose`
//! itself, so triggers refuse values from that point on.
//!
//! The core imposes no concurrency policy. The pipeline decides:
//! `then` queues overlapping triggers, `flat_map` over a fresh stream
//! per trigger runs them back to back, and so on.

use std::fmt;
use std::pin::pin;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};

use crate::error::{Result, StoreError};
use crate::store::{State, Store};
use crate::subscription::Subscription;

/// Intake side of an effect, handed to the pipeline builder
pub type EffectInput<T> = UnboundedReceiver<T>;

/// Handle that feeds values into an effect pipeline
pub struct Trigger<T> {
    store: &'static str,
    tx: UnboundedSender<T>,
}

impl<T> Trigger<T> {
    /// Push `value` into the pipeline
    ///
    /// Returns `false`, dropping the value, once the owning store has
    /// been disposed.
    pub fn call(&self, value: T) -> bool {
        self.try_call(value).is_ok()
    }

    /// Like [`call`](Self::call), reporting a disposed owner as an error
    pub fn try_call(&self, value: T) -> Result<()> {
        self.tx.unbounded_send(value).map_err(|_| {
            tracing::trace!(target: "statebus", store = self.store, "trigger ignored: effect closed");
            StoreError::Disposed(self.store)
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for Trigger<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for Trigger<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("store", &self.store)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<S: State> Store<S> {
    /// Build a pipeline from its intake and return the trigger feeding it
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn effect<T, F, St>(&self, pipeline: F) -> Trigger<T>
    where
        T: Send + 'static,
        F: FnOnce(EffectInput<T>) -> St,
        St: Stream<Item = S::Patch> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded();
        let intake = tx.clone();
        self.tear_down(Subscription::new(move || intake.close_channel()));
        self.effect_on_action(pipeline(rx));
        Trigger {
            store: self.name(),
            tx,
        }
    }

    /// Merge every patch produced by `patches` until the store disposes
    ///
    /// Usually fed from bus filters such as
    /// [`ActionBus::is_a`](crate::ActionBus::is_a).
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn effect_on_action<St>(&self, patches: St)
    where
        St: Stream<Item = S::Patch> + Send + 'static,
    {
        let store = self.downgrade();
        let name = self.name();
        let task = tokio::spawn(async move {
            let mut patches = pin!(patches);
            while let Some(patch) = patches.next().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.emit(patch);
            }
            tracing::trace!(target: "statebus", store = name, "effect pipeline finished");
        });
        self.tear_down(Subscription::from_task(task));
    }
}
