//! Remote lookup
//!
//! Lets one controller reach another by type alone. The requester
//! dispatches an `@REMOTE_LOOKUP` action carrying the target's `TypeId`
//! and a one-shot reply handle; the first live controller of that type
//! answers from its `on_action`, within the same dispatch cycle.
//!
//! A lookup nobody answers never completes. The reply handle is dropped
//! at the end of the dispatch and the [`RemoteLookup`] future parks;
//! use [`RemoteLookup::resolve_within`] (or
//! [`Store::try_remote_controller`]) for a bounded wait.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::{FutureExt, Stream};
use tokio::sync::oneshot;

use crate::action::{Action, ActionVariant};
use crate::bus::ActionBus;
use crate::compare::ShallowEq;
use crate::controller::Controller;
use crate::error::{Result, StoreError};
use crate::store::{State, Store};

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Discriminator of lookup requests
pub const REMOTE_LOOKUP: &str = LookupRequest::KIND;

/// Payload of an `@REMOTE_LOOKUP` action
pub struct LookupRequest {
    target: TypeId,
    target_name: &'static str,
    reply: Mutex<Option<oneshot::Sender<Instance>>>,
}

impl ActionVariant for LookupRequest {
    const KIND: &'static str = "@REMOTE_LOOKUP";
}

impl LookupRequest {
    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub fn is_for<C: 'static>(&self) -> bool {
        self.target == TypeId::of::<C>()
    }

    /// Whether nobody has answered yet
    pub fn is_pending(&self) -> bool {
        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn answer(&self, instance: Instance) -> bool {
        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match reply {
            Some(tx) => tx.send(instance).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupRequest")
            .field("target", &self.target_name)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Answer `action` if it is a lookup for `C`
///
/// Returns `true` when this call resolved the request. Disposed
/// controllers never answer.
pub fn respond_to_lookup<C: Controller>(controller: &Arc<C>, action: &Action) -> bool {
    let Some(request) = action.payload::<LookupRequest>() else {
        return false;
    };
    if !request.is_for::<C>() || controller.store().is_disposed() {
        return false;
    }
    let instance: Instance = Arc::clone(controller) as Instance;
    let answered = request.answer(instance);
    if answered {
        tracing::debug!(target: "statebus", controller = request.target_name, "remote lookup resolved");
    }
    answered
}

/// Pending lookup of a controller of type `C`
///
/// The request is dispatched when the lookup is created, not when it is
/// first polled.
#[must_use = "a lookup does nothing useful unless awaited"]
pub struct RemoteLookup<C> {
    name: &'static str,
    // `None` once the reply handle was dropped unanswered.
    rx: Option<oneshot::Receiver<Instance>>,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Controller> RemoteLookup<C> {
    pub fn request(bus: &ActionBus) -> Self {
        let (tx, rx) = oneshot::channel();
        let name = C::name();
        bus.dispatch(Action::of(LookupRequest {
            target: TypeId::of::<C>(),
            target_name: name,
            reply: Mutex::new(Some(tx)),
        }));
        Self {
            name,
            rx: Some(rx),
            _controller: PhantomData,
        }
    }

    /// Wait at most `timeout` for an answer
    pub async fn resolve_within(self, timeout: Duration) -> Result<Arc<C>> {
        let name = self.name;
        let Some(rx) = self.rx else {
            return Err(StoreError::LookupUnresolved(name));
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(instance)) => instance
                .downcast::<C>()
                .map_err(|_| StoreError::LookupUnresolved(name)),
            Ok(Err(_)) => Err(StoreError::LookupUnresolved(name)),
            Err(_) => Err(StoreError::LookupTimeout {
                controller: name,
                timeout,
            }),
        }
    }
}

impl<C: Controller> Future for RemoteLookup<C> {
    type Output = Arc<C>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Arc<C>> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        let outcome = ready!(Pin::new(rx).poll(cx));
        match outcome.map(|instance| instance.downcast::<C>()) {
            Ok(Ok(controller)) => Poll::Ready(controller),
            _ => {
                tracing::warn!(target: "statebus", controller = this.name, "remote lookup unanswered; it will never resolve");
                this.rx = None;
                Poll::Pending
            }
        }
    }
}

impl<C> fmt::Debug for RemoteLookup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLookup")
            .field("controller", &self.name)
            .field("parked", &self.rx.is_none())
            .finish()
    }
}

impl<S: State> Store<S> {
    /// Handle to the live controller of type `C`
    pub fn remote_controller<C: Controller>(&self) -> RemoteLookup<C> {
        RemoteLookup::request(self.bus())
    }

    /// Like [`remote_controller`](Self::remote_controller), failing
    /// after `timeout` or as soon as the lookup is known unanswered
    pub fn try_remote_controller<C: Controller>(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Arc<C>>> + Send + 'static {
        self.remote_controller::<C>().resolve_within(timeout)
    }

    /// One snapshot of `C`'s state
    pub fn remote_state<C: Controller>(&self) -> impl Future<Output = C::State> + Send + 'static {
        self.remote_controller::<C>()
            .map(|controller| controller.store().state())
    }

    /// `C`'s change-filtered state stream
    pub fn remote_stream<C: Controller>(&self) -> impl Stream<Item = C::State> + Send + 'static {
        self.remote_select::<C, _, _>(<C::State as Clone>::clone)
    }

    /// Change-filtered projection of `C`'s state
    pub fn remote_select<C, T, F>(&self, projection: F) -> impl Stream<Item = T> + Send + 'static
    where
        C: Controller,
        T: ShallowEq + Clone + Send + 'static,
        F: Fn(&C::State) -> T + Send + Sync + 'static,
    {
        self.remote_controller::<C>()
            .map(move |controller| controller.store().select(projection))
            .flatten_stream()
    }
}
