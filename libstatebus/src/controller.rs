//! Controllers: stores wired to the bus
//!
//! A controller owns one [`Store`] and reacts to bus actions through
//! [`Controller::on_action`]. [`start`] performs the wiring every
//! controller needs:
//!
//! 1. subscribe `on_action` to the bus, owned by the store so that
//!    disposing the store unsubscribes it;
//! 2. schedule `on_init` on the next scheduler tick, so that several
//!    controllers built back to back all exist before any of them
//!    initializes.
//!
//! Handlers hold only weak references to the controller.

use std::any::type_name;
use std::sync::Arc;

use crate::action::Action;
use crate::bus::ActionBus;
use crate::remote::respond_to_lookup;
use crate::store::{State, Store};
use crate::subscription::Subscription;

pub trait Controller: Send + Sync + Sized + 'static {
    type State: State;

    /// Build the controller with its initial snapshot
    ///
    /// `on_init` and bus delivery only start with [`start`]. Effects built
    /// here already spawn their pipeline tasks, so such constructors need
    /// a Tokio runtime.
    fn create(bus: &ActionBus) -> Self;

    fn store(&self) -> &Store<Self::State>;

    /// Runs once, on the tick after [`start`], unless already disposed
    ///
    /// The place to wire effects and remote lookups.
    fn on_init(self: &Arc<Self>) {}

    /// Called synchronously for every action on the bus
    ///
    /// Overrides must keep calling [`respond_to_lookup`], or other
    /// controllers can no longer find this one.
    fn on_action(self: &Arc<Self>, action: &Action) {
        respond_to_lookup(self, action);
    }

    /// [`create`](Self::create) then [`start`]
    fn spawn(bus: &ActionBus) -> Arc<Self> {
        start(Self::create(bus))
    }

    fn name() -> &'static str {
        type_name::<Self>()
    }

    fn dispose(&self) -> bool {
        self.store().dispose()
    }
}

/// Wire a freshly created controller to its bus
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn start<C: Controller>(controller: C) -> Arc<C> {
    let controller = Arc::new(controller);
    let store = controller.store();

    let weak = Arc::downgrade(&controller);
    let actions = store.bus().subscribe(move |action| {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        if !controller.store().is_disposed() {
            controller.on_action(action);
        }
    });
    store.tear_down(actions);

    let weak = Arc::downgrade(&controller);
    let init = tokio::spawn(async move {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        if controller.store().is_disposed() {
            tracing::debug!(target: "statebus", controller = C::name(), "on_init skipped: disposed");
            return;
        }
        controller.on_init();
        tracing::debug!(target: "statebus", controller = C::name(), "initialized");
    });
    store.tear_down(Subscription::from_task(init));

    controller
}
