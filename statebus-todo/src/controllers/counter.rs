//! Counter controller

use std::sync::Arc;

use libstatebus::{respond_to_lookup, Action, ActionBus, Controller, Store};

use super::TodoController;

pub struct CounterController {
    store: Store<i64>,
}

impl CounterController {
    pub fn value(&self) -> i64 {
        self.store.state()
    }
}

impl Controller for CounterController {
    type State = i64;

    fn create(bus: &ActionBus) -> Self {
        Self {
            store: Store::named("CounterController", bus, 0),
        }
    }

    fn store(&self) -> &Store<i64> {
        &self.store
    }

    /// Follow the number of todos, wherever the todo controller lives
    fn on_init(self: &Arc<Self>) {
        let todo_count = self
            .store
            .remote_select::<TodoController, _, _>(|s| s.todos.len() as i64);
        self.store.effect_on_action(todo_count);
    }

    fn on_action(self: &Arc<Self>, action: &Action) {
        respond_to_lookup(self, action);
        match action.kind() {
            "inc" => self.store.emit(self.store.state() + 1),
            "dec" => self.store.emit(self.store.state() - 1),
            _ => {}
        }
    }

    fn name() -> &'static str {
        "CounterController"
    }
}
