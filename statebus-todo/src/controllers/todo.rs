//! To-do list controller

use std::fmt;
use std::future;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use libstatebus::{
    Action, ActionBus, ActionVariant, Controller, ShallowEq, State, StateStream, Store,
    Subscription, Trigger,
};

use super::delay_each;
use crate::config::TodoConfig;

pub const TASK_REQUIRED: &str = "Task is required.";
pub const TODO_ADDED: &str = "Todo added successfully";
pub const TODO_UPDATED: &str = "Todo updated successfully";
pub const TODO_REMOVED: &str = "Todo removed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    All,
    Active,
    Completed,
}

impl Visibility {
    pub fn admits(self, todo: &Todo) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Active => !todo.completed,
            Visibility::Completed => todo.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: u32,
    pub task: String,
    pub completed: bool,
}

impl Todo {
    fn new(id: u32, task: &str, completed: bool) -> Self {
        Self {
            id,
            task: task.to_string(),
            completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// A transient notice shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    pub fn info(text: &str) -> Self {
        Self {
            kind: MessageKind::Info,
            text: text.to_string(),
        }
    }

    pub fn error(text: &str) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.to_string(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MessageKind::Info => "info",
            MessageKind::Error => "error",
        };
        write!(f, "[{}] {}", kind, self.text)
    }
}

impl ShallowEq for Visibility {
    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl ShallowEq for Message {
    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }
}

#[derive(Debug, Clone)]
pub struct TodoState {
    pub visibility: Visibility,
    pub todos: Arc<Vec<Todo>>,
    pub message: Option<Message>,
    pub is_searching: bool,
    pub loading: bool,
}

impl Default for TodoState {
    fn default() -> Self {
        Self {
            visibility: Visibility::All,
            todos: Arc::new(Vec::new()),
            message: None,
            is_searching: false,
            loading: false,
        }
    }
}

/// Partial [`TodoState`]; `None` fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub visibility: Option<Visibility>,
    pub todos: Option<Arc<Vec<Todo>>>,
    /// `Some(None)` clears the message
    pub message: Option<Option<Message>>,
    pub is_searching: Option<bool>,
    pub loading: Option<bool>,
}

impl ShallowEq for TodoState {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.visibility.shallow_eq(&other.visibility)
            && self.todos.shallow_eq(&other.todos)
            && self.message.shallow_eq(&other.message)
            && self.is_searching.shallow_eq(&other.is_searching)
            && self.loading.shallow_eq(&other.loading)
    }
}

impl State for TodoState {
    type Patch = TodoPatch;

    fn merge(&self, patch: TodoPatch) -> Self {
        TodoState {
            visibility: patch.visibility.unwrap_or(self.visibility),
            todos: patch.todos.unwrap_or_else(|| Arc::clone(&self.todos)),
            message: patch.message.unwrap_or_else(|| self.message.clone()),
            is_searching: patch.is_searching.unwrap_or(self.is_searching),
            loading: patch.loading.unwrap_or(self.loading),
        }
    }
}

/// Broadcast whenever a new message appears
#[derive(Debug)]
pub struct HasMessage;

impl ActionVariant for HasMessage {
    const KIND: &'static str = "has_message";
}

fn default_todos() -> Vec<Todo> {
    vec![
        Todo::new(1, "Read Quran Daily", false),
        Todo::new(2, "Learn Arabic", true),
        Todo::new(3, "Trust on Allah", false),
    ]
}

pub struct TodoController {
    store: Store<TodoState>,
    settings: TodoConfig,
    save: Trigger<TodoPatch>,
}

impl TodoController {
    /// Build with explicit timings; pair with
    /// [`ControllerRegistry::get_or_insert_with`](libstatebus::ControllerRegistry::get_or_insert_with)
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime: the save effect is spawned here.
    /// The same holds for [`Controller::create`].
    pub fn with_config(bus: &ActionBus, settings: TodoConfig) -> Self {
        let store = Store::named("TodoController", bus, TodoState::default());
        let delay = settings.save_delay();
        let save = store.effect(move |intake| {
            delay_each(intake, delay).map(|patch: TodoPatch| TodoPatch {
                loading: Some(false),
                ..patch
            })
        });
        Self {
            store,
            settings,
            save,
        }
    }

    pub fn settings(&self) -> &TodoConfig {
        &self.settings
    }

    pub fn state(&self) -> TodoState {
        self.store.state()
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.store.emit(TodoPatch {
            visibility: Some(visibility),
            ..TodoPatch::default()
        });
    }

    pub fn toggle_search(&self) {
        let is_searching = self.store.with_state(|s| !s.is_searching);
        self.store.emit(TodoPatch {
            is_searching: Some(is_searching),
            ..TodoPatch::default()
        });
    }

    /// Queue a new task
    ///
    /// Ignored while searching. An empty title only sets an error message;
    /// a whitespace-only title is accepted as is.
    pub fn add_todo(&self, task: &str) {
        if self.store.with_state(|s| s.is_searching) {
            tracing::debug!("add_todo ignored while searching");
            return;
        }
        if task.is_empty() {
            self.store.emit(TodoPatch {
                message: Some(Some(Message::error(TASK_REQUIRED))),
                ..TodoPatch::default()
            });
            return;
        }

        let mut todos = self.store.with_state(|s| s.todos.as_ref().clone());
        let id = todos.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        todos.push(Todo::new(id, task, false));
        self.persist(todos, TODO_ADDED);
        self.store.dispatch("inc");
    }

    /// Flip the completion flag of `id`
    pub fn update_todo(&self, id: u32) {
        let todos = self.store.with_state(|s| {
            s.todos
                .iter()
                .map(|todo| {
                    if todo.id == id {
                        Todo {
                            completed: !todo.completed,
                            ..todo.clone()
                        }
                    } else {
                        todo.clone()
                    }
                })
                .collect()
        });
        self.persist(todos, TODO_UPDATED);
    }

    pub fn remove_todo(&self, id: u32) {
        let todos = self.store.with_state(|s| {
            s.todos
                .iter()
                .filter(|todo| todo.id != id)
                .cloned()
                .collect()
        });
        self.persist(todos, TODO_REMOVED);
    }

    // Loading is raised now; the list and message land after the save delay.
    fn persist(&self, todos: Vec<Todo>, notice: &str) {
        self.store.emit(TodoPatch {
            loading: Some(true),
            ..TodoPatch::default()
        });
        self.save.call(TodoPatch {
            todos: Some(Arc::new(todos)),
            message: Some(Some(Message::info(notice))),
            ..TodoPatch::default()
        });
    }

    pub fn todos(&self) -> StateStream<Arc<Vec<Todo>>> {
        self.store.select(|s| Arc::clone(&s.todos))
    }

    /// Todos admitted by the current visibility
    pub fn visible_todos(&self) -> impl Stream<Item = Vec<Todo>> + Send + 'static {
        self.store
            .select(|s| (Arc::clone(&s.todos), s.visibility))
            .map(|(todos, visibility)| {
                todos
                    .iter()
                    .filter(|todo| visibility.admits(todo))
                    .cloned()
                    .collect()
            })
    }

    /// Number of todos not yet completed
    pub fn active_count(&self) -> StateStream<usize> {
        self.store
            .select(|s| s.todos.iter().filter(|todo| !todo.completed).count())
    }

    pub fn message(&self) -> StateStream<Option<Message>> {
        self.store.select(|s| s.message.clone())
    }

    pub fn is_searching(&self) -> StateStream<bool> {
        self.store.select(|s| s.is_searching)
    }

    pub fn visibility(&self) -> StateStream<Visibility> {
        self.store.select(|s| s.visibility)
    }

    pub fn loading(&self) -> StateStream<bool> {
        self.store.select(|s| s.loading)
    }

    fn watch_messages(&self) {
        let bus = self.store.bus().clone();
        let watcher = tokio::spawn(self.message().for_each(move |message| {
            if message.is_some() {
                bus.dispatch(Action::of(HasMessage));
            }
            future::ready(())
        }));
        self.store.tear_down(Subscription::from_task(watcher));
    }

    fn clear_messages(&self) {
        let store = self.store.downgrade();
        let pending = self.store.bus().is_a::<HasMessage>().filter(move |_| {
            let has_message = store
                .upgrade()
                .is_some_and(|store| store.with_state(|s| s.message.is_some()));
            future::ready(has_message)
        });
        let cleared = delay_each(pending, self.settings.message_ttl()).map(|_| TodoPatch {
            message: Some(None),
            ..TodoPatch::default()
        });
        self.store.effect_on_action(cleared);
    }
}

impl Controller for TodoController {
    type State = TodoState;

    fn create(bus: &ActionBus) -> Self {
        Self::with_config(bus, TodoConfig::default())
    }

    fn store(&self) -> &Store<TodoState> {
        &self.store
    }

    fn on_init(self: &Arc<Self>) {
        self.store.emit(TodoPatch {
            todos: Some(Arc::new(default_todos())),
            ..TodoPatch::default()
        });
        self.clear_messages();
        self.watch_messages();
    }

    fn name() -> &'static str {
        "TodoController"
    }
}
