//! statebus-todo - scripted to-do session on statebus controllers

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use libstatebus::logging::{LogFormat, LoggingConfig};
use libstatebus::{Action, AppContext, Controller, Subscription};
use statebus_todo::{Config, CounterController, DemoError, TodoController};

#[derive(Parser, Debug)]
#[command(name = "statebus-todo")]
#[command(version, about = "Run a scripted to-do session on statebus controllers")]
#[command(long_about = r#"Run a scripted to-do session on statebus controllers.

Adds each --task, toggles the first todo, removes the last one, and logs
every change-filtered snapshot along the way.

EXAMPLES:
    statebus-todo --task "Buy milk" --task "Call mom"
    statebus-todo --log-format json --verbose
    statebus-todo --dispatch inc --dispatch inc

CONFIGURATION:
    Read from --config, $STATEBUS_TODO_CONFIG, or
    <config dir>/statebus/todo.toml. Defaults apply when none exists.

EXIT CODES:
    0 - Success
    1 - Configuration or IO error
    2 - Controller error (e.g. remote lookup failed)
    3 - Invalid input
"#)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format (text, json, pretty)
    #[arg(long, value_name = "FORMAT", env = "STATEBUS_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Task to add; repeatable
    #[arg(short, long = "task", value_name = "TITLE")]
    tasks: Vec<String>,

    /// Extra action kind to dispatch before the session; repeatable
    #[arg(long = "dispatch", value_name = "KIND")]
    dispatches: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        let code = err.downcast_ref::<DemoError>().map_or(1, DemoError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .map_err(DemoError::from)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load().map_err(DemoError::from)?,
    };

    let format = cli.log_format.unwrap_or(config.logging.format);
    LoggingConfig::new(format, config.logging.level.clone(), cli.verbose).init();

    let context = AppContext::new();
    let todo_settings = config.todo.clone();
    let todo = context
        .registry()
        .get_or_insert_with(|bus| TodoController::with_config(bus, todo_settings));
    let counter = context.get::<CounterController>();
    let _watchers = watch(&todo, &counter);
    settle().await;

    let actions = cli
        .dispatches
        .iter()
        .map(|kind| Action::try_new(kind.clone()).map_err(DemoError::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for action in actions {
        context.dispatch(action);
    }

    counter
        .store()
        .try_remote_controller::<TodoController>(Duration::from_secs(1))
        .await
        .map_err(DemoError::from)
        .context("counter could not reach the todo controller")?;

    let save_wait = config.todo.save_delay() + Duration::from_millis(50);
    let tasks = if cli.tasks.is_empty() {
        vec!["Try statebus".to_string()]
    } else {
        cli.tasks
    };
    for task in &tasks {
        todo.add_todo(task);
    }
    tokio::time::sleep(save_wait).await;

    if let Some(first) = todo.state().todos.first().map(|t| t.id) {
        todo.update_todo(first);
        tokio::time::sleep(save_wait).await;
    }
    if let Some(last) = todo.state().todos.last().map(|t| t.id) {
        todo.remove_todo(last);
        tokio::time::sleep(save_wait).await;
    }

    let state = todo.state();
    for item in state.todos.iter() {
        let mark = if item.completed { "x" } else { " " };
        println!("[{}] {:>3} {}", mark, item.id, item.task);
    }
    println!("counter: {}", counter.value());

    let disposed = context.shutdown();
    tracing::debug!(controllers = disposed, "session finished");
    Ok(())
}

/// Log every change-filtered view until the controllers are disposed
fn watch(todo: &TodoController, counter: &CounterController) -> Vec<Subscription> {
    let todos = todo.todos().for_each(|todos| {
        tracing::info!(count = todos.len(), "todos changed");
        futures::future::ready(())
    });
    let messages = todo.message().for_each(|message| {
        if let Some(message) = message {
            tracing::info!(%message, "message");
        }
        futures::future::ready(())
    });
    let loading = todo.loading().for_each(|loading| {
        tracing::info!(loading, "loading changed");
        futures::future::ready(())
    });
    let count = counter.store().stream().for_each(|value| {
        tracing::info!(value, "counter changed");
        futures::future::ready(())
    });

    vec![
        Subscription::from_task(tokio::spawn(todos)),
        Subscription::from_task(tokio::spawn(messages)),
        Subscription::from_task(tokio::spawn(loading)),
        Subscription::from_task(tokio::spawn(count)),
    ]
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
