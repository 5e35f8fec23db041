//! statebus-todo - to-do list demo on statebus controllers
//!
//! Library half of the demo binary: controllers, configuration and
//! errors, kept here so integration tests can drive them directly.

pub mod config;
pub mod controllers;
pub mod error;

pub use config::Config;
pub use controllers::{CounterController, TodoController};
pub use error::{DemoError, Result};
