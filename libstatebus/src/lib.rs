//! Statebus - reactive state controllers over a shared action bus
//!
//! Controllers each own a private snapshot in a [`Store`], react to every
//! [`Action`] broadcast on one [`ActionBus`], expose change-filtered
//! streams of their state, run effect pipelines that feed back into that
//! state, and find each other at runtime by type through a remote lookup.

pub mod action;
pub mod bus;
pub mod compare;
pub mod context;
pub mod controller;
pub mod effect;
pub mod error;
mod fanout;
pub mod logging;
pub mod registry;
pub mod remote;
pub mod store;
pub mod stream;
pub mod subscription;

// Re-export commonly used types
pub use action::{Action, ActionVariant, INIT};
pub use bus::{ActionBus, ActionStream};
pub use compare::ShallowEq;
pub use context::AppContext;
pub use controller::{start, Controller};
pub use effect::{EffectInput, Trigger};
pub use error::{Result, StoreError};
pub use registry::ControllerRegistry;
pub use remote::{respond_to_lookup, LookupRequest, RemoteLookup, REMOTE_LOOKUP};
pub use store::{State, StateStream, Store, WeakStore};
pub use stream::{Distinct, DistinctExt, Feed};
pub use subscription::{Subscription, SubscriptionSet};
