//! Actions broadcast on the [`ActionBus`](crate::ActionBus)
//!
//! An action is a string discriminator plus an optional type-erased
//! payload. Plain actions are created from strings; typed variants
//! implement [`ActionVariant`] and are narrowed back with
//! [`Action::downcast`] or the bus' `is_a` filter, which match on the
//! payload's runtime type rather than on the discriminator.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StoreError};

/// Discriminator of the action the bus is seeded with
pub const INIT: &str = "@INIT";

/// A typed action payload
///
/// ```
/// use libstatebus::{Action, ActionVariant};
///
/// struct SearchTodo {
///     text: String,
/// }
///
/// impl ActionVariant for SearchTodo {
///     const KIND: &'static str = "search_todo";
/// }
///
/// let action = Action::of(SearchTodo { text: "milk".into() });
/// assert_eq!(action.kind(), "search_todo");
/// assert_eq!(action.payload::<SearchTodo>().unwrap().text, "milk");
/// ```
pub trait ActionVariant: Any + Send + Sync {
    const KIND: &'static str;
}

/// An immutable, cheaply cloneable action
#[derive(Clone)]
pub struct Action {
    kind: Cow<'static, str>,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Action {
    /// Create a plain action with no payload
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Create a plain action, rejecting an empty discriminator
    pub fn try_new(kind: impl Into<Cow<'static, str>>) -> Result<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "action kind cannot be empty".to_string(),
            ));
        }
        Ok(Self::new(kind))
    }

    /// Create an action carrying an arbitrary payload
    pub fn with_payload<T>(kind: impl Into<Cow<'static, str>>, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            kind: kind.into(),
            payload: Some(Arc::new(payload)),
        }
    }

    /// Wrap a typed variant, using its declared discriminator
    pub fn of<T: ActionVariant>(variant: T) -> Self {
        Self::with_payload(T::KIND, variant)
    }

    pub(crate) fn init() -> Self {
        Self::new(INIT)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// True when the payload's runtime type is `T`
    pub fn is<T: Any>(&self) -> bool {
        self.payload_type_id() == Some(TypeId::of::<T>())
    }

    /// Borrow the payload as `T`
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Share the payload as `Arc<T>`
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.payload
            .as_ref()
            .and_then(|p| Arc::clone(p).downcast::<T>().ok())
    }

    fn payload_type_id(&self) -> Option<TypeId> {
        self.payload.as_deref().map(|p| p.type_id())
    }
}

impl From<&'static str> for Action {
    fn from(kind: &'static str) -> Self {
        Action::new(kind)
    }
}

impl From<String> for Action {
    fn from(kind: String) -> Self {
        Action::new(kind)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}
