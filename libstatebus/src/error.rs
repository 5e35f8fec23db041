//! Error types for statebus

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Controller disposed: {0}")]
    Disposed(&'static str),

    #[error("Remote lookup unresolved: no live {0} answered")]
    LookupUnresolved(&'static str),

    #[error("Remote lookup for {controller} timed out after {timeout:?}")]
    LookupTimeout {
        controller: &'static str,
        timeout: Duration,
    },
}

impl StoreError {
    /// True for the two remote lookup failures
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            StoreError::LookupUnresolved(_) | StoreError::LookupTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting_invalid_argument() {
        let error = StoreError::InvalidArgument("kind cannot be empty".to_string());
        assert_eq!(format!("{}", error), "Invalid argument: kind cannot be empty");
    }

    #[test]
    fn test_error_message_formatting_disposed() {
        let error = StoreError::Disposed("CounterController");
        assert_eq!(format!("{}", error), "Controller disposed: CounterController");
    }

    #[test]
    fn test_error_message_formatting_lookup_timeout() {
        let error = StoreError::LookupTimeout {
            controller: "TodoController",
            timeout: Duration::from_millis(250),
        };
        let message = format!("{}", error);
        assert!(message.contains("TodoController"));
        assert!(message.contains("250ms"));
    }

    #[test]
    fn test_lookup_failure_detection() {
        assert!(StoreError::LookupUnresolved("A").is_lookup_failure());
        assert!(StoreError::LookupTimeout {
            controller: "A",
            timeout: Duration::from_secs(1),
        }
        .is_lookup_failure());
        assert!(!StoreError::Disposed("A").is_lookup_failure());
        assert!(!StoreError::InvalidArgument("x".to_string()).is_lookup_failure());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_err() -> Result<()> {
            Err(StoreError::Disposed("test"))
        }

        assert_eq!(returns_err(), Err(StoreError::Disposed("test")));
    }
}
