//! Error types for statebus-todo

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Controller error: {0}")]
    Store(#[from] libstatebus::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DemoError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DemoError::Store(libstatebus::StoreError::InvalidArgument(_)) => 3,
            DemoError::Store(_) => 2,
            DemoError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

pub type Result<T> = std::result::Result<T, DemoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use libstatebus::StoreError;
    use std::time::Duration;

    #[test]
    fn test_exit_code_invalid_action_kind() {
        let error = DemoError::from(StoreError::InvalidArgument("kind".to_string()));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_lookup_timeout() {
        let error = DemoError::from(StoreError::LookupTimeout {
            controller: "TodoController",
            timeout: Duration::from_secs(1),
        });
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = DemoError::from(ConfigError::MissingField("config directory".to_string()));
        assert_eq!(error.exit_code(), 1);
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: config directory"
        );
    }
}
