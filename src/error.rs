use thiserror::Error;

/// Main error type for the multiwatch discovery core
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Configuration related errors, raised during construction only
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A child watcher failed to start
    #[error("Watcher '{watcher}' failed to start: {message}")]
    Start { watcher: String, message: String },

    /// One or more child watchers failed to stop
    #[error("Watchers failed to stop: {}", failed.join(", "))]
    Stop { failed: Vec<String> },

    /// Discovery backend errors (DNS lookup failures, etc.)
    #[error("Discovery backend error: {message}")]
    Backend { message: String },

    /// IO related errors
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DiscoveryError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a start error for a named watcher
    pub fn start<W: Into<String>, S: Into<String>>(watcher: W, message: S) -> Self {
        Self::Start {
            watcher: watcher.into(),
            message: message.into(),
        }
    }

    /// Create an aggregate stop error naming every failing watcher
    pub fn stop(failed: Vec<String>) -> Self {
        Self::Stop { failed }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if the error was raised by configuration validation
    pub fn is_config(&self) -> bool {
        matches!(self, DiscoveryError::Config { .. })
    }
}

/// Result type alias for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Convert from std::io::Error to DiscoveryError
impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io {
            message: err.to_string(),
        }
    }
}

/// Convert from serde_json::Error to DiscoveryError
impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::config(format!("JSON parsing error: {}", err))
    }
}

/// Convert from toml::de::Error to DiscoveryError
impl From<toml::de::Error> for DiscoveryError {
    fn from(err: toml::de::Error) -> Self {
        DiscoveryError::config(format!("TOML parsing error: {}", err))
    }
}
