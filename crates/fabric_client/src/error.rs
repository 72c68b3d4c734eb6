//! Error types for the client module.

use thiserror::Error;

use fabric_net::NetError;

/// Result type alias for network calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for registry lookups.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by the network control surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Resource in incorrect state: {0}")]
    IncorrectState(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Worth retrying: throttling, network trouble, or a resource that is
    /// still settling.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Throttled(_) | ClientError::Transport(_) | ClientError::IncorrectState(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Errors from the attachment registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing found yet. Expected right after creation.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Parameter {name} holds an invalid value: {source}")]
    InvalidParameter {
        name: String,
        #[source]
        source: NetError,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Client(e) if e.is_transient())
    }
}

/// Errors loading a mock network fixture.
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
