//! Error types for netplane.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for netplane operations.
pub type Result<T> = std::result::Result<T, NetplaneError>;

/// Main error type for netplane.
#[derive(Error, Debug)]
pub enum NetplaneError {
    // Validation errors
    #[error("Invalid option for network {network:?} option {key:?}")]
    InvalidOption { network: String, key: String },

    #[error("Invalid value for network {network:?} option {key:?}: {reason}")]
    InvalidValue { network: String, key: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid forward: {reason}")]
    InvalidForward { reason: String },

    #[error("Invalid peer: {reason}")]
    InvalidPeer { reason: String },

    #[error("Invalid port range {range:?}: {reason}")]
    InvalidPortRange { range: String, reason: String },

    // Lookup errors
    #[error("Network {name:?} not found in project {project:?}")]
    NetworkNotFound { project: String, name: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    // Conflict errors
    #[error("Duplicate listen port {port} for protocol {protocol:?} in port specification {spec}")]
    DuplicateListenPort { port: u16, protocol: String, spec: usize },

    #[error("Network {name:?} already exists in project {project:?}")]
    NetworkAlreadyExists { project: String, name: String },

    // Driver capability errors
    #[error("Not implemented")]
    NotImplemented,

    // Cluster errors
    #[error("Failed notifying cluster member {member:?}: {reason}")]
    NotifyFailed { member: String, reason: String },

    #[error("Cluster member {member:?} is offline")]
    MemberOffline { member: String },

    // BGP errors
    #[error("BGP operation failed: {reason}")]
    BgpFailed { reason: String },

    #[error("Failed setting up BGP {stage}: {reason}")]
    BgpSetupFailed { stage: &'static str, reason: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NetplaneError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Whether this is the sentinel returned by drivers lacking a capability.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }

    /// Whether the error was caused by invalid user input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption { .. }
                | Self::InvalidValue { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidName { .. }
                | Self::InvalidForward { .. }
                | Self::InvalidPeer { .. }
                | Self::InvalidPortRange { .. }
                | Self::DuplicateListenPort { .. }
        )
    }
}

