//! Error types for PriceWatch

use thiserror::Error;

use crate::market::UpstreamError;

/// Result type alias using PriceWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PriceWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Alert kind is not one of above, below, cross
    #[error("Invalid alert kind '{0}': expected one of above, below, cross")]
    InvalidKind(String),

    /// Threshold is NaN, infinite or otherwise unusable
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Symbol could not be resolved by the price source
    #[error("Unknown or unavailable symbol: {0}")]
    UnknownSymbol(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Upstream price provider error
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration loading error
    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by caller input rather than the system
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidKind(_)
                | Self::InvalidThreshold(_)
                | Self::UnknownSymbol(_)
                | Self::Validation(_)
        )
    }
}
