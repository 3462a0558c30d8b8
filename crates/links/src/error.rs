use std::error::Error as StdError;

use crate::types::Platform;

/// Crate-wide result type for link operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared across the link subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An integration is missing required credential slots. Not retryable;
    /// surfaced to the tenant admin.
    #[error("missing credentials: {message}")]
    MissingCredentials { message: String },

    /// An integration carries credentials that cannot be parsed.
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Webhook signature mismatch or OAuth exchange failure.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// No live link exists for the addressed tenant/platform pair.
    #[error("no active link for tenant {tenant_id} on {platform}")]
    LinkNotFound { tenant_id: i64, platform: Platform },

    /// A platform tag that no adapter is registered for.
    #[error("unknown platform: {platform}")]
    UnknownPlatform { platform: String },

    /// Wrapped source error from an external dependency (platform API,
    /// store backend). Transient from the subsystem's point of view.
    #[error("link operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// Integer parsing failed.
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
}

impl Error {
    #[must_use]
    pub fn missing_credentials(message: impl std::fmt::Display) -> Self {
        Self::MissingCredentials {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_credentials(message: impl std::fmt::Display) -> Self {
        Self::InvalidCredentials {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn authentication(message: impl std::fmt::Display) -> Self {
        Self::Authentication {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an `anyhow::Error` coming out of a store or adapter seam.
    #[must_use]
    pub fn store(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::External {
            context: context.into(),
            source: source.into(),
        }
    }
}
