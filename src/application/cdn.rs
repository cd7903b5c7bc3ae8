//! Seams between the purge workflow and the outside world.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{credentials::CdnCredentials, error::DomainError};

/// Successful purge acknowledged by the CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeAck {
    pub status: u16,
    pub purge_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("invalid purge input: {0}")]
    InvalidInput(#[from] DomainError),
    #[error("no response from the CDN: {message}")]
    Transport { message: String },
    #[error("CDN rejected the purge with status {status}: {body}")]
    Api { status: u16, body: String },
}

impl PurgeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::InvalidInput(_) | Self::Transport { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Transport { .. } => "transport",
            Self::Api { .. } => "api",
        }
    }
}

/// Sends purge requests to the CDN, one network call per invocation.
#[async_trait]
pub trait PurgeDispatcher: Send + Sync {
    async fn purge_everything(&self, creds: &CdnCredentials) -> Result<PurgeAck, PurgeError>;

    /// Fails with [`PurgeError::InvalidInput`] before any I/O when `urls` is empty.
    async fn purge_urls(
        &self,
        creds: &CdnCredentials,
        urls: &[String],
    ) -> Result<PurgeAck, PurgeError>;
}

/// Re-fetches purged URLs so the edge holds a fresh copy.
///
/// Implementations must return immediately; fetches run in the background.
pub trait UrlWarmer: Send + Sync {
    fn warm(&self, urls: &[String]);
}

