//! Purge requests sent to the CDN.

use std::collections::HashSet;

use cfpurge_api_types::PurgeCacheBody;

use super::error::DomainError;

/// What to invalidate in a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeRequest {
    PurgeAll,
    PurgeUrls(Vec<String>),
}

impl PurgeRequest {
    /// Build a URL purge, dropping duplicates while keeping first-seen order.
    ///
    /// Fails when no URL is left, so a bodyless call can never be built.
    pub fn urls<I, S>(urls: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let files: Vec<String> = urls
            .into_iter()
            .map(Into::into)
            .filter(|url| seen.insert(url.clone()))
            .collect();

        if files.is_empty() {
            return Err(DomainError::validation("purge set must not be empty"));
        }

        Ok(Self::PurgeUrls(files))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PurgeAll => "everything",
            Self::PurgeUrls(_) => "urls",
        }
    }

    pub fn body(&self) -> PurgeCacheBody {
        match self {
            Self::PurgeAll => PurgeCacheBody::everything(),
            Self::PurgeUrls(files) => PurgeCacheBody::files(files.clone()),
        }
    }
}
