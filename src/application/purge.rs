//! Save-event purge workflow.
//!
//! Every entry point reports a [`PurgeOutcome`] instead of an error: purging
//! is best-effort and must never fail the host's save pipeline.

use std::{collections::HashSet, fmt, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::{NoCacheSettings, PurgeSettings},
    domain::{content::ContentSaved, credentials::CdnCredentials, nocache},
    infra::telemetry::{METRIC_PURGE_MS, METRIC_PURGE_REQUESTS_TOTAL},
};

use super::cdn::{PurgeAck, PurgeDispatcher, PurgeError, UrlWarmer};

/// Why a purge was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFormSubmission,
    Disabled,
    NotPublic,
    ExcludedPostType,
    NoUrls,
    MissingCredentials,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFormSubmission => "not_form_submission",
            Self::Disabled => "disabled",
            Self::NotPublic => "not_public",
            Self::ExcludedPostType => "excluded_post_type",
            Self::NoUrls => "no_urls",
            Self::MissingCredentials => "missing_credentials",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeOutcome {
    Purged(PurgeAck),
    Skipped(SkipReason),
    Failed { status: Option<u16>, message: String },
}

impl PurgeOutcome {
    pub fn is_purged(&self) -> bool {
        matches!(self, Self::Purged(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Purged(_) => "purged",
            Self::Skipped(_) => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Save-event rules applied before a purge is dispatched.
#[derive(Debug, Clone)]
pub struct SavePolicy {
    pub on_save: bool,
    pub excluded_post_types: Vec<String>,
    pub warm_after_purge: bool,
}

impl From<&PurgeSettings> for SavePolicy {
    fn from(settings: &PurgeSettings) -> Self {
        Self {
            on_save: settings.on_save,
            excluded_post_types: settings.excluded_post_types.clone(),
            warm_after_purge: settings.warm_after_purge,
        }
    }
}

impl SavePolicy {
    fn check(&self, event: &ContentSaved) -> Option<SkipReason> {
        if !event.form_submission {
            return Some(SkipReason::NotFormSubmission);
        }
        if !self.on_save {
            return Some(SkipReason::Disabled);
        }
        if !event.post_type.has_public_view() {
            return Some(SkipReason::NotPublic);
        }
        if self
            .excluded_post_types
            .iter()
            .any(|name| *name == event.post_type.name)
        {
            return Some(SkipReason::ExcludedPostType);
        }
        None
    }
}

pub struct PurgeService {
    dispatcher: Arc<dyn PurgeDispatcher>,
    warmer: Arc<dyn UrlWarmer>,
    credentials: Option<CdnCredentials>,
    policy: SavePolicy,
    /// Cache-bust parameter to strip, when the feature is on.
    nocache_param: Option<String>,
}

impl PurgeService {
    pub fn new(
        dispatcher: Arc<dyn PurgeDispatcher>,
        warmer: Arc<dyn UrlWarmer>,
        credentials: Option<CdnCredentials>,
        policy: SavePolicy,
        nocache: &NoCacheSettings,
    ) -> Self {
        Self {
            dispatcher,
            warmer,
            credentials,
            policy,
            nocache_param: nocache.enabled.then(|| nocache.param_name.clone()),
        }
    }

    /// Purge, then warm, the URLs of a saved resource.
    #[instrument(
        skip(self, event),
        fields(post_id = event.post_id, post_type = %event.post_type.name)
    )]
    pub async fn content_saved(&self, event: ContentSaved) -> PurgeOutcome {
        if let Some(reason) = self.policy.check(&event) {
            debug!(
                target = "cfpurge::purge",
                reason = %reason,
                "save-triggered purge skipped"
            );
            return PurgeOutcome::Skipped(reason);
        }

        let urls = self.canonical_urls(event.urls);
        if urls.is_empty() {
            debug!(target = "cfpurge::purge", "save-triggered purge skipped: no urls");
            return PurgeOutcome::Skipped(SkipReason::NoUrls);
        }

        let outcome = self.dispatch_urls(&urls).await;

        if self.policy.warm_after_purge {
            self.warmer.warm(&urls);
        }

        outcome
    }

    /// Purge an explicit list of URLs.
    pub async fn purge_urls(&self, urls: Vec<String>) -> PurgeOutcome {
        let urls = self.canonical_urls(urls);
        if urls.is_empty() {
            return PurgeOutcome::Skipped(SkipReason::NoUrls);
        }
        self.dispatch_urls(&urls).await
    }

    /// Purge every cached file in the zone.
    pub async fn purge_everything(&self) -> PurgeOutcome {
        let Some(creds) = self.credentials.as_ref() else {
            warn!(
                target = "cfpurge::purge",
                "purge everything skipped: cloudflare credentials are not configured"
            );
            return PurgeOutcome::Skipped(SkipReason::MissingCredentials);
        };

        let started = Instant::now();
        let result = self.dispatcher.purge_everything(creds).await;
        self.report("everything", 0, started, result)
    }

    async fn dispatch_urls(&self, urls: &[String]) -> PurgeOutcome {
        let Some(creds) = self.credentials.as_ref() else {
            warn!(
                target = "cfpurge::purge",
                url_count = urls.len(),
                "purge skipped: cloudflare credentials are not configured"
            );
            return PurgeOutcome::Skipped(SkipReason::MissingCredentials);
        };

        let started = Instant::now();
        let result = self.dispatcher.purge_urls(creds, urls).await;
        self.report("urls", urls.len(), started, result)
    }

    fn report(
        &self,
        kind: &'static str,
        url_count: usize,
        started: Instant,
        result: Result<PurgeAck, PurgeError>,
    ) -> PurgeOutcome {
        let outcome = match result {
            Ok(ack) => {
                info!(
                    target = "cfpurge::purge",
                    kind,
                    url_count,
                    status = ack.status,
                    purge_id = ack.purge_id.as_deref().unwrap_or(""),
                    "purge accepted"
                );
                PurgeOutcome::Purged(ack)
            }
            Err(err) => {
                warn!(
                    target = "cfpurge::purge",
                    kind,
                    url_count,
                    error_kind = err.kind(),
                    error = %err,
                    "purge failed"
                );
                PurgeOutcome::Failed {
                    status: err.status(),
                    message: err.to_string(),
                }
            }
        };

        histogram!(METRIC_PURGE_MS, "kind" => kind).record(started.elapsed().as_secs_f64() * 1000.0);
        counter!(METRIC_PURGE_REQUESTS_TOTAL, "kind" => kind, "outcome" => outcome.label())
            .increment(1);

        outcome
    }

    /// Trimmed, cache-bust-free URLs, deduplicated in first-seen order.
    fn canonical_urls(&self, urls: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        urls.into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|url| match self.nocache_param.as_deref() {
                Some(param) => nocache::strip_nocache_param(&url, param),
                None => url,
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}
