use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_PURGE_REQUESTS_TOTAL: &str = "cfpurge_purge_requests_total";
pub const METRIC_PURGE_MS: &str = "cfpurge_purge_ms";
pub const METRIC_WARM_REQUESTS_TOTAL: &str = "cfpurge_warm_requests_total";
pub const METRIC_LINKS_REWRITTEN_TOTAL: &str = "cfpurge_links_rewritten_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_PURGE_REQUESTS_TOTAL,
            Unit::Count,
            "Purge requests sent to Cloudflare, labelled by kind and outcome."
        );
        describe_histogram!(
            METRIC_PURGE_MS,
            Unit::Milliseconds,
            "Round-trip latency of Cloudflare purge requests."
        );
        describe_counter!(
            METRIC_WARM_REQUESTS_TOTAL,
            Unit::Count,
            "Background warm-up fetches issued after a purge, labelled by outcome."
        );
        describe_counter!(
            METRIC_LINKS_REWRITTEN_TOTAL,
            Unit::Count,
            "Links that received the cache-busting parameter."
        );
    });
}
