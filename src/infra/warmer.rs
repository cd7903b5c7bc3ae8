//! Background warm-up fetches issued after a purge.

use metrics::counter;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    application::cdn::UrlWarmer, config::PurgeSettings,
    infra::telemetry::METRIC_WARM_REQUESTS_TOTAL,
};

use super::error::InfraError;

#[derive(Debug, Clone)]
pub struct HttpWarmer {
    client: Client,
}

impl HttpWarmer {
    pub fn new(settings: &PurgeSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("cfpurge-warmer/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.warm_timeout)
            .danger_accept_invalid_certs(!settings.warm_verify_tls)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` on the runtime; the body is discarded.
    pub fn spawn_warm(&self, url: String) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.get(url.as_str()).send().await {
                Ok(response) => {
                    debug!(
                        target = "cfpurge::infra::warmer",
                        url = %url,
                        status = response.status().as_u16(),
                        "warm-up fetch completed"
                    );
                    counter!(METRIC_WARM_REQUESTS_TOTAL, "outcome" => "ok").increment(1);
                }
                Err(err) => {
                    warn!(
                        target = "cfpurge::infra::warmer",
                        url = %url,
                        error = %err,
                        "warm-up fetch failed"
                    );
                    counter!(METRIC_WARM_REQUESTS_TOTAL, "outcome" => "error").increment(1);
                }
            }
        })
    }
}

impl UrlWarmer for HttpWarmer {
    fn warm(&self, urls: &[String]) {
        for url in urls {
            drop(self.spawn_warm(url.clone()));
        }
    }
}
