//! Cloudflare v4 `purge_cache` client.

use async_trait::async_trait;
use axum::http::{HeaderValue, Method, header};
use cfpurge_api_types::CloudflareEnvelope;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::{
    application::cdn::{PurgeAck, PurgeDispatcher, PurgeError},
    config::CloudflareSettings,
    domain::{credentials::CdnCredentials, error::DomainError, purge::PurgeRequest},
};

use super::error::InfraError;

const AUTH_EMAIL_HEADER: &str = "X-Auth-Email";
const AUTH_KEY_HEADER: &str = "X-Auth-Key";

#[derive(Debug, Clone)]
pub struct CloudflareClient {
    client: Client,
    base: Url,
    method: Method,
}

impl CloudflareClient {
    pub fn new(settings: &CloudflareSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        if !settings.verify_tls {
            warn!(
                target = "cfpurge::infra::cloudflare",
                "TLS certificate verification is disabled for Cloudflare API calls"
            );
        }

        Ok(Self {
            client,
            base: settings.api_base_url.clone(),
            method: settings.purge_method.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("cfpurge/", env!("CARGO_PKG_VERSION"))
    }

    /// `{base}/zones/{zone_id}/purge_cache`, with the zone id percent-encoded.
    pub fn purge_url(&self, zone_id: &str) -> Result<Url, PurgeError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| PurgeError::transport(format!("`{}` cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["zones", zone_id, "purge_cache"]);
        Ok(url)
    }

    async fn send(
        &self,
        creds: &CdnCredentials,
        request: &PurgeRequest,
    ) -> Result<PurgeAck, PurgeError> {
        let url = self.purge_url(creds.zone_id())?;
        let kind = request.kind();

        let response = self
            .client
            .request(self.method.clone(), url.clone())
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .header(AUTH_EMAIL_HEADER, header_value(creds.auth_email())?)
            .header(AUTH_KEY_HEADER, header_value(creds.auth_key())?)
            .json(&request.body())
            .send()
            .await
            .map_err(|err| {
                let message = if err.is_timeout() {
                    format!("request to {url} timed out")
                } else {
                    format!("request to {url} failed: {err}")
                };
                PurgeError::transport(message)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| PurgeError::transport(format!("failed to read response body: {err}")))?;

        debug!(
            target = "cfpurge::infra::cloudflare",
            kind,
            zone_id = creds.zone_id(),
            status = status.as_u16(),
            body = %body,
            "cloudflare purge response"
        );

        if !status.is_success() {
            return Err(PurgeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let purge_id = match serde_json::from_str::<CloudflareEnvelope>(&body) {
            Ok(envelope) if !envelope.success => {
                return Err(PurgeError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(envelope) => envelope.result.map(|result| result.id),
            Err(err) => {
                warn!(
                    target = "cfpurge::infra::cloudflare",
                    kind,
                    error = %err,
                    "cloudflare response is not a v4 envelope"
                );
                None
            }
        };

        Ok(PurgeAck {
            status: status.as_u16(),
            purge_id,
            body,
        })
    }
}

#[async_trait]
impl PurgeDispatcher for CloudflareClient {
    async fn purge_everything(&self, creds: &CdnCredentials) -> Result<PurgeAck, PurgeError> {
        self.send(creds, &PurgeRequest::PurgeAll).await
    }

    async fn purge_urls(
        &self,
        creds: &CdnCredentials,
        urls: &[String],
    ) -> Result<PurgeAck, PurgeError> {
        let request = PurgeRequest::urls(urls.iter().cloned())?;
        self.send(creds, &request).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue, PurgeError> {
    HeaderValue::from_str(value).map_err(|err| {
        PurgeError::InvalidInput(DomainError::validation(format!(
            "credential is not a valid header value: {err}"
        )))
    })
}
