use std::fmt;

use super::error::DomainError;

/// Cloudflare zone and the legacy global-key credentials used to purge it.
///
/// Every field is non-empty and free of control characters once constructed,
/// so holding a value is enough to dispatch a request.
#[derive(Clone, PartialEq, Eq)]
pub struct CdnCredentials {
    zone_id: String,
    auth_email: String,
    auth_key: String,
}

impl CdnCredentials {
    pub fn new(
        zone_id: impl Into<String>,
        auth_email: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            zone_id: required(zone_id.into(), "cloudflare.zone_id")?,
            auth_email: required(auth_email.into(), "cloudflare.email")?,
            auth_key: required(auth_key.into(), "cloudflare.api_key")?,
        })
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn auth_email(&self) -> &str {
        &self.auth_email
    }

    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }

    /// Key suitable for display: the last four characters, the rest masked.
    pub fn masked_key(&self) -> String {
        let visible: String = self
            .auth_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("••••{visible}")
    }
}

impl fmt::Debug for CdnCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdnCredentials")
            .field("zone_id", &self.zone_id)
            .field("auth_email", &self.auth_email)
            .field("auth_key", &"<redacted>")
            .finish()
    }
}

fn required(value: String, field: &'static str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::missing(field));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(DomainError::validation(format!(
            "`{field}` must not contain control characters"
        )));
    }
    Ok(trimmed.to_string())
}
