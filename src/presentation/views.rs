use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::HttpError;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "flash flash--success",
            Self::Error => "flash flash--error",
        }
    }
}

#[derive(Clone)]
pub struct FlashView {
    pub kind: FlashKind,
    pub message: &'static str,
}

/// Read-only summary of the Cloudflare connection.
#[derive(Clone)]
pub struct CloudflareOverview {
    pub zone_id: Option<String>,
    pub auth_email: Option<String>,
    pub masked_key: Option<String>,
    pub purge_method: String,
    pub verify_tls: bool,
}

impl CloudflareOverview {
    pub fn configured(&self) -> bool {
        self.zone_id.is_some()
    }
}

#[derive(Clone)]
pub struct NoCacheOverview {
    pub enabled: bool,
    pub param_name: String,
    pub token_policy: &'static str,
}

#[derive(Clone)]
pub struct PurgeOverview {
    pub on_save: bool,
    pub excluded_post_types: Vec<String>,
    pub warm_after_purge: bool,
}

#[derive(Template)]
#[template(path = "admin/cloudflare.html")]
pub struct AdminCloudflareTemplate {
    pub flash: Option<FlashView>,
    pub csrf_token: String,
    pub cloudflare: CloudflareOverview,
    pub nocache: NoCacheOverview,
    pub purge: PurgeOverview,
}
