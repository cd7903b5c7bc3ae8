//! Admin listener: settings overview and the "clear all cache" action.

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        purge::{PurgeOutcome, PurgeService},
    },
    config::Settings,
    domain::nocache::TokenPolicy,
    presentation::views::{
        AdminCloudflareTemplate, CloudflareOverview, FlashKind, FlashView, NoCacheOverview,
        PurgeOverview, render_template_response,
    },
};

use super::middleware::{log_responses, set_request_context, tokens_match};

#[derive(Clone)]
pub struct AdminState {
    pub purge: Arc<PurgeService>,
    pub settings: Arc<Settings>,
    /// Anti-forgery token embedded in the purge form, fixed per process.
    pub csrf_token: Arc<str>,
}

impl AdminState {
    pub fn new(purge: Arc<PurgeService>, settings: Arc<Settings>) -> Self {
        Self {
            purge,
            settings,
            csrf_token: Arc::from(Uuid::new_v4().simple().to_string()),
        }
    }
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(admin_overview))
        .route("/purge", post(admin_purge_everything))
        .route("/_health", get(admin_health))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OverviewQuery {
    purge_success: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PurgeForm {
    confirm: Option<String>,
    csrf_token: Option<String>,
}

async fn admin_health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn admin_overview(
    State(state): State<AdminState>,
    Query(query): Query<OverviewQuery>,
) -> Response {
    let template = AdminCloudflareTemplate {
        flash: flash_for(query.purge_success.as_deref()),
        csrf_token: state.csrf_token.to_string(),
        cloudflare: cloudflare_overview(&state.settings),
        nocache: NoCacheOverview {
            enabled: state.settings.nocache.enabled,
            param_name: state.settings.nocache.param_name.clone(),
            token_policy: match state.settings.nocache.token_policy {
                TokenPolicy::PerProcess => "one token per process",
                TokenPolicy::PerRender => "fresh token per page",
            },
        },
        purge: PurgeOverview {
            on_save: state.settings.purge.on_save,
            excluded_post_types: state.settings.purge.excluded_post_types.clone(),
            warm_after_purge: state.settings.purge.warm_after_purge,
        },
    };

    render_template_response(template, StatusCode::OK)
}

async fn admin_purge_everything(
    State(state): State<AdminState>,
    Form(form): Form<PurgeForm>,
) -> Response {
    let token_valid = form
        .csrf_token
        .as_deref()
        .is_some_and(|token| tokens_match(token, &state.csrf_token));
    if !token_valid {
        warn!(
            target = "cfpurge::admin",
            "full purge rejected: missing or stale form token"
        );
        return HttpError::new(
            "infra::http::admin_purge_everything",
            StatusCode::FORBIDDEN,
            "Form token missing or expired; reload the page and try again",
            "csrf token mismatch",
        )
        .into_response();
    }

    let confirmed = form
        .confirm
        .as_deref()
        .is_some_and(|value| !value.trim().is_empty());
    if !confirmed {
        return Redirect::to("/").into_response();
    }

    let outcome = state.purge.purge_everything().await;
    info!(
        target = "cfpurge::admin",
        purged = outcome.is_purged(),
        "admin requested a full purge"
    );

    let target = match outcome {
        PurgeOutcome::Purged(_) => "/?purge_success=1",
        PurgeOutcome::Skipped(_) | PurgeOutcome::Failed { .. } => "/?purge_success=0",
    };
    Redirect::to(target).into_response()
}

fn flash_for(purge_success: Option<&str>) -> Option<FlashView> {
    match purge_success? {
        "1" => Some(FlashView {
            kind: FlashKind::Success,
            message: "Cloudflare cache cleared.",
        }),
        "0" => Some(FlashView {
            kind: FlashKind::Error,
            message: "Cloudflare purge did not succeed; check the service logs.",
        }),
        _ => None,
    }
}

fn cloudflare_overview(settings: &Settings) -> CloudflareOverview {
    let creds = settings.cloudflare.credentials.as_ref();
    CloudflareOverview {
        zone_id: creds.map(|creds| creds.zone_id().to_string()),
        auth_email: creds.map(|creds| creds.auth_email().to_string()),
        masked_key: creds.map(|creds| creds.masked_key()),
        purge_method: settings.cloudflare.purge_method.to_string(),
        verify_tls: settings.cloudflare.verify_tls,
    }
}
