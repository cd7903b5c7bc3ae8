//! Hooks listener: the host CMS reports saves and asks for purges here.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use cfpurge_api_types::{
    ContentSavedRequest, LinkKindInput, OutcomeKind, PurgeOutcomeResponse, PurgeUrlsRequest,
    RewriteLinksRequest, RewriteLinksResponse,
};

use crate::{
    application::{
        links::{LinkKind, LinkRewriter, Session},
        purge::{PurgeOutcome, PurgeService, SkipReason},
    },
    domain::content::{ContentSaved, PostType},
};

use super::{
    error::ApiError,
    middleware::{hooks_auth, log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HooksState {
    pub purge: Arc<PurgeService>,
    pub links: Arc<LinkRewriter>,
    pub token: Option<Arc<str>>,
}

pub fn build_hooks_router(state: HooksState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route("/api/v1/content/saved", post(content_saved))
        .route("/api/v1/purge/urls", post(purge_urls))
        .route("/api/v1/purge/everything", post(purge_everything))
        .route("/api/v1/links/rewrite", post(rewrite_links))
        .layer(axum_middleware::from_fn_with_state(auth_state, hooks_auth))
        .route("/_health", get(health))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn content_saved(
    State(state): State<HooksState>,
    Json(payload): Json<ContentSavedRequest>,
) -> Json<PurgeOutcomeResponse> {
    let event = ContentSaved {
        post_id: payload.post_id,
        post_type: PostType {
            name: payload.post_type.name,
            public: payload.post_type.public,
            publicly_queryable: payload.post_type.publicly_queryable,
        },
        urls: payload.urls,
        form_submission: payload.form_submission,
    };

    Json(outcome_response(state.purge.content_saved(event).await))
}

async fn purge_urls(
    State(state): State<HooksState>,
    Json(payload): Json<PurgeUrlsRequest>,
) -> Response {
    match state.purge.purge_urls(payload.urls).await {
        PurgeOutcome::Skipped(SkipReason::NoUrls) => ApiError::empty_purge().into_response(),
        outcome => Json(outcome_response(outcome)).into_response(),
    }
}

async fn purge_everything(State(state): State<HooksState>) -> Json<PurgeOutcomeResponse> {
    Json(outcome_response(state.purge.purge_everything().await))
}

async fn rewrite_links(
    State(state): State<HooksState>,
    Json(payload): Json<RewriteLinksRequest>,
) -> Json<RewriteLinksResponse> {
    let render = state.links.render(Session {
        logged_in: payload.logged_in,
    });

    let links = payload
        .links
        .iter()
        .map(|link| render.rewrite(link_kind(link.kind), &link.url))
        .collect();

    Json(RewriteLinksResponse {
        links,
        token: render.token().map(str::to_string),
    })
}

fn link_kind(input: LinkKindInput) -> LinkKind {
    match input {
        LinkKindInput::Home => LinkKind::Home,
        LinkKindInput::Post => LinkKind::Post,
        LinkKindInput::Page => LinkKind::Page,
        LinkKindInput::PostType => LinkKind::PostType,
        LinkKindInput::Category => LinkKind::Category,
        LinkKindInput::Tag => LinkKind::Tag,
        LinkKindInput::Author => LinkKind::Author,
        LinkKindInput::Day => LinkKind::Day,
        LinkKindInput::Month => LinkKind::Month,
        LinkKindInput::Year => LinkKind::Year,
        LinkKindInput::CommentsFeed => LinkKind::CommentsFeed,
    }
}

fn outcome_response(outcome: PurgeOutcome) -> PurgeOutcomeResponse {
    match outcome {
        PurgeOutcome::Purged(ack) => PurgeOutcomeResponse {
            outcome: OutcomeKind::Purged,
            reason: None,
            status: Some(ack.status),
            purge_id: ack.purge_id,
        },
        PurgeOutcome::Skipped(reason) => PurgeOutcomeResponse {
            outcome: OutcomeKind::Skipped,
            reason: Some(reason.as_str().to_string()),
            status: None,
            purge_id: None,
        },
        PurgeOutcome::Failed { status, message } => PurgeOutcomeResponse {
            outcome: OutcomeKind::Failed,
            reason: Some(message),
            status,
            purge_id: None,
        },
    }
}
