use std::{process, sync::Arc};

use cfpurge::{
    application::{
        cdn::{PurgeDispatcher, UrlWarmer},
        error::AppError,
        links::LinkRewriter,
        purge::{PurgeService, SavePolicy},
    },
    config,
    infra::{
        cloudflare::CloudflareClient,
        error::InfraError,
        http::{self, AdminState, HooksState},
        telemetry,
        warmer::HttpWarmer,
    },
};
use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

struct ApplicationContext {
    hooks_state: HooksState,
    admin_state: AdminState,
}

fn build_application_context(settings: config::Settings) -> Result<ApplicationContext, AppError> {
    let settings = Arc::new(settings);

    if settings.cloudflare.credentials.is_none() {
        warn!(
            target = "cfpurge::startup",
            "cloudflare zone, email or api key missing; purges will be skipped"
        );
    }

    let dispatcher: Arc<dyn PurgeDispatcher> =
        Arc::new(CloudflareClient::new(&settings.cloudflare)?);
    let warmer: Arc<dyn UrlWarmer> = Arc::new(HttpWarmer::new(&settings.purge)?);

    let purge = Arc::new(PurgeService::new(
        dispatcher,
        warmer,
        settings.cloudflare.credentials.clone(),
        SavePolicy::from(&settings.purge),
        &settings.nocache,
    ));
    let links = Arc::new(LinkRewriter::new(&settings.nocache));

    Ok(ApplicationContext {
        hooks_state: HooksState {
            purge: purge.clone(),
            links,
            token: settings.hooks.token.as_deref().map(Arc::from),
        },
        admin_state: AdminState::new(purge, settings),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let hooks_addr = settings.server.hooks_addr;
    let admin_addr = settings.server.admin_addr;
    let app = build_application_context(settings)?;

    let hooks_router = http::build_hooks_router(app.hooks_state);
    let admin_router = http::build_admin_router(app.admin_state);

    let hooks_listener = tokio::net::TcpListener::bind(hooks_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "cfpurge::startup",
        hooks = %hooks_addr,
        admin = %admin_addr,
        "listeners bound"
    );

    let hooks_server = axum::serve(hooks_listener, hooks_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(hooks_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
