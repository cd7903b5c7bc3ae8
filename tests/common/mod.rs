#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::http::Method;
use cfpurge::{
    application::{
        cdn::{PurgeDispatcher, UrlWarmer},
        links::LinkRewriter,
        purge::{PurgeService, SavePolicy},
    },
    config::{
        CloudflareSettings, HooksSettings, LogFormat, LoggingSettings, NoCacheSettings,
        PurgeSettings, ServerSettings, Settings,
    },
    domain::{credentials::CdnCredentials, nocache::TokenPolicy},
    infra::{
        cloudflare::CloudflareClient,
        http::{AdminState, HooksState},
        warmer::HttpWarmer,
    },
};
use httpmock::MockServer;
use tracing::level_filters::LevelFilter;
use url::Url;

pub const ZONE: &str = "z1";
pub const EMAIL: &str = "ops@ex.com";
pub const KEY: &str = "global-key-1234";
pub const PURGE_PATH: &str = "/zones/z1/purge_cache";

pub fn settings(server: &MockServer) -> Settings {
    Settings {
        server: ServerSettings {
            hooks_addr: "127.0.0.1:3100".parse().expect("hooks addr"),
            admin_addr: "127.0.0.1:3101".parse().expect("admin addr"),
        },
        logging: LoggingSettings {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        },
        cloudflare: CloudflareSettings {
            api_base_url: Url::parse(&server.base_url()).expect("mock base url"),
            credentials: Some(CdnCredentials::new(ZONE, EMAIL, KEY).expect("credentials")),
            purge_method: Method::DELETE,
            timeout: Duration::from_secs(5),
            verify_tls: true,
        },
        nocache: NoCacheSettings {
            enabled: true,
            param_name: "nocache".to_string(),
            param_value: Some("tok".to_string()),
            token_policy: TokenPolicy::PerProcess,
        },
        purge: PurgeSettings {
            on_save: true,
            excluded_post_types: vec!["attachment".to_string()],
            warm_after_purge: false,
            warm_timeout: Duration::from_secs(5),
            warm_verify_tls: true,
        },
        hooks: HooksSettings::default(),
    }
}

pub fn purge_service(settings: &Settings) -> Arc<PurgeService> {
    let dispatcher: Arc<dyn PurgeDispatcher> =
        Arc::new(CloudflareClient::new(&settings.cloudflare).expect("cloudflare client"));
    let warmer: Arc<dyn UrlWarmer> =
        Arc::new(HttpWarmer::new(&settings.purge).expect("warmer"));
    Arc::new(PurgeService::new(
        dispatcher,
        warmer,
        settings.cloudflare.credentials.clone(),
        SavePolicy::from(&settings.purge),
        &settings.nocache,
    ))
}

pub fn hooks_state(settings: &Settings) -> HooksState {
    HooksState {
        purge: purge_service(settings),
        links: Arc::new(LinkRewriter::new(&settings.nocache)),
        token: settings.hooks.token.as_deref().map(Arc::from),
    }
}

pub fn admin_state(settings: Settings) -> AdminState {
    AdminState::new(purge_service(&settings), Arc::new(settings))
}

pub fn success_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": { "id": "purge-123" }
    })
}
