//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use axum::http::Method;
use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::{
    credentials::CdnCredentials,
    nocache::{self, TokenPolicy},
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cfpurge";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_HOOKS_PORT: u16 = 3100;
const DEFAULT_ADMIN_PORT: u16 = 3101;
const DEFAULT_CLOUDFLARE_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_PURGE_METHOD: &str = "DELETE";
const DEFAULT_CLOUDFLARE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WARM_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the cfpurge binary.
#[derive(Debug, Parser)]
#[command(name = "cfpurge", version, about = "Cloudflare cache-purge bridge")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CFPURGE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the hooks and admin HTTP listeners.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the hooks listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the hooks listener port.
    #[arg(long = "server-hooks-port", value_name = "PORT")]
    pub hooks_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the Cloudflare API base URL.
    #[arg(long = "cloudflare-api-base-url", value_name = "URL")]
    pub cloudflare_api_base_url: Option<String>,

    /// Override the Cloudflare zone identifier.
    #[arg(long = "cloudflare-zone-id", value_name = "ZONE")]
    pub cloudflare_zone_id: Option<String>,

    /// Toggle TLS certificate verification for Cloudflare API calls.
    #[arg(
        long = "cloudflare-verify-tls",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cloudflare_verify_tls: Option<bool>,

    /// Toggle the cache-busting parameter for logged-in visitors.
    #[arg(
        long = "nocache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub nocache_enabled: Option<bool>,

    /// Toggle purging when content is saved.
    #[arg(
        long = "purge-on-save",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub purge_on_save: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cloudflare: CloudflareSettings,
    pub nocache: NoCacheSettings,
    pub purge: PurgeSettings,
    pub hooks: HooksSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub hooks_addr: SocketAddr,
    pub admin_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CloudflareSettings {
    pub api_base_url: Url,
    /// `None` unless zone, email and key are all configured.
    pub credentials: Option<CdnCredentials>,
    pub purge_method: Method,
    pub timeout: Duration,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct NoCacheSettings {
    pub enabled: bool,
    pub param_name: String,
    /// Fixed token; a process token is generated when unset.
    pub param_value: Option<String>,
    pub token_policy: TokenPolicy,
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub on_save: bool,
    pub excluded_post_types: Vec<String>,
    pub warm_after_purge: bool,
    pub warm_timeout: Duration,
    pub warm_verify_tls: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HooksSettings {
    pub token: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("CFPURGE")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("purge.excluded_post_types"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cloudflare: RawCloudflareSettings,
    nocache: RawNoCacheSettings,
    purge: RawPurgeSettings,
    hooks: RawHooksSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.hooks_port {
            self.server.hooks_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.cloudflare_api_base_url.as_ref() {
            self.cloudflare.api_base_url = Some(url.clone());
        }
        if let Some(zone) = overrides.cloudflare_zone_id.as_ref() {
            self.cloudflare.zone_id = Some(zone.clone());
        }
        if let Some(verify) = overrides.cloudflare_verify_tls {
            self.cloudflare.verify_tls = Some(verify);
        }
        if let Some(enabled) = overrides.nocache_enabled {
            self.nocache.enabled = Some(enabled);
        }
        if let Some(on_save) = overrides.purge_on_save {
            self.purge.on_save = Some(on_save);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cloudflare,
            nocache,
            purge,
            hooks,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cloudflare: build_cloudflare_settings(cloudflare)?,
            nocache: build_nocache_settings(nocache)?,
            purge: build_purge_settings(purge)?,
            hooks: build_hooks_settings(hooks),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let hooks_port = server.hooks_port.unwrap_or(DEFAULT_HOOKS_PORT);
    if hooks_port == 0 {
        return Err(LoadError::invalid(
            "server.hooks_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let hooks_addr = parse_socket_addr(&host, hooks_port)
        .map_err(|reason| LoadError::invalid("server.hooks_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    Ok(ServerSettings {
        hooks_addr,
        admin_addr,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cloudflare_settings(
    cloudflare: RawCloudflareSettings,
) -> Result<CloudflareSettings, LoadError> {
    let base = cloudflare
        .api_base_url
        .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_BASE_URL.to_string());
    let api_base_url = Url::parse(base.trim())
        .map_err(|err| LoadError::invalid("cloudflare.api_base_url", err.to_string()))?;
    if !matches!(api_base_url.scheme(), "http" | "https") || api_base_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "cloudflare.api_base_url",
            "must be an absolute http(s) URL",
        ));
    }

    let credentials = match (
        non_blank(cloudflare.zone_id),
        non_blank(cloudflare.email),
        non_blank(cloudflare.api_key),
    ) {
        (Some(zone), Some(email), Some(key)) => Some(
            CdnCredentials::new(zone, email, key)
                .map_err(|err| LoadError::invalid("cloudflare", err.to_string()))?,
        ),
        _ => None,
    };

    let method_name = cloudflare
        .purge_method
        .unwrap_or_else(|| DEFAULT_PURGE_METHOD.to_string())
        .trim()
        .to_ascii_uppercase();
    let purge_method = match method_name.as_str() {
        "DELETE" => Method::DELETE,
        "POST" => Method::POST,
        other => {
            return Err(LoadError::invalid(
                "cloudflare.purge_method",
                format!("`{other}` is not supported; use DELETE or POST"),
            ));
        }
    };

    let timeout_secs = cloudflare
        .timeout_seconds
        .unwrap_or(DEFAULT_CLOUDFLARE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "cloudflare.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CloudflareSettings {
        api_base_url,
        credentials,
        purge_method,
        timeout: Duration::from_secs(timeout_secs),
        verify_tls: cloudflare.verify_tls.unwrap_or(true),
    })
}

fn build_nocache_settings(nocache: RawNoCacheSettings) -> Result<NoCacheSettings, LoadError> {
    let param_name = nocache
        .param_name
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| nocache::DEFAULT_PARAM_NAME.to_string());
    nocache::validate_param_name(&param_name)
        .map_err(|err| LoadError::invalid("nocache.param_name", err.to_string()))?;

    let token_policy = match nocache.token_policy.as_deref().map(str::trim) {
        None | Some("process") => TokenPolicy::PerProcess,
        Some("render") => TokenPolicy::PerRender,
        Some(other) => {
            return Err(LoadError::invalid(
                "nocache.token_policy",
                format!("`{other}` is not one of process, render"),
            ));
        }
    };

    Ok(NoCacheSettings {
        enabled: nocache.enabled.unwrap_or(false),
        param_name,
        param_value: non_blank(nocache.param_value),
        token_policy,
    })
}

fn build_purge_settings(purge: RawPurgeSettings) -> Result<PurgeSettings, LoadError> {
    let warm_timeout_secs = purge
        .warm_timeout_seconds
        .unwrap_or(DEFAULT_WARM_TIMEOUT_SECS);
    if warm_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "purge.warm_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let excluded_post_types = purge
        .excluded_post_types
        .unwrap_or_default()
        .into_iter()
        .filter_map(|name| non_blank(Some(name)))
        .collect();

    Ok(PurgeSettings {
        on_save: purge.on_save.unwrap_or(true),
        excluded_post_types,
        warm_after_purge: purge.warm_after_purge.unwrap_or(true),
        warm_timeout: Duration::from_secs(warm_timeout_secs),
        warm_verify_tls: purge.warm_verify_tls.unwrap_or(true),
    })
}

fn build_hooks_settings(hooks: RawHooksSettings) -> HooksSettings {
    HooksSettings {
        token: non_blank(hooks.token),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    hooks_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCloudflareSettings {
    api_base_url: Option<String>,
    zone_id: Option<String>,
    email: Option<String>,
    api_key: Option<String>,
    purge_method: Option<String>,
    timeout_seconds: Option<u64>,
    verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNoCacheSettings {
    enabled: Option<bool>,
    param_name: Option<String>,
    param_value: Option<String>,
    token_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPurgeSettings {
    on_save: Option<bool>,
    excluded_post_types: Option<Vec<String>>,
    warm_after_purge: Option<bool>,
    warm_timeout_seconds: Option<u64>,
    warm_verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHooksSettings {
    token: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
