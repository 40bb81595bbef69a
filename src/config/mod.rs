//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::i18n::LocaleSet;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "kami";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 2323;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:2333/api/v2";
const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LOCALES: [&str; 3] = ["zh", "en", "ja"];
const DEFAULT_LOCALE: &str = "zh";
const DEFAULT_MESSAGES_DIR: &str = "messages";
const DEFAULT_EXCLUDED_PREFIXES: [&str; 3] = ["/api", "/_next", "/static"];

/// Command-line arguments for the kami binary.
#[derive(Debug, Parser)]
#[command(name = "kami", version, about = "Locale-aware edge for an mx-space blog")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "KAMI_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP edge.
    Serve(Box<ServeArgs>),
    /// Fetch the bootstrap aggregate once and report whether content is reachable.
    Probe(ProbeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ApiOverrides {
    /// Override the content API base URL.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the content API request timeout.
    #[arg(long = "api-timeout-ms", value_name = "MILLISECONDS")]
    pub api_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub api: ApiOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the default locale.
    #[arg(long = "default-locale", value_name = "LOCALE")]
    pub default_locale: Option<String>,

    /// Override the directory holding `{locale}.json` message bundles.
    #[arg(long = "messages-dir", value_name = "PATH")]
    pub messages_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub api: ApiOverrides,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub i18n: I18nSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct ApiSettings {
    /// Always ends with `/` so relative endpoint paths join beneath it.
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct I18nSettings {
    pub locales: Arc<LocaleSet>,
    pub messages_dir: PathBuf,
    pub excluded_prefixes: Vec<String>,
    /// Mark the locale cookie `Secure` even when TLS is not detected.
    pub force_secure_cookie: bool,
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
        Environment::with_prefix("KAMI")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("i18n.locales")
            .with_list_parse_key("i18n.excluded_prefixes")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Probe(args)) => raw.apply_api_overrides(&args.api),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    api: RawApiSettings,
    i18n: RawI18nSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(locale) = overrides.default_locale.as_ref() {
            self.i18n.default_locale = Some(locale.clone());
        }
        if let Some(dir) = overrides.messages_dir.as_ref() {
            self.i18n.messages_dir = Some(dir.clone());
        }

        self.apply_api_overrides(&overrides.api);
    }

    fn apply_api_overrides(&mut self, overrides: &ApiOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.api_timeout_ms {
            self.api.timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            api,
            i18n,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let api = build_api_settings(api)?;
        let i18n = build_i18n_settings(i18n)?;

        Ok(Self {
            server,
            logging,
            api,
            i18n,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let trimmed = raw_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let base_url = Url::parse(&with_slash)
        .map_err(|err| LoadError::invalid("api.base_url", format!("failed to parse: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            "scheme must be http or https",
        ));
    }

    let token = api.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_ms = api.timeout_ms.unwrap_or(DEFAULT_API_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "api.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        token,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_i18n_settings(i18n: RawI18nSettings) -> Result<I18nSettings, LoadError> {
    let locales = i18n
        .locales
        .unwrap_or_else(|| DEFAULT_LOCALES.iter().map(|l| l.to_string()).collect());
    let default_locale = i18n
        .default_locale
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
    let locales = LocaleSet::new(locales, default_locale.trim())
        .map_err(|err| LoadError::invalid("i18n.locales", err.to_string()))?;

    let messages_dir = i18n
        .messages_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MESSAGES_DIR));
    if messages_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "i18n.messages_dir",
            "path must not be empty",
        ));
    }

    let excluded_prefixes = i18n.excluded_prefixes.unwrap_or_else(|| {
        DEFAULT_EXCLUDED_PREFIXES
            .iter()
            .map(|p| p.to_string())
            .collect()
    });
    if let Some(bad) = excluded_prefixes.iter().find(|p| !p.starts_with('/')) {
        return Err(LoadError::invalid(
            "i18n.excluded_prefixes",
            format!("`{bad}` must start with `/`"),
        ));
    }

    Ok(I18nSettings {
        locales: Arc::new(locales),
        messages_dir,
        excluded_prefixes,
        force_secure_cookie: i18n.force_secure_cookie.unwrap_or(false),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    token: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawI18nSettings {
    locales: Option<Vec<String>>,
    default_locale: Option<String>,
    messages_dir: Option<PathBuf>,
    excluded_prefixes: Option<Vec<String>>,
    force_secure_cookie: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
