//! Settings for the edge server.
//!
//! Sources, lowest priority first: built-in defaults, the TOML file
//! (`config/ledgerdash.toml` unless `--config` says otherwise),
//! `LEDGERDASH__<SECTION>__<KEY>` environment variables,
//! `LEDGERDASH_FEATURE_<NAME>` flag overrides, then CLI flags.
//!
//! See `config/ledgerdash.toml` for the configuration.
use std::collections::BTreeMap;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config/ledgerdash.toml";
const FEATURE_ENV_PREFIX: &str = "LEDGERDASH_FEATURE_";

/// Flags known to the dashboard and their values when nothing overrides them.
const DEFAULT_FEATURES: &[(&str, bool)] = &[
    ("ai_insights", false),
    ("bills", true),
    ("budgets", true),
    ("goals", true),
    ("notifications", true),
    ("open_banking", false),
    ("reports", true),
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Backend {
    pub base_url: String,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Site {
    pub url: String,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Analytics {
    pub google_id: Option<String>,
    pub posthog_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub backend: Backend,
    pub site: Site,
    pub analytics: Analytics,
    /// Values from the file and `LEDGERDASH__FEATURES__*` until
    /// [`Settings::resolve_features`] merges defaults and flag overrides in.
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Parser)]
#[command(name = "ledgerdash", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override bind address.
    #[arg(long)]
    bind: Option<String>,
    /// Override listening port.
    #[arg(long)]
    port: Option<u16>,
    /// Override backend base URL (e.g. http://localhost:4000/api/v1).
    #[arg(long)]
    backend_url: Option<String>,
    /// Override log level.
    #[arg(long)]
    level: Option<String>,
}

pub fn load() -> Result<Settings, SettingsError> {
    let args = Args::parse();

    let mut settings = from_sources(args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH))?;

    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(base_url) = args.backend_url {
        settings.backend.base_url = base_url;
    }
    if let Some(level) = args.level {
        settings.app.level = level;
    }

    Ok(settings)
}

fn from_sources(config_path: &str) -> Result<Settings, SettingsError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(config_path).required(false))
        .add_source(
            config::Environment::with_prefix("LEDGERDASH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Defaults, then `configured`, then one `LEDGERDASH_FEATURE_<NAME>` lookup
/// per known flag. Unparsable overrides are ignored.
pub fn resolve_features<F>(configured: &BTreeMap<String, bool>, lookup: F) -> BTreeMap<String, bool>
where
    F: Fn(&str) -> Option<String>,
{
    let mut features: BTreeMap<String, bool> = DEFAULT_FEATURES
        .iter()
        .map(|(name, enabled)| (name.to_string(), *enabled))
        .collect();
    features.extend(configured.iter().map(|(name, enabled)| (name.clone(), *enabled)));

    for (name, enabled) in features.iter_mut() {
        let var = format!("{FEATURE_ENV_PREFIX}{}", name.to_uppercase());
        let Some(raw) = lookup(&var) else {
            continue;
        };
        match parse_flag(&raw) {
            Some(value) => *enabled = value,
            None => tracing::warn!("ignoring {var}={raw:?}: expected a boolean"),
        }
    }

    features
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Settings {
    /// Applies defaults and `LEDGERDASH_FEATURE_<NAME>` overrides from the
    /// process environment.
    pub fn resolve_features(&mut self) {
        self.features = resolve_features(&self.features, |name| std::env::var(name).ok());
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn server_config(&self) -> server::ServerConfig {
        server::ServerConfig {
            backend_base_url: self.backend.base_url.clone(),
            public: server::PublicConfig {
                site_url: self.site.url.clone(),
                features: self.features.clone(),
                analytics: server::AnalyticsIds {
                    google_id: self.analytics.google_id.clone(),
                    posthog_key: self.analytics.posthog_key.clone(),
                },
            },
        }
    }
}
