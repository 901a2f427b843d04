use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "sitekit.config.json";

/// Server configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Platform domain tenants get subdomains under
    #[serde(default = "default_root_domain")]
    pub root_domain: String,

    /// Host used in local development (`x.localhost` works too)
    #[serde(default = "default_local_alias")]
    pub local_alias: String,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound on a domain or theme lookup
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Previously published snapshots kept per page
    #[serde(default = "default_published_history_limit")]
    pub published_history_limit: usize,

    #[serde(default = "default_preview_keep_alive_secs")]
    pub preview_keep_alive_secs: u64,

    /// JSON file with businesses and pages to load at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<PathBuf>,

    /// `tracing` filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Subdomains no business may claim
    #[serde(default = "default_reserved_subdomains")]
    pub reserved_subdomains: Vec<String>,
}

fn default_root_domain() -> String {
    "sitekit.app".to_string()
}

fn default_local_alias() -> String {
    "localhost".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3030".to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    250
}

fn default_published_history_limit() -> usize {
    10
}

fn default_preview_keep_alive_secs() -> u64 {
    15
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_reserved_subdomains() -> Vec<String> {
    ["www", "api", "app", "admin", "mail"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_domain: default_root_domain(),
            local_alias: default_local_alias(),
            bind: default_bind(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            published_history_limit: default_published_history_limit(),
            preview_keep_alive_secs: default_preview_keep_alive_secs(),
            seed_file: None,
            log_filter: default_log_filter(),
            reserved_subdomains: default_reserved_subdomains(),
        }
    }
}

impl ServerConfig {
    /// Load config from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ServerConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(ServerConfig::default())
        }
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(bind) = &args.bind {
            self.bind = bind.clone();
        }
        if let Some(root_domain) = &args.root_domain {
            self.root_domain = root_domain.clone();
        }
        if let Some(seed) = &args.seed {
            self.seed_file = Some(seed.clone());
        }
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn preview_keep_alive(&self) -> Duration {
        Duration::from_secs(self.preview_keep_alive_secs)
    }
}

/// Sitekit tenant site server
#[derive(Parser, Debug, Default)]
#[command(name = "sitekit-server")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_NAME)]
    pub config: PathBuf,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Platform root domain
    #[arg(long)]
    pub root_domain: Option<String>,

    /// Seed file to load at startup
    #[arg(long)]
    pub seed: Option<PathBuf>,
}
