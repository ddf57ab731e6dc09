//! Agent configuration

use anyhow::{bail, Context, Result};
use runclens_lib::{CacheConfig, RefresherConfig, RuncConfig, SourceConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `RUNCLENS_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_runc_binary")]
    pub runc_binary: String,

    /// runc state directory passed as `--root`
    #[serde(default = "default_runc_root")]
    pub runc_root: PathBuf,

    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// Prefix external tools with sudo
    #[serde(default)]
    pub use_sudo: bool,

    #[serde(default = "default_lsof_binary")]
    pub lsof_binary: String,

    #[serde(default = "default_nsenter_binary")]
    pub nsenter_binary: String,

    #[serde(default = "default_ifconfig_binary")]
    pub ifconfig_binary: String,

    /// Freshness window for listing, in seconds
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,

    /// Freshness window for single lookups, in seconds
    #[serde(default = "default_get_ttl")]
    pub get_ttl_secs: u64,

    /// Background refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// API server port for containers/health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_runc_binary() -> String {
    RuncConfig::default().binary
}

fn default_runc_root() -> PathBuf {
    RuncConfig::default().root
}

fn default_proc_root() -> PathBuf {
    SourceConfig::default().proc_root
}

fn default_lsof_binary() -> String {
    SourceConfig::default().lsof_binary
}

fn default_nsenter_binary() -> String {
    SourceConfig::default().nsenter_binary
}

fn default_ifconfig_binary() -> String {
    SourceConfig::default().ifconfig_binary
}

fn default_list_ttl() -> u64 {
    CacheConfig::default().list_ttl.as_secs()
}

fn default_get_ttl() -> u64 {
    CacheConfig::default().get_ttl.as_secs()
}

fn default_refresh_interval() -> u64 {
    RefresherConfig::default().interval.as_secs()
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            runc_binary: default_runc_binary(),
            runc_root: default_runc_root(),
            proc_root: default_proc_root(),
            use_sudo: false,
            lsof_binary: default_lsof_binary(),
            nsenter_binary: default_nsenter_binary(),
            ifconfig_binary: default_ifconfig_binary(),
            list_ttl_secs: default_list_ttl(),
            get_ttl_secs: default_get_ttl(),
            refresh_interval_secs: default_refresh_interval(),
            api_port: default_api_port(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RUNCLENS").try_parsing(true))
            .build()
            .context("failed to read RUNCLENS_* environment")?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already built configuration
    pub fn from_config(config: config::Config) -> Result<Self> {
        let agent: AgentConfig = config
            .try_deserialize()
            .context("invalid RUNCLENS_* configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("RUNCLENS_REFRESH_INTERVAL_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn runc(&self) -> RuncConfig {
        RuncConfig {
            binary: self.runc_binary.clone(),
            root: self.runc_root.clone(),
        }
    }

    pub fn sources(&self) -> SourceConfig {
        SourceConfig {
            proc_root: self.proc_root.clone(),
            use_sudo: self.use_sudo,
            lsof_binary: self.lsof_binary.clone(),
            nsenter_binary: self.nsenter_binary.clone(),
            ifconfig_binary: self.ifconfig_binary.clone(),
        }
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            list_ttl: Duration::from_secs(self.list_ttl_secs),
            get_ttl: Duration::from_secs(self.get_ttl_secs),
        }
    }

    pub fn refresher(&self) -> RefresherConfig {
        RefresherConfig {
            interval: Duration::from_secs(self.refresh_interval_secs),
        }
    }

    /// Cache age after which `/healthz` reports the agent as stale
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1) * 3)
            .max(Duration::from_secs(self.list_ttl_secs))
    }
}
