//! Host data sources for container population
//!
//! Each adapter reads one external mechanism for a single process id:
//! an external tool (lsof, nsenter) or a file under the proc filesystem.
//! Adapters do not depend on each other and are combined by the
//! [`Assembler`](crate::assembler::Assembler) through [`Sources`].

mod exec;
mod interfaces;
mod lsof;
mod ports;
mod procfs;

#[cfg(test)]
mod tests;

pub use exec::Exec;
pub use interfaces::{parse_interfaces, InterfacesSource};
pub use lsof::{parse_lsof_output, OpenFilesSource};
pub use ports::{parse_listen_sockets, parse_socket_inode, ListenPortsSource};
pub use procfs::{
    parse_cmdline, parse_cpu_ticks, parse_environ, parse_memory_status, parse_mounts,
    parse_net_dev, parse_security_profiles, EnvironmentSource, MemoryStatus, MountsSource,
    NetworkUsageSource, ProcFs, ResourceUsageSource, SecurityProfileSource, StartCommandSource,
    CLOCK_TICKS_PER_SECOND,
};

use crate::error::FetchError;
use crate::models::{NetworkUsage, OpenFile, ResourceUsage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A single host data source queried by process id
#[async_trait]
pub trait Source<T: Send>: Send + Sync {
    async fn fetch(&self, pid: i32) -> Result<T, FetchError>;
}

/// Configuration shared by the host sources
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Root of the proc filesystem (default: /proc)
    pub proc_root: PathBuf,
    /// Prefix external tools with sudo
    pub use_sudo: bool,
    pub lsof_binary: String,
    pub nsenter_binary: String,
    pub ifconfig_binary: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            use_sudo: false,
            lsof_binary: "lsof".to_string(),
            nsenter_binary: "nsenter".to_string(),
            ifconfig_binary: "ifconfig".to_string(),
        }
    }
}

/// The set of adapters run during population
#[derive(Clone)]
pub struct Sources {
    pub open_files: Arc<dyn Source<Vec<OpenFile>>>,
    pub network_usage: Arc<dyn Source<NetworkUsage>>,
    pub mounted_volumes: Arc<dyn Source<Vec<String>>>,
    pub exposed_ports: Arc<dyn Source<Vec<u16>>>,
    pub start_command: Arc<dyn Source<String>>,
    pub security_profiles: Arc<dyn Source<Vec<String>>>,
    pub env_variables: Arc<dyn Source<Vec<String>>>,
    pub resource_usage: Arc<dyn Source<ResourceUsage>>,
    /// Not part of population; queried on demand
    pub interfaces: Arc<dyn Source<BTreeMap<String, String>>>,
}

impl Sources {
    /// Build the adapters that read the local host
    pub fn host(config: &SourceConfig) -> Self {
        let exec = Exec::new(config.use_sudo);
        let procfs = ProcFs::new(&config.proc_root);

        Self {
            open_files: Arc::new(OpenFilesSource::new(exec.clone(), &config.lsof_binary)),
            network_usage: Arc::new(NetworkUsageSource::new(procfs.clone())),
            mounted_volumes: Arc::new(MountsSource::new(procfs.clone())),
            exposed_ports: Arc::new(ListenPortsSource::new(procfs.clone())),
            start_command: Arc::new(StartCommandSource::new(procfs.clone())),
            security_profiles: Arc::new(SecurityProfileSource::new(procfs.clone())),
            env_variables: Arc::new(EnvironmentSource::new(procfs.clone())),
            resource_usage: Arc::new(ResourceUsageSource::new(procfs)),
            interfaces: Arc::new(InterfacesSource::new(
                exec,
                &config.nsenter_binary,
                &config.ifconfig_binary,
            )),
        }
    }
}
