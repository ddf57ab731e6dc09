//! CLI command implementations

pub mod inspect;
pub mod list;
pub mod refresh;

use crate::Cli;
use runclens_lib::{
    source::Exec, Assembler, CacheConfig, ContainerCache, Discovery, RuncConfig, RuncRuntime,
    SourceConfig, Sources,
};
use std::sync::Arc;
use std::time::Duration;

/// Library objects wired from the command-line flags
pub struct Context {
    pub cache: ContainerCache,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let sources = SourceConfig {
            proc_root: cli.proc_root.clone(),
            use_sudo: cli.sudo,
            lsof_binary: cli.lsof.clone(),
            nsenter_binary: cli.nsenter.clone(),
            ifconfig_binary: cli.ifconfig.clone(),
        };
        let runc = RuncConfig {
            binary: cli.runc.clone(),
            root: cli.root.clone(),
        };

        let runtime = Arc::new(RuncRuntime::new(Exec::new(cli.sudo), runc));
        let discovery = Discovery::new(runtime, Assembler::new(Sources::host(&sources)));

        Self {
            cache: ContainerCache::new(discovery, cache_config(cli)),
        }
    }
}

fn cache_config(cli: &Cli) -> CacheConfig {
    CacheConfig {
        list_ttl: Duration::from_secs(cli.list_ttl),
        get_ttl: Duration::from_secs(cli.get_ttl),
    }
}
