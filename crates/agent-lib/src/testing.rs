//! Fakes shared by the assembler, discovery, cache and refresher tests

use crate::discovery::ContainerRuntime;
use crate::error::{DiscoveryError, FetchError};
use crate::models::{Container, ContainerStatus, NetworkUsage, OpenFile, ResourceUsage};
use crate::source::{Source, Sources};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A container as the runtime lists it, before population
pub fn bare_container(pid: i32) -> Container {
    Container {
        oci_version: "1.0.2".to_string(),
        id: format!("container-{}", pid),
        pid,
        status: ContainerStatus::Running,
        bundle: format!("/run/containerd/io.containerd.runtime.v2.task/k8s.io/{}", pid),
        rootfs: String::new(),
        created: "2024-03-01T10:15:30Z".to_string(),
        annotations: HashMap::new(),
        owner: "root".to_string(),
        details: None,
    }
}

/// Source returning `value` for every pid except those marked failing
pub struct FakeSource<T> {
    value: T,
    failing: Mutex<HashSet<i32>>,
    calls: AtomicUsize,
}

impl<T: Clone + Send + Sync> FakeSource<T> {
    pub fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_for(&self, pid: i32) {
        self.failing.lock().unwrap().insert(pid);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Source<T> for FakeSource<T> {
    async fn fetch(&self, pid: i32) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&pid) {
            return Err(FetchError::read(
                format!("/proc/{}", pid),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        Ok(self.value.clone())
    }
}

/// Handles to the fakes behind a [`Sources`] bundle
pub struct FakeSources {
    pub open_files: Arc<FakeSource<Vec<OpenFile>>>,
    pub network_usage: Arc<FakeSource<NetworkUsage>>,
    pub start_command: Arc<FakeSource<String>>,
    pub resource_usage: Arc<FakeSource<ResourceUsage>>,
    pub sources: Sources,
}

impl FakeSources {
    pub fn new() -> Self {
        let open_files = FakeSource::new(vec![OpenFile {
            pid: "1".to_string(),
            command: "sh".to_string(),
            ..OpenFile::default()
        }]);
        let network_usage = FakeSource::new(NetworkUsage {
            received_bytes: 10,
            transmitted_bytes: 20,
        });
        let start_command = FakeSource::new("sleep infinity".to_string());
        let resource_usage = FakeSource::new(ResourceUsage::default());

        let sources = Sources {
            open_files: open_files.clone(),
            network_usage: network_usage.clone(),
            mounted_volumes: FakeSource::new(vec!["/".to_string()]),
            exposed_ports: FakeSource::new(vec![8080u16]),
            start_command: start_command.clone(),
            security_profiles: FakeSource::new(vec!["unconfined".to_string()]),
            env_variables: FakeSource::new(vec!["PATH=/bin".to_string()]),
            resource_usage: resource_usage.clone(),
            interfaces: FakeSource::new(BTreeMap::from([(
                "eth0".to_string(),
                "10.0.0.2".to_string(),
            )])),
        };

        Self {
            open_files,
            network_usage,
            start_command,
            resource_usage,
            sources,
        }
    }
}

/// Runtime listing a configurable set of bare containers
pub struct FakeRuntime {
    containers: Mutex<Vec<Container>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn with_pids(pids: &[i32]) -> Arc<Self> {
        Arc::new(Self {
            containers: Mutex::new(pids.iter().copied().map(bare_container).collect()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_pids(&self, pids: &[i32]) {
        *self.containers.lock().unwrap() = pids.iter().copied().map(bare_container).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list(&self) -> Result<Vec<Container>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DiscoveryError::EmptyOutput);
        }
        Ok(self.containers.lock().unwrap().clone())
    }
}
