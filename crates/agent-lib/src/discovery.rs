//! Container discovery through the runtime's list command
//!
//! Runs `runc --root <root> list --format json`, decodes the listing into
//! bare container records and optionally populates each of them.

use crate::assembler::Assembler;
use crate::error::DiscoveryError;
use crate::models::Container;
use crate::observability::LensMetrics;
use crate::source::Exec;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Lists the containers currently known to the runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list(&self) -> Result<Vec<Container>, DiscoveryError>;
}

/// Location of the runc binary and its state directory
#[derive(Debug, Clone)]
pub struct RuncConfig {
    pub binary: String,
    /// Root state directory passed as `--root`
    pub root: PathBuf,
}

impl Default for RuncConfig {
    fn default() -> Self {
        Self {
            binary: "runc".to_string(),
            root: PathBuf::from("/run/containerd/runc/k8s.io"),
        }
    }
}

/// runc-backed container listing
pub struct RuncRuntime {
    exec: Exec,
    config: RuncConfig,
}

impl RuncRuntime {
    pub fn new(exec: Exec, config: RuncConfig) -> Self {
        Self { exec, config }
    }
}

#[async_trait]
impl ContainerRuntime for RuncRuntime {
    async fn list(&self) -> Result<Vec<Container>, DiscoveryError> {
        let root = self.config.root.to_string_lossy().into_owned();
        let out = self
            .exec
            .output(
                &self.config.binary,
                &["--root", &root, "list", "--format", "json"],
            )
            .await
            .map_err(DiscoveryError::Exec)?;

        decode_listing(&out)
    }
}

/// Decode runc's JSON listing
///
/// Blank output is an error: a node always runs at least its infra
/// containers. A literal `null` is how runc prints an empty list.
pub fn decode_listing(out: &[u8]) -> Result<Vec<Container>, DiscoveryError> {
    if out.iter().all(u8::is_ascii_whitespace) {
        return Err(DiscoveryError::EmptyOutput);
    }

    let containers: Option<Vec<Container>> =
        serde_json::from_slice(out).map_err(DiscoveryError::Decode)?;

    Ok(containers.unwrap_or_default())
}

/// Discovery pass: list, then optionally populate every record
#[derive(Clone)]
pub struct Discovery {
    runtime: Arc<dyn ContainerRuntime>,
    assembler: Assembler,
    metrics: LensMetrics,
}

impl Discovery {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, assembler: Assembler) -> Self {
        Self {
            runtime,
            assembler,
            metrics: LensMetrics::new(),
        }
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    /// List containers, populating each one when `populate` is set
    ///
    /// Population is all-or-nothing across the listing: the first container
    /// that fails aborts the whole pass.
    pub async fn discover(&self, populate: bool) -> Result<Vec<Container>, DiscoveryError> {
        let start = Instant::now();
        let mut containers = self.runtime.list().await?;

        if populate {
            for container in containers.iter_mut() {
                self.assembler
                    .populate(container)
                    .await
                    .map_err(|source| DiscoveryError::Populate {
                        id: container.id.clone(),
                        source,
                    })?;
            }
        }

        let elapsed = start.elapsed();
        self.metrics.observe_discovery_latency(elapsed.as_secs_f64());
        debug!(
            count = containers.len(),
            populate = populate,
            elapsed_ms = elapsed.as_millis(),
            "Discovered containers"
        );

        Ok(containers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrichmentStep;
    use crate::testing::{FakeRuntime, FakeSources};

    #[test]
    fn test_decode_listing() {
        let out = br#"[
            {"ociVersion":"1.0.2","id":"a","pid":100,"status":"running","bundle":"/b/a","rootfs":"/b/a/rootfs","created":"2024-03-01T10:15:30Z","annotations":{},"owner":"root"},
            {"ociVersion":"1.0.2","id":"b","pid":200,"status":"paused","bundle":"/b/b","rootfs":"/b/b/rootfs","created":"2024-03-01T10:15:31Z","owner":"root"}
        ]"#;

        let containers = decode_listing(out).unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "a");
        assert_eq!(containers[1].pid, 200);
        assert!(containers.iter().all(|c| c.details.is_none()));
    }

    #[test]
    fn test_decode_listing_empty_output() {
        assert!(matches!(decode_listing(b""), Err(DiscoveryError::EmptyOutput)));
        assert!(matches!(decode_listing(b" \n"), Err(DiscoveryError::EmptyOutput)));
    }

    #[test]
    fn test_decode_listing_null_is_no_containers() {
        assert!(decode_listing(b"null\n").unwrap().is_empty());
    }

    #[test]
    fn test_decode_listing_garbage() {
        assert!(matches!(
            decode_listing(b"runc: permission denied"),
            Err(DiscoveryError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_runc_runtime_missing_binary() {
        let runtime = RuncRuntime::new(
            Exec::new(false),
            RuncConfig {
                binary: "/nonexistent/runc".to_string(),
                ..RuncConfig::default()
            },
        );

        match runtime.list().await {
            Err(DiscoveryError::Exec(e)) => assert!(e.is_execution_failure()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discover_without_population() {
        let fakes = FakeSources::new();
        let runtime = FakeRuntime::with_pids(&[100, 200]);
        let discovery = Discovery::new(runtime.clone(), Assembler::new(fakes.sources.clone()));

        let containers = discovery.discover(false).await.unwrap();

        assert_eq!(containers.len(), 2);
        assert!(containers.iter().all(|c| !c.is_populated()));
        assert_eq!(fakes.open_files.calls(), 0);
    }

    #[tokio::test]
    async fn test_discover_populates_every_container() {
        let fakes = FakeSources::new();
        let runtime = FakeRuntime::with_pids(&[100, 200]);
        let discovery = Discovery::new(runtime, Assembler::new(fakes.sources.clone()));

        let containers = discovery.discover(true).await.unwrap();

        assert!(containers.iter().all(|c| c.is_populated()));
        assert_eq!(fakes.open_files.calls(), 2);
    }

    #[tokio::test]
    async fn test_discover_aborts_when_one_container_fails() {
        let fakes = FakeSources::new();
        fakes.network_usage.fail_for(200);
        let runtime = FakeRuntime::with_pids(&[100, 200, 300]);
        let discovery = Discovery::new(runtime, Assembler::new(fakes.sources.clone()));

        let err = discovery.discover(true).await.unwrap_err();

        match err {
            DiscoveryError::Populate { id, source } => {
                assert_eq!(id, "container-200");
                assert_eq!(source.step, EnrichmentStep::NetworkUsage);
            }
            other => panic!("unexpected error: {other}"),
        }
        // pid 300 is never attempted
        assert_eq!(fakes.open_files.calls(), 2);
    }
}
