//! Container population
//!
//! Runs every enrichment source for a container's pid, in a fixed order,
//! and stops at the first failure. Details are attached to the container
//! only once all sources have succeeded.

use crate::error::{AssemblyError, EnrichmentStep, FetchError};
use crate::models::{Container, ContainerDetails, ResourceLimits};
use crate::source::Sources;
use std::collections::BTreeMap;
use tracing::debug;

/// Assembles enriched container records from the configured sources
#[derive(Clone)]
pub struct Assembler {
    sources: Sources,
}

impl Assembler {
    pub fn new(sources: Sources) -> Self {
        Self { sources }
    }

    /// Populate `container` in place
    ///
    /// On error the container is left exactly as it was passed in.
    pub async fn populate(&self, container: &mut Container) -> Result<(), AssemblyError> {
        let pid = container.pid;
        let step =
            move |step: EnrichmentStep| move |source: FetchError| AssemblyError { step, pid, source };

        let open_files = self
            .sources
            .open_files
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::OpenFiles))?;

        let network_usage = self
            .sources
            .network_usage
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::NetworkUsage))?;

        let mounted_volumes = self
            .sources
            .mounted_volumes
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::MountedVolumes))?;

        let exposed_ports = self
            .sources
            .exposed_ports
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::ExposedPorts))?;

        let start_command = self
            .sources
            .start_command
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::StartCommand))?;

        let security_profiles = self
            .sources
            .security_profiles
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::SecurityProfiles))?;

        let env_variables = self
            .sources
            .env_variables
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::EnvironmentVariables))?;

        let resource_usage = self
            .sources
            .resource_usage
            .fetch(pid)
            .await
            .map_err(step(EnrichmentStep::ResourceUsage))?;

        debug!(
            container_id = %container.id,
            pid = pid,
            open_files = open_files.len(),
            exposed_ports = exposed_ports.len(),
            "Container populated"
        );

        container.details = Some(ContainerDetails {
            open_files,
            network_usage,
            mounted_volumes,
            exposed_ports,
            start_command,
            security_profiles,
            env_variables,
            resource_usage,
            resource_limits: ResourceLimits::default(),
        });

        Ok(())
    }

    /// Interface name to address inside the process's network namespace
    pub async fn network_interfaces(&self, pid: i32) -> Result<BTreeMap<String, String>, FetchError> {
        self.sources.interfaces.fetch(pid).await
    }
}
