//! Core data models for runclens

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Pausing,
    Paused,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Pausing => "pausing",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A container as listed by the runtime, optionally enriched with host data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "ociVersion", default)]
    pub oci_version: String,
    pub id: String,
    pub pid: i32,
    pub status: ContainerStatus,
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub rootfs: String,
    #[serde(default)]
    pub created: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner: String,
    /// Set only by a fully successful population pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ContainerDetails>,
}

impl Container {
    /// Key used by the cache: the host pid as a string
    pub fn cache_key(&self) -> String {
        self.pid.to_string()
    }

    /// Parse the runtime's creation timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn is_populated(&self) -> bool {
        self.details.is_some()
    }
}

/// Host-side data gathered for one container process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub open_files: Vec<OpenFile>,
    pub network_usage: NetworkUsage,
    pub mounted_volumes: Vec<String>,
    pub exposed_ports: Vec<u16>,
    pub start_command: String,
    pub security_profiles: Vec<String>,
    pub env_variables: Vec<String>,
    pub resource_usage: ResourceUsage,
    pub resource_limits: ResourceLimits,
}

/// One record of lsof field output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    pub command: String,
    pub pid: String,
    pub user: String,
    pub fd: String,
    pub file_type: String,
    pub device: String,
    pub size_off: String,
    pub node: String,
    pub name: String,
}

/// Byte counters summed over every interface in the process's network namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUsage {
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

/// Resource usage of the container's init process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Cumulative (user + system) CPU seconds scaled by 100, not a rate
    pub cpu_usage: f64,
    /// Memory by kind ("RSS", "VMS") in kB
    pub memory_usage: HashMap<String, u64>,
    /// Swap in kB
    pub swap_usage: u64,
}

/// Limits carried for display; nothing populates them yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_limit: f64,
    pub memory_limit_kb: u64,
    pub disk_io_limit: u64,
    pub network_limit_mbps: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
