//! Error types for discovery, population and the cache
//!
//! Adapters surface a [`FetchError`], the assembler wraps it with the
//! enrichment step that failed, and discovery wraps that again.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single source adapter
#[derive(Debug, Error)]
pub enum FetchError {
    /// The external tool could not be started at all
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran and reported failure
    #[error("{program} exited with {}: {stderr}", exit_code_display(.code))]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A pseudo-file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pseudo-file was read but a mandatory value could not be parsed
    #[error("malformed {}: {detail}", .path.display())]
    Malformed { path: PathBuf, detail: String },
}

impl FetchError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        FetchError::Malformed {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True when an external tool failed to run or exited non-zero
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, FetchError::Spawn { .. } | FetchError::ExitStatus { .. })
    }
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

/// Enrichment steps run by the assembler, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStep {
    OpenFiles,
    NetworkUsage,
    MountedVolumes,
    ExposedPorts,
    StartCommand,
    SecurityProfiles,
    EnvironmentVariables,
    ResourceUsage,
}

impl fmt::Display for EnrichmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnrichmentStep::OpenFiles => "open files",
            EnrichmentStep::NetworkUsage => "network usage",
            EnrichmentStep::MountedVolumes => "mounted volumes",
            EnrichmentStep::ExposedPorts => "exposed ports",
            EnrichmentStep::StartCommand => "start command",
            EnrichmentStep::SecurityProfiles => "security profiles",
            EnrichmentStep::EnvironmentVariables => "environment variables",
            EnrichmentStep::ResourceUsage => "resource usage",
        };
        f.write_str(s)
    }
}

/// Population of one container aborted at `step`
#[derive(Debug, Error)]
#[error("failed to get {step} for pid {pid}")]
pub struct AssemblyError {
    pub step: EnrichmentStep,
    pub pid: i32,
    #[source]
    pub source: FetchError,
}

/// Failure of a discovery pass
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("error executing runtime list command")]
    Exec(#[source] FetchError),

    #[error("runtime list output is empty")]
    EmptyOutput,

    #[error("failed to decode the runtime list output")]
    Decode(#[source] serde_json::Error),

    #[error("failed to populate container {id}")]
    Populate {
        id: String,
        #[source]
        source: AssemblyError,
    },
}

/// Failure of an on-demand cache read
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid pid format: {0:?}")]
    InvalidKey(String),

    #[error("no running container with pid {0}")]
    NotFound(i32),

    #[error("failed to populate container")]
    Populate(#[source] AssemblyError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
