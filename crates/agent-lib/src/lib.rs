//! Container inspection library for runc-managed workloads
//!
//! This crate provides the core functionality for:
//! - Discovering containers through the runtime's JSON listing
//! - Enriching each container from procfs, lsof and namespace tools
//! - A TTL-gated cache with a periodic background refresher
//! - Prometheus metrics and structured logging

pub mod assembler;
pub mod cache;
pub mod discovery;
pub mod error;
pub mod models;
pub mod observability;
pub mod refresher;
pub mod source;

#[cfg(test)]
mod testing;

pub use assembler::Assembler;
pub use cache::{CacheConfig, ContainerCache};
pub use discovery::{ContainerRuntime, Discovery, RuncConfig, RuncRuntime};
pub use error::{AssemblyError, CacheError, DiscoveryError, EnrichmentStep, FetchError};
pub use models::*;
pub use observability::{LensMetrics, StructuredLogger};
pub use refresher::{Refresher, RefresherConfig, RefresherHandle, MIN_REFRESH_INTERVAL};
pub use source::{Source, SourceConfig, Sources};
