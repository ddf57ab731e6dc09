//! Container listing command

use anyhow::{Context as _, Result};
use runclens_lib::Container;
use tabled::Tabled;

use super::Context;
use crate::output::{
    color_status, format_bytes, format_cpu, format_kb, format_ports, format_timestamp, print_json,
    print_table, short_id, OutputFormat,
};

/// Row for the container table
#[derive(Tabled)]
pub struct ContainerRow {
    #[tabled(rename = "PID")]
    pid: i32,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "RX")]
    received: String,
    #[tabled(rename = "TX")]
    transmitted: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "RSS")]
    rss: String,
}

impl From<&Container> for ContainerRow {
    fn from(c: &Container) -> Self {
        let dash = || "-".to_string();
        let details = c.details.as_ref();

        Self {
            pid: c.pid,
            id: short_id(&c.id).to_string(),
            status: color_status(&c.status),
            created: format_timestamp(&c.created),
            ports: details.map_or_else(dash, |d| format_ports(&d.exposed_ports)),
            received: details.map_or_else(dash, |d| format_bytes(d.network_usage.received_bytes)),
            transmitted: details
                .map_or_else(dash, |d| format_bytes(d.network_usage.transmitted_bytes)),
            cpu: details.map_or_else(dash, |d| format_cpu(d.resource_usage.cpu_usage)),
            rss: details.map_or_else(dash, |d| {
                format_kb(d.resource_usage.memory_usage.get("RSS").copied().unwrap_or(0))
            }),
        }
    }
}

/// Print containers in the requested format
pub fn print_containers(containers: &[Container], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(containers),
        OutputFormat::Table => {
            let rows: Vec<ContainerRow> = containers.iter().map(ContainerRow::from).collect();
            print_table(rows, "No containers found");
            Ok(())
        }
    }
}

/// List containers, populated unless `bare` is set
pub async fn list_containers(ctx: &Context, bare: bool, format: OutputFormat) -> Result<()> {
    let containers = if bare {
        ctx.cache
            .discovery()
            .discover(false)
            .await
            .context("failed to list containers")?
    } else {
        ctx.cache.list().await.context("failed to list containers")?
    };

    print_containers(&containers, format)
}
