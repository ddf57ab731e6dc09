//! Single container inspection command

use anyhow::{Context as _, Result};
use colored::Colorize;
use runclens_lib::{Container, OpenFile};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

use super::Context;
use crate::output::{
    color_status, format_bytes, format_cpu, format_kb, format_ports, format_timestamp, print_json,
    print_table, OutputFormat,
};

/// Row for the open files table
#[derive(Tabled)]
struct OpenFileRow {
    #[tabled(rename = "FD")]
    fd: String,
    #[tabled(rename = "Type")]
    file_type: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&OpenFile> for OpenFileRow {
    fn from(f: &OpenFile) -> Self {
        Self {
            fd: f.fd.clone(),
            file_type: f.file_type.clone(),
            command: f.command.clone(),
            user: f.user.clone(),
            name: f.name.clone(),
        }
    }
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    #[serde(flatten)]
    container: &'a Container,
    #[serde(skip_serializing_if = "Option::is_none")]
    interfaces: Option<&'a BTreeMap<String, String>>,
}

/// Show one container by pid
pub async fn inspect_container(
    ctx: &Context,
    pid: &str,
    with_interfaces: bool,
    format: OutputFormat,
) -> Result<()> {
    let container = ctx
        .cache
        .get(pid)
        .await
        .with_context(|| format!("failed to inspect container with pid {}", pid))?;

    let interfaces = if with_interfaces {
        let found = ctx
            .cache
            .discovery()
            .assembler()
            .network_interfaces(container.pid)
            .await
            .context("failed to list network interfaces")?;
        Some(found)
    } else {
        None
    };

    match format {
        OutputFormat::Json => print_json(&InspectOutput {
            container: &container,
            interfaces: interfaces.as_ref(),
        }),
        OutputFormat::Table => {
            print_container(&container, interfaces.as_ref());
            Ok(())
        }
    }
}

fn print_container(c: &Container, interfaces: Option<&BTreeMap<String, String>>) {
    println!("{}", "Container".bold());
    println!("{}", "=".repeat(60));
    println!("ID:          {}", c.id.cyan());
    println!("PID:         {}", c.pid);
    println!("Status:      {}", color_status(&c.status));
    println!("Created:     {}", format_timestamp(&c.created));
    println!("Bundle:      {}", c.bundle);
    println!("Owner:       {}", c.owner);

    if !c.annotations.is_empty() {
        println!();
        println!("{}", "Annotations".bold());
        println!("{}", "-".repeat(60));
        let sorted: BTreeMap<_, _> = c.annotations.iter().collect();
        for (key, value) in sorted {
            println!("{} = {}", key, value);
        }
    }

    let Some(d) = c.details.as_ref() else {
        return;
    };

    println!();
    println!("{}", "Process".bold());
    println!("{}", "-".repeat(60));
    println!("Command:     {}", d.start_command);
    println!("Ports:       {}", format_ports(&d.exposed_ports));
    println!("Security:    {}", d.security_profiles.join(", "));
    println!("CPU:         {}", format_cpu(d.resource_usage.cpu_usage));
    let memory = |kind: &str| format_kb(d.resource_usage.memory_usage.get(kind).copied().unwrap_or(0));
    println!("RSS:         {}", memory("RSS"));
    println!("VMS:         {}", memory("VMS"));
    println!("Swap:        {}", format_kb(d.resource_usage.swap_usage));

    println!();
    println!("{}", "Network".bold());
    println!("{}", "-".repeat(60));
    println!("Received:    {}", format_bytes(d.network_usage.received_bytes));
    println!("Transmitted: {}", format_bytes(d.network_usage.transmitted_bytes));
    if let Some(interfaces) = interfaces {
        for (name, address) in interfaces {
            println!("{:<12} {}", name, address);
        }
    }

    println!();
    println!("{}", "Mounts".bold());
    println!("{}", "-".repeat(60));
    for mount in &d.mounted_volumes {
        println!("{}", mount);
    }

    println!();
    println!("{}", "Environment".bold());
    println!("{}", "-".repeat(60));
    for var in &d.env_variables {
        println!("{}", var);
    }

    println!();
    println!("{}", "Open Files".bold());
    let rows: Vec<OpenFileRow> = d.open_files.iter().map(OpenFileRow::from).collect();
    print_table(rows, "No open files");
}
