//! Force refresh command

use anyhow::{Context as _, Result};

use super::{list::print_containers, Context};
use crate::output::{print_success, OutputFormat};

/// Re-discover and repopulate every container, then print them
pub async fn refresh_containers(ctx: &Context, format: OutputFormat) -> Result<()> {
    let containers = ctx
        .cache
        .refresh()
        .await
        .context("failed to refresh containers")?;

    if let OutputFormat::Table = format {
        print_success(&format!("Refreshed {} containers", containers.len()));
    }

    print_containers(&containers, format)
}
