//! Network interfaces inside the container's network namespace

use super::{Exec, Source};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Runs ifconfig inside the process's network namespace through nsenter
pub struct InterfacesSource {
    exec: Exec,
    nsenter_binary: String,
    ifconfig_binary: String,
}

impl InterfacesSource {
    pub fn new(
        exec: Exec,
        nsenter_binary: impl Into<String>,
        ifconfig_binary: impl Into<String>,
    ) -> Self {
        Self {
            exec,
            nsenter_binary: nsenter_binary.into(),
            ifconfig_binary: ifconfig_binary.into(),
        }
    }
}

#[async_trait]
impl Source<BTreeMap<String, String>> for InterfacesSource {
    async fn fetch(&self, pid: i32) -> Result<BTreeMap<String, String>, FetchError> {
        let pid = pid.to_string();
        let out = self
            .exec
            .output(
                &self.nsenter_binary,
                &["-t", &pid, "-n", &self.ifconfig_binary],
            )
            .await?;

        Ok(parse_interfaces(&String::from_utf8_lossy(&out)))
    }
}

/// Map the first token to the second token of every line containing `inet `
pub fn parse_interfaces(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter(|line| line.contains("inet "))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let address = fields.next()?;
            Some((name.to_string(), address.to_string()))
        })
        .collect()
}
