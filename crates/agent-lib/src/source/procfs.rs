//! Per-process pseudo-files under /proc
//!
//! Reads and parses:
//! - net/dev for network byte counters
//! - mounts for mounted volumes
//! - attr/current for the security profile
//! - environ and cmdline
//! - stat and status for CPU time and memory

use super::Source;
use crate::error::FetchError;
use crate::models::{NetworkUsage, ResourceUsage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

/// Kernel USER_HZ, the unit of utime/stime in /proc/<pid>/stat
pub const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

/// Handle to a proc filesystem root
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of `name` under the process directory
    pub fn pid_path(&self, pid: i32, name: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(name)
    }

    pub async fn read_to_string(&self, pid: i32, name: &str) -> Result<String, FetchError> {
        let path = self.pid_path(pid, name);
        fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::read(path, e))
    }

    pub async fn read(&self, pid: i32, name: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.pid_path(pid, name);
        fs::read(&path).await.map_err(|e| FetchError::read(path, e))
    }
}

/// Network counters from /proc/<pid>/net/dev
pub struct NetworkUsageSource {
    procfs: ProcFs,
}

impl NetworkUsageSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<NetworkUsage> for NetworkUsageSource {
    async fn fetch(&self, pid: i32) -> Result<NetworkUsage, FetchError> {
        let content = self.procfs.read_to_string(pid, "net/dev").await?;
        Ok(parse_net_dev(&content))
    }
}

/// Sum received (column 2) and transmitted (column 10) bytes over all
/// interfaces. Lines with fewer than 11 fields, including the headers,
/// and lines with non-numeric counters are skipped.
pub fn parse_net_dev(content: &str) -> NetworkUsage {
    let mut usage = NetworkUsage::default();

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= 10 {
            continue;
        }

        let (Ok(received), Ok(transmitted)) = (fields[1].parse::<u64>(), fields[9].parse::<u64>())
        else {
            continue;
        };

        usage.received_bytes = usage.received_bytes.saturating_add(received);
        usage.transmitted_bytes = usage.transmitted_bytes.saturating_add(transmitted);
    }

    usage
}

/// Mount points from /proc/<pid>/mounts
pub struct MountsSource {
    procfs: ProcFs,
}

impl MountsSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<Vec<String>> for MountsSource {
    async fn fetch(&self, pid: i32) -> Result<Vec<String>, FetchError> {
        let content = self.procfs.read_to_string(pid, "mounts").await?;
        Ok(parse_mounts(&content))
    }
}

/// Collect the mount point (second space-separated field) of every line
/// with more than two fields
pub fn parse_mounts(content: &str) -> Vec<String> {
    content
        .split('\n')
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(' ').collect();
            (parts.len() > 2).then(|| parts[1].to_string())
        })
        .collect()
}

/// Security labels from /proc/<pid>/attr/current
pub struct SecurityProfileSource {
    procfs: ProcFs,
}

impl SecurityProfileSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<Vec<String>> for SecurityProfileSource {
    async fn fetch(&self, pid: i32) -> Result<Vec<String>, FetchError> {
        let content = self.procfs.read(pid, "attr/current").await?;
        Ok(parse_security_profiles(&String::from_utf8_lossy(&content)))
    }
}

/// Split on commas and trim each token
pub fn parse_security_profiles(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(|token| {
            token
                .trim_matches(|c: char| c.is_whitespace() || c == '\0')
                .to_string()
        })
        .collect()
}

/// Environment of the process from /proc/<pid>/environ
pub struct EnvironmentSource {
    procfs: ProcFs,
}

impl EnvironmentSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<Vec<String>> for EnvironmentSource {
    async fn fetch(&self, pid: i32) -> Result<Vec<String>, FetchError> {
        let content = self.procfs.read(pid, "environ").await?;
        Ok(parse_environ(&content))
    }
}

/// Split NUL-separated `KEY=VALUE` entries
pub fn parse_environ(content: &[u8]) -> Vec<String> {
    content
        .split(|b| *b == b'\0')
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).into_owned())
        .collect()
}

/// Start command from /proc/<pid>/cmdline
pub struct StartCommandSource {
    procfs: ProcFs,
}

impl StartCommandSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<String> for StartCommandSource {
    async fn fetch(&self, pid: i32) -> Result<String, FetchError> {
        let content = self.procfs.read(pid, "cmdline").await?;
        Ok(parse_cmdline(&content))
    }
}

/// Join NUL-separated arguments with spaces and trim the result
pub fn parse_cmdline(content: &[u8]) -> String {
    let args: Vec<String> = content
        .split(|b| *b == b'\0')
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();

    args.join(" ").trim().to_string()
}

/// Memory figures from /proc/<pid>/status, in kB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStatus {
    pub rss_kb: u64,
    pub vms_kb: u64,
    pub swap_kb: u64,
}

/// CPU and memory usage from /proc/<pid>/stat and /proc/<pid>/status
pub struct ResourceUsageSource {
    procfs: ProcFs,
}

impl ResourceUsageSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait]
impl Source<ResourceUsage> for ResourceUsageSource {
    async fn fetch(&self, pid: i32) -> Result<ResourceUsage, FetchError> {
        let stat = self.procfs.read_to_string(pid, "stat").await?;
        let (utime, stime) = parse_cpu_ticks(&stat).ok_or_else(|| {
            FetchError::malformed(self.procfs.pid_path(pid, "stat"), "missing utime/stime")
        })?;

        // Cumulative CPU seconds scaled to a percentage figure. Not divided by
        // elapsed time or core count.
        let cpu_usage = (utime + stime) as f64 / CLOCK_TICKS_PER_SECOND * 100.0;

        let status = self.procfs.read_to_string(pid, "status").await?;
        let memory = parse_memory_status(&status);

        let mut memory_usage = HashMap::new();
        memory_usage.insert("RSS".to_string(), memory.rss_kb);
        memory_usage.insert("VMS".to_string(), memory.vms_kb);

        Ok(ResourceUsage {
            cpu_usage,
            memory_usage,
            swap_usage: memory.swap_kb,
        })
    }
}

/// Extract (utime, stime) in clock ticks from /proc/<pid>/stat
///
/// The command name is parenthesised and may contain spaces, so fields are
/// counted from the last `)`.
pub fn parse_cpu_ticks(stat: &str) -> Option<(u64, u64)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();

    // fields[0] is state (field 3), utime is field 14, stime field 15
    let utime = fields.get(11)?.parse().ok()?;
    let stime = fields.get(12)?.parse().ok()?;
    Some((utime, stime))
}

/// Read VmRSS, VmSize and VmSwap. Absent keys (kernel threads) stay zero.
pub fn parse_memory_status(status: &str) -> MemoryStatus {
    let mut memory = MemoryStatus::default();

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };

        match key {
            "VmRSS" => memory.rss_kb = kb,
            "VmSize" => memory.vms_kb = kb,
            "VmSwap" => memory.swap_kb = kb,
            _ => {}
        }
    }

    memory
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:  250000    300    0    0    0     0          0         0    64000     200    0    0    0     0       0          0
";

    #[test]
    fn test_parse_net_dev_sums_interfaces() {
        let usage = parse_net_dev(NET_DEV);
        assert_eq!(usage.received_bytes, 251_000);
        assert_eq!(usage.transmitted_bytes, 65_000);
    }

    #[test]
    fn test_parse_net_dev_skips_short_lines() {
        let content = "\
Inter-|   Receive |  Transmit
  bad0: 999 1 2 3
  eth0: 10 0 0 0 0 0 0 0 20 0 0 0 0 0 0 0
";
        let usage = parse_net_dev(content);
        assert_eq!(usage.received_bytes, 10);
        assert_eq!(usage.transmitted_bytes, 20);
    }

    #[test]
    fn test_parse_mounts() {
        let content = "overlay / overlay rw,relatime 0 0\n\
                       proc /proc proc rw,nosuid 0 0\n\
                       broken-line\n\
                       tmpfs /dev tmpfs rw 0 0\n";

        assert_eq!(parse_mounts(content), vec!["/", "/proc", "/dev"]);
    }

    #[test]
    fn test_parse_security_profiles() {
        let profiles = parse_security_profiles("cri-containerd.apparmor.d (enforce), docker-default\n");
        assert_eq!(
            profiles,
            vec!["cri-containerd.apparmor.d (enforce)", "docker-default"]
        );

        let unconfined = parse_security_profiles("unconfined\0");
        assert_eq!(unconfined, vec!["unconfined"]);
    }

    #[test]
    fn test_parse_environ() {
        let env = parse_environ(b"PATH=/usr/bin\0HOME=/root\0\0");
        assert_eq!(env, vec!["PATH=/usr/bin", "HOME=/root"]);
        assert!(parse_environ(b"").is_empty());
    }

    #[test]
    fn test_parse_cmdline() {
        assert_eq!(
            parse_cmdline(b"/usr/sbin/nginx\0-g\0daemon off;\0"),
            "/usr/sbin/nginx -g daemon off;"
        );
        assert_eq!(parse_cmdline(b"  pause  \0"), "pause");
        assert_eq!(parse_cmdline(b""), "");
    }

    #[test]
    fn test_parse_cpu_ticks_with_spaces_in_comm() {
        let stat = "4242 (my weird) proc) S 1 4242 4242 0 -1 4194560 1200 0 0 0 250 75 0 0 20 0 1 0 100 1000000 200 18446744073709551615";
        assert_eq!(parse_cpu_ticks(stat), Some((250, 75)));
    }

    #[test]
    fn test_parse_cpu_ticks_truncated() {
        assert_eq!(parse_cpu_ticks("4242 (sh) S 1 2 3"), None);
        assert_eq!(parse_cpu_ticks("garbage"), None);
    }

    #[test]
    fn test_parse_memory_status() {
        let status = "Name:\tnginx\nVmSize:\t  10240 kB\nVmRSS:\t   2048 kB\nVmSwap:\t     16 kB\n";
        assert_eq!(
            parse_memory_status(status),
            MemoryStatus {
                rss_kb: 2048,
                vms_kb: 10240,
                swap_kb: 16,
            }
        );

        // Kernel threads have no Vm* lines
        assert_eq!(parse_memory_status("Name:\tkthreadd\n"), MemoryStatus::default());
    }
}
