//! Listening TCP ports of a process
//!
//! The socket tables in /proc/<pid>/net/{tcp,tcp6} cover the whole network
//! namespace. Entries are matched against the socket inodes found among the
//! process's own file descriptors so that only its sockets are reported.

use super::{ProcFs, Source};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use tokio::fs;

/// TCP_LISTEN in the kernel socket table
const TCP_LISTEN: u8 = 0x0A;

const SOCKET_TABLES: &[&str] = &["net/tcp", "net/tcp6"];

/// Lists TCP ports the process is listening on
pub struct ListenPortsSource {
    procfs: ProcFs,
}

impl ListenPortsSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }

    /// Inodes of every socket held open by the process
    async fn socket_inodes(&self, pid: i32) -> Result<HashSet<u64>, FetchError> {
        let fd_dir = self.procfs.pid_path(pid, "fd");
        let mut entries = fs::read_dir(&fd_dir)
            .await
            .map_err(|e| FetchError::read(&fd_dir, e))?;

        let mut inodes = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::read(&fd_dir, e))?
        {
            // The descriptor may be closed between listing and readlink
            let Ok(target) = fs::read_link(entry.path()).await else {
                continue;
            };
            if let Some(inode) = parse_socket_inode(&target.to_string_lossy()) {
                inodes.insert(inode);
            }
        }

        Ok(inodes)
    }
}

#[async_trait]
impl Source<Vec<u16>> for ListenPortsSource {
    async fn fetch(&self, pid: i32) -> Result<Vec<u16>, FetchError> {
        let inodes = self.socket_inodes(pid).await?;
        let mut ports = Vec::new();

        for table in SOCKET_TABLES {
            let content = match self.procfs.read_to_string(pid, table).await {
                Ok(content) => content,
                // tcp6 is absent when IPv6 is disabled
                Err(FetchError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    continue
                }
                Err(e) => return Err(e),
            };

            ports.extend(
                parse_listen_sockets(&content)
                    .into_iter()
                    .filter(|(inode, _)| inodes.contains(inode))
                    .map(|(_, port)| port),
            );
        }

        Ok(ports)
    }
}

/// Parse `socket:[12345]` link targets
pub fn parse_socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Return (inode, local port) for every listening entry of a socket table
///
/// Columns: sl, local_address, rem_address, st, tx:rx, tr:when, retrnsmt,
/// uid, timeout, inode. The header line and malformed lines are skipped.
pub fn parse_listen_sockets(content: &str) -> Vec<(u64, u16)> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local_address = fields.get(1)?;
            let state = u8::from_str_radix(fields.get(3)?, 16).ok()?;
            if state != TCP_LISTEN {
                return None;
            }

            let (_, port) = local_address.rsplit_once(':')?;
            let port = u16::from_str_radix(port, 16).ok()?;
            let inode = fields.get(9)?.parse().ok()?;
            Some((inode, port))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31337 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31338 1 0000000000000000 100 0 0 10 0
   2: 0A000005:C350 0A000001:0050 01 00000000:00000000 00:00000000 00000000     0        0 31339 1 0000000000000000 20 4 30 10 -1
";

    #[test]
    fn test_parse_listen_sockets() {
        let sockets = parse_listen_sockets(TCP);
        assert_eq!(sockets, vec![(31337, 80), (31338, 8080)]);
    }

    #[test]
    fn test_parse_listen_sockets_tcp6() {
        let tcp6 = "\
  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:1BB8 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 4242 1 0000000000000000 100 0 0 10 0
";
        assert_eq!(parse_listen_sockets(tcp6), vec![(4242, 7096)]);
    }

    #[test]
    fn test_parse_listen_sockets_skips_garbage() {
        let content = "header\nnot a socket line\n   0: zz:zz 00:00 0A\n";
        assert!(parse_listen_sockets(content).is_empty());
    }

    #[test]
    fn test_parse_socket_inode() {
        assert_eq!(parse_socket_inode("socket:[31337]"), Some(31337));
        assert_eq!(parse_socket_inode("pipe:[31337]"), None);
        assert_eq!(parse_socket_inode("/dev/null"), None);
        assert_eq!(parse_socket_inode("socket:[abc]"), None);
    }
}
