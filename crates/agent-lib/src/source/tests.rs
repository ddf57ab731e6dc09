//! Integration tests for the procfs sources
//!
//! These tests build a fake proc filesystem in a temp directory so the
//! adapters can be exercised without a container runtime.

#[cfg(test)]
mod mock_procfs_tests {
    use crate::error::FetchError;
    use crate::source::{SourceConfig, Sources};
    use std::os::unix::fs::symlink;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::fs;

    const PID: i32 = 4242;

    /// Helper to create a fake /proc/<pid> tree
    async fn create_mock_proc(temp_dir: &TempDir) -> PathBuf {
        let proc_root = temp_dir.path().to_path_buf();
        let pid_dir = proc_root.join(PID.to_string());

        fs::create_dir_all(pid_dir.join("net")).await.unwrap();
        fs::create_dir_all(pid_dir.join("attr")).await.unwrap();
        fs::create_dir_all(pid_dir.join("fd")).await.unwrap();

        let net_dev = r#"Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:     500       5    0    0    0     0          0         0      500       5    0    0    0     0       0          0
  eth0:    8000      40    0    0    0     0          0         0     3000      30    0    0    0     0       0          0
"#;
        fs::write(pid_dir.join("net/dev"), net_dev).await.unwrap();

        let tcp = r#"  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1001 1 0000000000000000 100 0 0 10 0
   1: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 9999 1 0000000000000000 100 0 0 10 0
"#;
        fs::write(pid_dir.join("net/tcp"), tcp).await.unwrap();

        let mounts = "overlay / overlay rw,relatime 0 0\nproc /proc proc rw 0 0\n";
        fs::write(pid_dir.join("mounts"), mounts).await.unwrap();

        fs::write(pid_dir.join("attr/current"), "cri-containerd.apparmor.d (enforce)\n")
            .await
            .unwrap();
        fs::write(pid_dir.join("environ"), b"PATH=/usr/bin\0HOSTNAME=web-0\0")
            .await
            .unwrap();
        fs::write(pid_dir.join("cmdline"), b"nginx\0-g\0daemon off;\0")
            .await
            .unwrap();

        let stat = "4242 (nginx) S 1 4242 4242 0 -1 4194560 900 0 0 0 150 50 0 0 20 0 1 0 500 8000000 300";
        fs::write(pid_dir.join("stat"), stat).await.unwrap();

        let status = "Name:\tnginx\nVmSize:\t   8192 kB\nVmRSS:\t   1024 kB\nVmSwap:\t      4 kB\n";
        fs::write(pid_dir.join("status"), status).await.unwrap();

        // fd 3 is the listening socket on :80, fd 4 a pipe. The :8080 socket
        // belongs to another process in the same namespace.
        symlink("socket:[1001]", pid_dir.join("fd/3")).unwrap();
        symlink("pipe:[2002]", pid_dir.join("fd/4")).unwrap();

        proc_root
    }

    fn sources_for(proc_root: &Path) -> Sources {
        Sources::host(&SourceConfig {
            proc_root: proc_root.to_path_buf(),
            ..SourceConfig::default()
        })
    }

    #[tokio::test]
    async fn test_procfs_sources_read_mock_tree() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_proc(&temp_dir).await;
        let sources = sources_for(&proc_root);

        let usage = sources.network_usage.fetch(PID).await.unwrap();
        assert_eq!(usage.received_bytes, 8500);
        assert_eq!(usage.transmitted_bytes, 3500);

        let volumes = sources.mounted_volumes.fetch(PID).await.unwrap();
        assert_eq!(volumes, vec!["/", "/proc"]);

        let profiles = sources.security_profiles.fetch(PID).await.unwrap();
        assert_eq!(profiles, vec!["cri-containerd.apparmor.d (enforce)"]);

        let env = sources.env_variables.fetch(PID).await.unwrap();
        assert_eq!(env, vec!["PATH=/usr/bin", "HOSTNAME=web-0"]);

        let command = sources.start_command.fetch(PID).await.unwrap();
        assert_eq!(command, "nginx -g daemon off;");
    }

    #[tokio::test]
    async fn test_exposed_ports_only_for_owned_sockets() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_proc(&temp_dir).await;
        let sources = sources_for(&proc_root);

        // net/tcp6 is missing in the mock tree, which must not be an error
        let ports = sources.exposed_ports.fetch(PID).await.unwrap();
        assert_eq!(ports, vec![80]);
    }

    #[tokio::test]
    async fn test_resource_usage_from_stat_and_status() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_proc(&temp_dir).await;
        let sources = sources_for(&proc_root);

        let usage = sources.resource_usage.fetch(PID).await.unwrap();
        // (150 + 50) ticks = 2 CPU seconds, scaled by 100
        assert!((usage.cpu_usage - 200.0).abs() < f64::EPSILON);
        assert_eq!(usage.memory_usage.get("RSS"), Some(&1024));
        assert_eq!(usage.memory_usage.get("VMS"), Some(&8192));
        assert_eq!(usage.swap_usage, 4);
    }

    #[tokio::test]
    async fn test_malformed_stat_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_proc(&temp_dir).await;
        fs::write(proc_root.join("4242/stat"), "4242 (nginx) S")
            .await
            .unwrap();

        let sources = sources_for(&proc_root);
        let err = sources.resource_usage.fetch(PID).await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_exited_process_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let proc_root = create_mock_proc(&temp_dir).await;
        let sources = sources_for(&proc_root);

        let err = sources.network_usage.fetch(9999).await.unwrap_err();
        assert!(matches!(err, FetchError::Read { .. }));
        assert!(!err.is_execution_failure());

        let err = sources.exposed_ports.fetch(9999).await.unwrap_err();
        assert!(matches!(err, FetchError::Read { .. }));
    }

    #[tokio::test]
    async fn test_missing_lsof_binary_is_execution_failure() {
        let temp_dir = TempDir::new().unwrap();
        let sources = Sources::host(&SourceConfig {
            proc_root: temp_dir.path().to_path_buf(),
            lsof_binary: "/nonexistent/lsof".to_string(),
            ..SourceConfig::default()
        });

        let err = sources.open_files.fetch(PID).await.unwrap_err();
        assert!(err.is_execution_failure());
    }
}
