//! External tool invocation

use crate::error::FetchError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs external tools and captures their stdout
///
/// A tool that cannot be started maps to [`FetchError::Spawn`], one that
/// exits non-zero maps to [`FetchError::ExitStatus`]. Successful but empty
/// output is returned as-is; callers decide whether that is an error.
#[derive(Debug, Clone, Default)]
pub struct Exec {
    use_sudo: bool,
}

impl Exec {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    /// Run `program` with `args` to completion
    pub async fn output(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, FetchError> {
        let mut command = if self.use_sudo {
            let mut command = Command::new("sudo");
            command.arg(program);
            command
        } else {
            Command::new(program)
        };

        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program, args = ?args, sudo = self.use_sudo, "Executing command");

        let output = command.output().await.map_err(|source| FetchError::Spawn {
            program: program.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(FetchError::ExitStatus {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
