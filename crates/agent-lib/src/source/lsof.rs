//! Open files via lsof field output
//!
//! `lsof -F -n -p <pid>` prints one field per line. The first character is
//! the field tag and the rest is the value:
//! - `p` pid (starts a new record)
//! - `c` command, `u` user, `f` fd, `t` type
//! - `D` device, `s` size/offset, `i` inode, `n` name

use super::{Exec, Source};
use crate::error::FetchError;
use crate::models::OpenFile;
use async_trait::async_trait;

/// Lists open files of a process through lsof
pub struct OpenFilesSource {
    exec: Exec,
    lsof_binary: String,
}

impl OpenFilesSource {
    pub fn new(exec: Exec, lsof_binary: impl Into<String>) -> Self {
        Self {
            exec,
            lsof_binary: lsof_binary.into(),
        }
    }
}

#[async_trait]
impl Source<Vec<OpenFile>> for OpenFilesSource {
    async fn fetch(&self, pid: i32) -> Result<Vec<OpenFile>, FetchError> {
        let pid = pid.to_string();
        let out = self
            .exec
            .output(&self.lsof_binary, &["-F", "-n", "-p", &pid])
            .await?;

        Ok(parse_lsof_output(&String::from_utf8_lossy(&out)))
    }
}

/// Parse lsof field output into records
///
/// Lines shorter than a tag plus one character of value, and unknown tags,
/// are skipped. The record in progress is flushed when the next `p` line
/// arrives and again at end of input.
pub fn parse_lsof_output(output: &str) -> Vec<OpenFile> {
    let mut entries = Vec::new();
    let mut entry = OpenFile::default();

    for line in output.lines() {
        let mut chars = line.chars();
        let Some(tag) = chars.next() else {
            continue;
        };
        let value = chars.as_str();
        if value.is_empty() {
            continue;
        }

        match tag {
            'p' => {
                if !entry.pid.is_empty() {
                    entries.push(std::mem::take(&mut entry));
                }
                entry.pid = value.to_string();
            }
            'c' => entry.command = value.to_string(),
            'u' => entry.user = value.to_string(),
            'f' => entry.fd = value.to_string(),
            't' => entry.file_type = value.to_string(),
            'D' => entry.device = value.to_string(),
            's' => entry.size_off = value.to_string(),
            'i' => entry.node = value.to_string(),
            'n' => entry.name = value.to_string(),
            _ => {}
        }
    }

    if !entry.pid.is_empty() {
        entries.push(entry);
    }

    entries
}
