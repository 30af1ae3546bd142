use super::{AuditEvent, AuditSink};
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Audit sink writing one JSON object per line to a file.
pub struct JsonlAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open (or create) the log file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create audit directory")?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every event in the log, oldest first.
    pub fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let content = fs::read_to_string(&self.path).context("Failed to read audit log")?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Failed to parse audit line"))
            .collect()
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_string(event).context("Failed to serialize audit event")?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|e| anyhow::anyhow!("Audit log lock poisoned: {}", e))?;
        file.write_all(line.as_bytes())
            .context("Failed to write audit event")?;
        file.flush().context("Failed to flush audit log")
    }
}
