//! Append-only audit trail of normalization actions (JSON Lines).

use super::{NormalizationAction, NormalizationRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
    pub action: NormalizationAction,
    pub from_encoding: Option<String>,
    pub to_encoding: String,
    pub backup: Option<PathBuf>,
}

impl AuditRecord {
    pub fn from_record(record: &NormalizationRecord) -> Self {
        Self {
            timestamp: Utc::now(),
            path: record.path.clone(),
            action: record.action,
            from_encoding: record.from_encoding.map(|e| e.to_string()),
            to_encoding: record.to_encoding.to_string(),
            backup: record.backup.clone(),
        }
    }
}

/// Destination for audit records. With no path, records are only traced.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record. Failures are logged, never propagated: an audit
    /// write problem must not turn a successful normalization into an error.
    pub fn append(&self, record: &AuditRecord) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Err(e) = write_line(path, record) {
            warn!("Failed to append audit record to {}: {}", path.display(), e);
        }
    }

    /// Read back every record; used by tooling and tests.
    pub fn read_all(&self) -> std::io::Result<Vec<AuditRecord>> {
        let Some(ref path) = self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })
            .collect()
    }
}

fn write_line(path: &Path, record: &AuditRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut line = serde_json::to_string(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
