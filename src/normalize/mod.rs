//! Encoding normalization for text-bearing files.
//!
//! ## Flow
//!
//! ```text
//! read bytes ──▶ binary? ──yes──▶ skipped_binary (file untouched)
//!                  │no
//!                  ▼
//!             detect encoding ──▶ decode ──▶ repair mojibake ──▶ encode UTF-8
//!                                                                  │
//!                                        identical to input? ──yes──▶ noop
//!                                                                  │no
//!                                       write a fresh <file>.bak[.N], then atomically replace
//! ```
//!
//! Every call appends one [`audit::AuditRecord`]. A rewritten file can be
//! restored byte-for-byte with [`Normalizer::undo`].

pub mod audit;
pub mod detect;
pub mod mojibake;

pub use audit::{AuditLog, AuditRecord};
pub use detect::{detect_encoding, is_binary, EncodingLabel};
pub use mojibake::repair_mojibake;

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Options for [`Normalizer::normalize_to_canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Write a UTF-8 byte-order mark. Default: false.
    pub bom: bool,
    /// Run [`repair_mojibake`] on the decoded text. Default: true.
    pub repair_mojibake: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            bom: false,
            repair_mojibake: true,
        }
    }
}

/// What normalization did to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationAction {
    /// The file was rewritten; a backup exists.
    Normalized,
    /// The file looks binary and was left alone.
    SkippedBinary,
    /// The file was already canonical.
    Noop,
}

/// Outcome of normalizing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRecord {
    pub path: PathBuf,
    pub action: NormalizationAction,
    /// `None` when the file was skipped as binary.
    pub from_encoding: Option<EncodingLabel>,
    /// Always UTF-8 (with or without BOM).
    pub to_encoding: EncodingLabel,
    /// Backup written before the rewrite; only set for `Normalized`.
    pub backup: Option<PathBuf>,
    /// Whether mojibake repair changed the text.
    pub mojibake_repaired: bool,
}

/// Numbered fallbacks tried when `<file>.bak` already exists.
const MAX_BACKUP_SLOTS: usize = 9;

/// Preferred backup location for `path`: the same name with `.bak` appended.
/// The backup actually written is reported in [`NormalizationRecord::backup`].
pub fn backup_path(path: &Path) -> PathBuf {
    backup_slot(path, 0)
}

/// `<file>.bak` for slot 0, `<file>.bak.N` after that.
fn backup_slot(path: &Path, slot: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    if slot > 0 {
        name.push(format!(".{slot}"));
    }
    PathBuf::from(name)
}

/// Rewrites text files to canonical UTF-8 and keeps them restorable.
///
/// Only backups this normalizer wrote are ever restored: they are remembered
/// per file for the lifetime of the normalizer and, when an audit log is
/// configured, looked up there across processes. A `.bak` file that merely
/// sits next to the target is never touched.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    audit: AuditLog,
    backups: Arc<Mutex<HashMap<PathBuf, PathBuf>>>,
}

impl Normalizer {
    pub fn new(audit: AuditLog) -> Self {
        Self {
            audit,
            backups: Arc::default(),
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Normalize `path` in place to UTF-8.
    ///
    /// # Errors
    /// Returns `Err` when the file cannot be read, backed up or replaced.
    /// The original content is intact in every error case.
    pub fn normalize_to_canonical(
        &self,
        path: &Path,
        options: NormalizeOptions,
    ) -> Result<NormalizationRecord, EngineError> {
        let io_err = |source| EngineError::NormalizationIo {
            path: path.to_path_buf(),
            source,
        };
        let target_label = if options.bom {
            EncodingLabel::Utf8Bom
        } else {
            EncodingLabel::Utf8
        };

        let original = std::fs::read(path).map_err(io_err)?;

        if is_binary(&original) {
            debug!("Skipping binary file {}", path.display());
            return Ok(self.finish(NormalizationRecord {
                path: path.to_path_buf(),
                action: NormalizationAction::SkippedBinary,
                from_encoding: None,
                to_encoding: target_label,
                backup: None,
                mojibake_repaired: false,
            }));
        }

        let detected = detect_encoding(&original);
        let text = decode(&original, detected).ok_or_else(|| EngineError::Undecodable {
            path: path.to_path_buf(),
            encoding: detected.to_string(),
        })?;

        let repaired = if options.repair_mojibake {
            repair_mojibake(&text)
        } else {
            text.clone()
        };
        let mojibake_repaired = repaired != text;

        let mut canonical = Vec::with_capacity(repaired.len() + UTF8_BOM.len());
        if options.bom {
            canonical.extend_from_slice(UTF8_BOM);
        }
        canonical.extend_from_slice(repaired.as_bytes());

        if canonical == original {
            return Ok(self.finish(NormalizationRecord {
                path: path.to_path_buf(),
                action: NormalizationAction::Noop,
                from_encoding: Some(detected),
                to_encoding: target_label,
                backup: None,
                mojibake_repaired: false,
            }));
        }

        let backup = write_backup(path, &original).map_err(io_err)?;
        if let Err(e) = replace_atomically(path, &canonical) {
            let _ = std::fs::remove_file(&backup);
            return Err(io_err(e));
        }
        self.remember(path, &backup);

        info!(
            "Normalized {} from {} to {}{}",
            path.display(),
            detected,
            target_label,
            if mojibake_repaired {
                " (mojibake repaired)"
            } else {
                ""
            }
        );

        Ok(self.finish(NormalizationRecord {
            path: path.to_path_buf(),
            action: NormalizationAction::Normalized,
            from_encoding: Some(detected),
            to_encoding: target_label,
            backup: Some(backup),
            mojibake_repaired,
        }))
    }

    /// Restore `path` from the backup this normalizer wrote for it, then
    /// remove the backup.
    ///
    /// Returns `false` (and logs) when no such backup is known or the
    /// restore fails; never panics and never uses a `.bak` it did not write.
    pub fn undo(&self, path: &Path) -> bool {
        match self.recorded_backup(path) {
            Some(backup) => restore(path, &backup),
            None => {
                warn!("No normalization backup recorded for {}", path.display());
                false
            }
        }
    }

    /// Restore the file described by `record` from its backup.
    pub fn undo_record(&self, record: &NormalizationRecord) -> bool {
        let Some(ref backup) = record.backup else {
            warn!("{} was not rewritten; nothing to undo", record.path.display());
            return false;
        };
        self.forget(&record.path);
        restore(&record.path, backup)
    }

    /// Stop tracking the backup of `path`; its owner deletes it.
    pub(crate) fn forget(&self, path: &Path) {
        if let Ok(mut backups) = self.backups.lock() {
            backups.remove(path);
        }
    }

    fn remember(&self, path: &Path, backup: &Path) {
        if let Ok(mut backups) = self.backups.lock() {
            backups.insert(path.to_path_buf(), backup.to_path_buf());
        }
    }

    /// Backup written for `path` by this normalizer or, failing that, the
    /// newest one in the audit log that still exists.
    fn recorded_backup(&self, path: &Path) -> Option<PathBuf> {
        let remembered = self
            .backups
            .lock()
            .ok()
            .and_then(|mut backups| backups.remove(path));
        if let Some(backup) = remembered {
            return Some(backup);
        }

        let records = match self.audit.read_all() {
            Ok(r) => r,
            Err(e) => {
                warn!("Cannot read normalization audit log: {}", e);
                return None;
            }
        };
        records
            .into_iter()
            .rev()
            .find(|r| r.path == path && r.action == NormalizationAction::Normalized)
            .and_then(|r| r.backup)
            .filter(|b| b.is_file())
    }

    fn finish(&self, record: NormalizationRecord) -> NormalizationRecord {
        self.audit.append(&AuditRecord::from_record(&record));
        record
    }
}

/// Decode `bytes` under `label`, dropping any BOM.
fn decode(bytes: &[u8], label: EncodingLabel) -> Option<String> {
    let (text, had_errors) = label.decoder().decode_with_bom_removal(bytes);
    if had_errors && label != EncodingLabel::Windows1252 {
        return None;
    }
    Some(text.into_owned())
}

/// Write `original` to the first free backup slot. Existing files are never
/// overwritten.
fn write_backup(path: &Path, original: &[u8]) -> std::io::Result<PathBuf> {
    for slot in 0..=MAX_BACKUP_SLOTS {
        let candidate = backup_slot(path, slot);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };
        if let Err(e) = file.write_all(original).and_then(|()| file.sync_all()) {
            let _ = std::fs::remove_file(&candidate);
            return Err(e);
        }
        return Ok(candidate);
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free backup name next to {}", path.display()),
    ))
}

fn restore(path: &Path, backup: &Path) -> bool {
    if !backup.is_file() {
        warn!("Backup {} for {} is gone", backup.display(), path.display());
        return false;
    }
    match std::fs::rename(backup, path) {
        Ok(()) => {
            info!("Restored {} from {}", path.display(), backup.display());
            true
        }
        Err(e) => {
            warn!("Failed to restore {}: {}", path.display(), e);
            false
        }
    }
}

/// Write to a sibling temp file and rename over `path`.
fn replace_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
