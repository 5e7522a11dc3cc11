//! Pre-conversion integrity verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! ```text
//! exists ─▶ non-empty ─▶ size ≤ ceiling ─▶ readable (head + tail)
//!        ─▶ format structure ─▶ full content ─▶ encoding safety (text only)
//! ```
//!
//! A file that passes every check gets SHA-256 and MD5 digests in its
//! report. Warnings and recommendations are advisory and never block.

pub mod checksum;
pub mod rules;

pub use checksum::Checksums;

use crate::config::EngineConfig;
use crate::error::IntegrityFailure;
use crate::format::FormatId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How many bytes the readability check fetches from each end of the file.
const PROBE_LEN: u64 = 1024;

/// Per-dimension verdicts. A dimension that was never reached is `false`;
/// `encoding_safe` is `true` for formats it does not apply to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityChecks {
    pub exists: bool,
    pub non_empty: bool,
    pub within_size_limit: bool,
    pub readable: bool,
    pub format_valid: bool,
    pub integrity: bool,
    pub encoding_safe: bool,
}

/// Result of [`IntegrityChecker::pre_conversion_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub path: PathBuf,
    pub source_format: FormatId,
    pub target_format: FormatId,
    pub size_bytes: Option<u64>,
    pub checks: IntegrityChecks,
    pub failure: Option<IntegrityFailure>,
    pub checksums: Option<Checksums>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl IntegrityReport {
    fn new(path: &Path, source: &FormatId, target: &FormatId) -> Self {
        Self {
            path: path.to_path_buf(),
            source_format: source.clone(),
            target_format: target.clone(),
            size_bytes: None,
            checks: IntegrityChecks::default(),
            failure: None,
            checksums: None,
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Human-readable reason: `"ok"` or the failure description.
    pub fn reason(&self) -> String {
        match &self.failure {
            None => "ok".to_string(),
            Some(f) => f.to_string(),
        }
    }

    /// `(ok, reason)` pair.
    pub fn verdict(&self) -> (bool, String) {
        (self.ok(), self.reason())
    }

    fn fail(mut self, failure: IntegrityFailure) -> Self {
        debug!(
            "Integrity check failed for {}: {} ({})",
            self.path.display(),
            failure,
            failure.code()
        );
        self.failure = Some(failure);
        self
    }
}

/// Validates files against format-specific expectations.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    max_file_size: u64,
    large_file_warning: u64,
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl IntegrityChecker {
    pub fn new(max_file_size: u64, large_file_warning: u64) -> Self {
        Self {
            max_file_size,
            large_file_warning,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_file_size, config.large_file_warning)
    }

    /// Run every check on `path`, declared as `source`, destined for `target`.
    pub fn pre_conversion_check(
        &self,
        path: &Path,
        source: &FormatId,
        target: &FormatId,
    ) -> IntegrityReport {
        let mut report = IntegrityReport::new(path, source, target);

        // 1. exists
        let meta = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => {
                return report.fail(IntegrityFailure::NotFound {
                    path: path.to_path_buf(),
                })
            }
        };
        report.checks.exists = true;

        // 2. non-empty
        let size = meta.len();
        report.size_bytes = Some(size);
        if size == 0 {
            return report.fail(IntegrityFailure::Empty);
        }
        report.checks.non_empty = true;

        // 3. size ceiling
        if size > self.max_file_size {
            return report.fail(IntegrityFailure::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        report.checks.within_size_limit = true;
        if size > self.large_file_warning {
            report.warnings.push(format!(
                "file is large ({:.1} MiB), expect slower conversion",
                size as f64 / (1024.0 * 1024.0)
            ));
            report
                .recommendations
                .push("consider splitting or compressing the file first".into());
        }

        // 4. readable: header and tail both fetchable
        let (header, tail) = match read_probes(path, size) {
            Ok(probes) => probes,
            Err(e) => {
                return report.fail(IntegrityFailure::Unreadable {
                    detail: e.to_string(),
                })
            }
        };
        report.checks.readable = true;

        // 5. format structure
        match rules::check_structure(path, source, &header, &tail) {
            Ok(w) => report.warnings.extend(w),
            Err(f) => return report.fail(f),
        }
        report.checks.format_valid = true;

        // 6. full content
        match rules::check_content(path, source, &tail, size) {
            Ok(w) => report.warnings.extend(w),
            Err(f) => return report.fail(f),
        }
        report.checks.integrity = true;

        // 7. encoding safety (text formats only)
        if source.is_text_bearing() {
            match rules::check_encoding(path) {
                Ok(verdict) => {
                    report.warnings.extend(verdict.warnings);
                    report.recommendations.extend(verdict.recommendations);
                }
                Err(f) => return report.fail(f),
            }
        }
        report.checks.encoding_safe = true;

        if source.is_raster_image() && target.is_text_bearing() {
            report
                .recommendations
                .push("text extraction from images depends on resolution and contrast".into());
        }

        match checksum::compute(path) {
            Ok(sums) => report.checksums = Some(sums),
            Err(e) => {
                return report.fail(IntegrityFailure::Unreadable {
                    detail: format!("checksum pass failed: {e}"),
                })
            }
        }

        report
    }
}

/// Fetch the first and last `PROBE_LEN` bytes.
fn read_probes(path: &Path, size: u64) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
    let mut file = File::open(path)?;
    let probe = size.min(PROBE_LEN);

    let mut header = vec![0u8; probe as usize];
    file.read_exact(&mut header)?;

    let mut tail = vec![0u8; probe as usize];
    file.seek(SeekFrom::Start(size - probe))?;
    file.read_exact(&mut tail)?;

    Ok((header, tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fmt(s: &str) -> FormatId {
        FormatId::parse(s).unwrap()
    }

    fn checker() -> IntegrityChecker {
        IntegrityChecker::new(1024, 512)
    }

    #[test]
    fn missing_file() {
        let dir = TempDir::new().unwrap();
        let report =
            checker().pre_conversion_check(&dir.path().join("x.csv"), &fmt("csv"), &fmt("json"));
        assert!(!report.ok());
        assert_eq!(report.failure.as_ref().unwrap().code(), "not_found");
        assert!(!report.checks.exists);
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let report = checker().pre_conversion_check(dir.path(), &fmt("csv"), &fmt("json"));
        assert_eq!(report.failure.unwrap().code(), "not_found");
    }

    #[test]
    fn empty_file() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("e.csv");
        std::fs::write(&p, b"").unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("csv"), &fmt("json"));
        assert_eq!(report.failure.unwrap().code(), "empty");
        assert!(report.checks.exists);
        assert!(!report.checks.non_empty);
    }

    #[test]
    fn too_large_short_circuits() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("big.json");
        // Invalid JSON, but the size check must fire first.
        std::fs::write(&p, vec![b'x'; 2048]).unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("json"), &fmt("csv"));
        assert_eq!(report.failure.unwrap().code(), "too_large");
        assert!(!report.checks.readable);
    }

    #[test]
    fn large_file_warns_but_passes() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("mid.txt");
        std::fs::write(&p, vec![b'a'; 700]).unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("txt"), &fmt("html"));
        assert!(report.ok(), "{:?}", report.failure);
        assert!(report.warnings.iter().any(|w| w.contains("large")));
    }

    #[test]
    fn passing_file_has_checksums() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("d.json");
        std::fs::write(&p, br#"{"k": 1}"#).unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("json"), &fmt("csv"));
        assert_eq!(report.verdict(), (true, "ok".to_string()));
        let sums = report.checksums.unwrap();
        assert_eq!(sums.sha256.len(), 64);
        assert_eq!(sums.md5.len(), 32);
        assert!(report.checks.encoding_safe);
    }

    #[test]
    fn invalid_json_fails_structure() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("d.json");
        std::fs::write(&p, br#"{"k": "#).unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("json"), &fmt("csv"));
        assert_eq!(report.failure.unwrap().code(), "invalid_structure");
        assert!(report.checks.readable);
        assert!(!report.checks.format_valid);
        assert!(report.checksums.is_none());
    }

    #[test]
    fn pdf_without_trailer_fails() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("t.pdf");
        std::fs::write(&p, b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n").unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("pdf"), &fmt("txt"));
        assert_eq!(report.failure.unwrap().code(), "invalid_structure");
    }

    #[test]
    fn minimal_pdf_passes() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("ok.pdf");
        std::fs::write(
            &p,
            b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\nxref\n0 1\ntrailer\n<<>>\nstartxref\n32\n%%EOF\n",
        )
        .unwrap();
        let report = checker().pre_conversion_check(&p, &fmt("pdf"), &fmt("txt"));
        assert!(report.ok(), "{:?}", report.failure);
        // Not text-bearing: encoding check does not apply.
        assert!(report.checks.encoding_safe);
    }

    #[test]
    fn truncated_png_fails_full_decode() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("img.png");
        let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8 * 8, y as u8 * 8, 0]));
        img.save(&p).unwrap();

        let full = std::fs::read(&p).unwrap();
        let report = IntegrityChecker::new(1 << 20, 1 << 19).pre_conversion_check(
            &p,
            &fmt("png"),
            &fmt("jpg"),
        );
        assert!(report.ok(), "{:?}", report.failure);

        std::fs::write(&p, &full[..full.len() * 2 / 3]).unwrap();
        let report = IntegrityChecker::new(1 << 20, 1 << 19).pre_conversion_check(
            &p,
            &fmt("png"),
            &fmt("jpg"),
        );
        assert_eq!(report.failure.unwrap().code(), "corrupted");
    }
}
