//! Single-request execution.
//!
//! ```text
//! Init ─▶ verify input ─▶ route ─▶ [normalize?] convert step 1 ─▶ … ─▶ step n ─▶ Done
//!              │             │                        │
//!              └─ Validation └─ CapabilityMissing     └─ StepFailed{step}
//! ```
//!
//! A direct capability is always preferred; the resolver is only asked when
//! none is registered. The pipeline aborts at the first failing step and
//! never retries.

use super::cleanup::Intermediates;
use crate::config::EngineConfig;
use crate::error::FailureKind;
use crate::format::FormatId;
use crate::integrity::IntegrityChecker;
use crate::normalize::{NormalizationAction, Normalizer};
use crate::output::{ConversionLog, ConversionOutcome, StepResult};
use crate::path::{find_conversion_path, ConversionPath};
use crate::registry::{CapabilityOutcome, CapabilityRegistry};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Borrowed view of everything one request needs.
pub(crate) struct Executor<'a> {
    pub registry: &'a CapabilityRegistry,
    pub config: &'a EngineConfig,
    pub normalizer: &'a Normalizer,
    pub checker: &'a IntegrityChecker,
}

impl Executor<'_> {
    pub fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        source: &FormatId,
        target: &FormatId,
    ) -> ConversionOutcome {
        let start = Instant::now();
        info!(
            "Converting {} ({}) → {} ({})",
            input.display(),
            source,
            output.display(),
            target
        );
        let mut log = ConversionLog::default();
        log.note(format!(
            "request: {} ({source}) → {} ({target})",
            input.display(),
            output.display()
        ));

        if self.config.verify_input {
            let report = self.checker.pre_conversion_check(input, source, target);
            for w in &report.warnings {
                log.note(format!("warning: {w}"));
            }
            if let Some(failure) = report.failure {
                log.note(format!("input rejected: {failure}"));
                return ConversionOutcome::failed(
                    log,
                    FailureKind::Validation {
                        code: failure.code().to_string(),
                    },
                    None,
                );
            }
        }

        if source == target {
            return self.copy_identity(input, output, source, log);
        }

        let path = if self.registry.contains(source, target) {
            debug!("Direct capability for {source} → {target}");
            ConversionPath::from_formats(vec![source.clone(), target.clone()])
        } else {
            find_conversion_path(self.registry, source, target, self.config.max_hops)
        };
        let Some(path) = path else {
            log.note(format!(
                "no capability route from {source} to {target} within {} hops",
                self.config.max_hops
            ));
            return ConversionOutcome::failed(log, FailureKind::CapabilityMissing, None);
        };
        log.note(format!("route: {path}"));

        let outcome = self.run_steps(input, output, path, log);
        info!(
            "Conversion {} in {} ms",
            if outcome.success { "succeeded" } else { "failed" },
            start.elapsed().as_millis()
        );
        outcome
    }

    fn copy_identity(
        &self,
        input: &Path,
        output: &Path,
        format: &FormatId,
        mut log: ConversionLog,
    ) -> ConversionOutcome {
        let start = Instant::now();
        let result = if same_file(input, output) {
            debug!("Identity conversion onto itself: {}", input.display());
            Ok(None)
        } else {
            std::fs::copy(input, output).map(Some)
        };
        let step = StepResult {
            index: 1,
            source: format.clone(),
            target: format.clone(),
            capability: Some("identity".into()),
            success: result.is_ok(),
            message: match &result {
                Ok(Some(n)) => format!("copied {n} bytes"),
                Ok(None) => "copied 0 bytes (same file)".to_string(),
                Err(e) => format!("copy failed: {e}"),
            },
            artifact: output.to_path_buf(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        log.step(step);
        let path = ConversionPath::identity(format.clone());
        if result.is_ok() {
            ConversionOutcome::succeeded(log, path)
        } else {
            ConversionOutcome::failed(log, FailureKind::StepFailed { step: 1 }, Some(path))
        }
    }

    fn run_steps(
        &self,
        input: &Path,
        output: &Path,
        path: ConversionPath,
        mut log: ConversionLog,
    ) -> ConversionOutcome {
        // Dropped on every exit from this function.
        let mut scratch = Intermediates::new(self.config.temp_dir.as_deref());
        let mut current = input.to_path_buf();
        let steps: Vec<(FormatId, FormatId)> = path
            .steps()
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        let last = steps.len() - 1;

        for (i, (from, to)) in steps.iter().enumerate() {
            let index = i + 1;

            if i > 0 && self.config.verify_intermediates {
                let report = self.checker.pre_conversion_check(&current, from, to);
                if let Some(failure) = report.failure {
                    log.note(format!(
                        "intermediate {} from step {i} rejected: {failure}",
                        current.display()
                    ));
                    return ConversionOutcome::failed(
                        log,
                        FailureKind::StepFailed { step: i },
                        Some(path),
                    );
                }
            }

            if self.config.normalize_text && from.is_text_bearing() {
                current = self.normalize_step_input(current, i == 0, from, &mut scratch, &mut log);
            }

            let artifact = if i == last {
                output.to_path_buf()
            } else {
                match scratch.create(to) {
                    Ok(p) => p,
                    Err(e) => {
                        log.note(format!("cannot create intermediate for step {index}: {e}"));
                        return ConversionOutcome::failed(
                            log,
                            FailureKind::StepFailed { step: index },
                            Some(path),
                        );
                    }
                }
            };

            let step = self.invoke(index, from, to, &current, &artifact);
            let ok = step.success;
            log.step(step);
            if !ok {
                warn!("Step {index} ({from} → {to}) failed; aborting");
                return ConversionOutcome::failed(
                    log,
                    FailureKind::StepFailed { step: index },
                    Some(path),
                );
            }
            current = artifact;
        }

        ConversionOutcome::succeeded(log, path)
    }

    /// Normalize the input of a text-bearing step. Returns the path the step
    /// should read from. Failures are logged and never abort.
    fn normalize_step_input(
        &self,
        current: PathBuf,
        first_step: bool,
        format: &FormatId,
        scratch: &mut Intermediates,
        log: &mut ConversionLog,
    ) -> PathBuf {
        let caller_owned = first_step && !self.config.normalize_in_place;
        let target = if caller_owned {
            let copy = scratch
                .create(format)
                .and_then(|p| std::fs::copy(&current, &p).map(|_| p));
            match copy {
                Ok(p) => p,
                Err(e) => {
                    warn!("Cannot copy {} for normalization: {}", current.display(), e);
                    log.note(format!("normalization skipped: {e}"));
                    return current;
                }
            }
        } else {
            current.clone()
        };

        match self
            .normalizer
            .normalize_to_canonical(&target, self.config.normalization)
        {
            Ok(record) => {
                if record.action == NormalizationAction::Normalized {
                    log.note(format!(
                        "normalized step input from {} to {}",
                        record
                            .from_encoding
                            .map(|e| e.to_string())
                            .unwrap_or_default(),
                        record.to_encoding
                    ));
                }
                // A backup of the caller's own file stays for `undo`.
                if let Some(backup) = record.backup {
                    if !(first_step && self.config.normalize_in_place) {
                        self.normalizer.forget(&target);
                        scratch.track(backup);
                    }
                }
                target
            }
            Err(e) => {
                warn!("Normalization failed, continuing with original: {}", e);
                log.note(format!("normalization failed: {e}"));
                if caller_owned {
                    current
                } else {
                    target
                }
            }
        }
    }

    fn invoke(
        &self,
        index: usize,
        from: &FormatId,
        to: &FormatId,
        input: &Path,
        artifact: &Path,
    ) -> StepResult {
        let start = Instant::now();
        let (capability, outcome) = match self.registry.lookup(from, to) {
            Some(cap) => {
                debug!("Step {index}: {} ({from} → {to})", cap.name());
                let outcome = cap.convert(input, artifact);
                (Some(cap.name().to_string()), outcome)
            }
            None => (
                None,
                CapabilityOutcome::failed(format!("no capability registered for {from} → {to}")),
            ),
        };

        let (success, message) = if outcome.success && !produced(artifact) {
            (
                false,
                "capability reported success but wrote no output".to_string(),
            )
        } else {
            (outcome.success, outcome.message)
        };

        StepResult {
            index,
            source: from.clone(),
            target: to.clone(),
            capability,
            success,
            message,
            artifact: artifact.to_path_buf(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// `true` when both paths resolve to the same existing file. Copying a file
/// onto itself would truncate it before it is read.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// A step produced output if its artifact exists and is non-empty.
fn produced(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
