//! The orchestration facade.
//!
//! [`ConversionEngine`] owns a read-only capability registry, the
//! configuration, a normalizer and an integrity checker, and exposes every
//! boundary operation as a method. Nothing here holds per-request state, so
//! one engine can serve concurrent requests from several threads.

use crate::capabilities;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::format::FormatId;
use crate::integrity::{IntegrityChecker, IntegrityReport};
use crate::normalize::{AuditLog, NormalizationRecord, Normalizer};
use crate::output::{ConversionOutcome, ConversionRequest, ConversionResult};
use crate::path::{self, ConversionPath};
use crate::pipeline::{batch, executor::Executor};
use crate::pricing::{self, ConversionOptions, CostBreakdown, QualityTier};
use crate::progress::ProgressSink;
use crate::registry::CapabilityRegistry;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

pub struct ConversionEngine {
    registry: CapabilityRegistry,
    config: EngineConfig,
    normalizer: Normalizer,
    checker: IntegrityChecker,
}

impl std::fmt::Debug for ConversionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionEngine")
            .field("capabilities", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionEngine {
    /// Engine over an already-populated registry.
    pub fn new(registry: CapabilityRegistry, config: EngineConfig) -> Self {
        let normalizer = Normalizer::new(AuditLog::new(config.audit_log.clone()));
        let checker = IntegrityChecker::from_config(&config);
        Self {
            registry,
            config,
            normalizer,
            checker,
        }
    }

    /// Engine with only the built-in capabilities registered.
    pub fn with_builtin(config: EngineConfig) -> Result<Self, EngineError> {
        let mut registry = CapabilityRegistry::new();
        capabilities::register_builtin(&mut registry)?;
        Ok(Self::new(registry, config))
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            registry: &self.registry,
            config: &self.config,
            normalizer: &self.normalizer,
            checker: &self.checker,
        }
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Convert `input` (declared `source`) into `output` (`target`).
    ///
    /// Never returns `Err`: every failure is reported in the outcome with
    /// its [`crate::FailureKind`] and the aggregated log.
    pub fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        source: &FormatId,
        target: &FormatId,
    ) -> ConversionOutcome {
        self.executor().convert_file(input, output, source, target)
    }

    /// Run [`convert_file`](Self::convert_file) on the blocking thread pool.
    ///
    /// # Errors
    /// Only if the blocking task panicked or was aborted.
    pub async fn convert_file_async(
        self: Arc<Self>,
        input: PathBuf,
        output: PathBuf,
        source: FormatId,
        target: FormatId,
    ) -> Result<ConversionOutcome, EngineError> {
        tokio::task::spawn_blocking(move || self.convert_file(&input, &output, &source, &target))
            .await
            .map_err(|e| EngineError::Internal(format!("conversion task failed: {e}")))
    }

    /// Process `requests` strictly in order.
    pub fn convert_batch(
        &self,
        requests: &[ConversionRequest],
        sink: &dyn ProgressSink,
    ) -> Vec<ConversionResult> {
        batch::run_batch(&self.executor(), requests, sink, None)
    }

    /// Like [`convert_batch`](Self::convert_batch), but stops starting new
    /// requests once `cancel` is set. Unstarted requests are reported as
    /// cancelled.
    pub fn convert_batch_until(
        &self,
        requests: &[ConversionRequest],
        sink: &dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Vec<ConversionResult> {
        batch::run_batch(&self.executor(), requests, sink, Some(cancel))
    }

    // ── Planning ─────────────────────────────────────────────────────────

    /// Route `source → target` over the registered capabilities.
    pub fn find_conversion_path(
        &self,
        source: &FormatId,
        target: &FormatId,
    ) -> Option<ConversionPath> {
        path::find_conversion_path(&self.registry, source, target, self.config.max_hops)
    }

    /// Price a conversion. Pure; nothing is executed.
    pub fn conversion_cost(
        &self,
        source: &FormatId,
        target: &FormatId,
        size_bytes: u64,
        quality: QualityTier,
    ) -> (u32, CostBreakdown) {
        pricing::calculate_credits(source, target, size_bytes, quality)
    }

    /// Direct and optimized offers, each flagged with whether the current
    /// registry can execute it.
    pub fn analyze_conversion_options(
        &self,
        source: &FormatId,
        target: &FormatId,
    ) -> ConversionOptions {
        let mut options = pricing::analyze_conversion_options(source, target);
        options.direct.executable = self.executable(&options.direct.steps);
        if let Some(opt) = options.optimized.as_mut() {
            opt.executable = self.executable(&opt.steps);
        }
        debug!(
            "Options {source} → {target}: direct executable={}, recommendation={}",
            options.direct.executable, options.recommendation.strategy
        );
        options
    }

    fn executable(&self, steps: &[FormatId]) -> bool {
        match steps {
            [] => false,
            [_] => true,
            _ => steps
                .windows(2)
                .all(|w| self.registry.contains(&w[0], &w[1])),
        }
    }

    // ── Verification & normalization ─────────────────────────────────────

    pub fn pre_conversion_check(
        &self,
        path: &Path,
        source: &FormatId,
        target: &FormatId,
    ) -> IntegrityReport {
        self.checker.pre_conversion_check(path, source, target)
    }

    /// Normalize `path` to UTF-8 in place. `bom` overrides the configured
    /// byte-order-mark choice.
    pub fn normalize_to_canonical(
        &self,
        path: &Path,
        bom: Option<bool>,
    ) -> Result<NormalizationRecord, EngineError> {
        let mut options = self.config.normalization;
        if let Some(bom) = bom {
            options.bom = bom;
        }
        self.normalizer.normalize_to_canonical(path, options)
    }

    /// Restore `path` from its normalization backup. `false` when there was
    /// nothing to restore.
    pub fn undo_normalization(&self, path: &Path) -> bool {
        self.normalizer.undo(path)
    }
}
