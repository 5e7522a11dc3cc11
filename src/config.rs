//! Engine configuration.
//!
//! All orchestration behaviour is controlled through [`EngineConfig`], built
//! via its [`EngineConfigBuilder`]. Setters clamp obvious out-of-range values;
//! [`EngineConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::EngineError;
use crate::normalize::NormalizeOptions;
use crate::path::DEFAULT_MAX_HOPS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;

/// Configuration for a [`crate::ConversionEngine`].
///
/// # Example
/// ```rust
/// use edgequake_convert::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .max_file_size(20 * 1024 * 1024)
///     .verify_intermediates(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_hops, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Integrity ceiling in bytes. Default: 100 MiB.
    pub max_file_size: u64,

    /// Files above this size pass with a "large file" warning. Default: 10 MiB.
    pub large_file_warning: u64,

    /// Maximum capability hops when no direct capability exists. Range 1–3. Default: 3.
    pub max_hops: usize,

    /// Run the integrity checker on the input before any conversion. Default: true.
    pub verify_input: bool,

    /// Also run it on every intermediate artifact. Default: false.
    pub verify_intermediates: bool,

    /// Normalize text-bearing inputs to UTF-8 before each step. Default: true.
    pub normalize_text: bool,

    /// Normalize the caller's input file directly instead of a working copy.
    /// Default: false.
    ///
    /// With `false` the first step's text input is copied into an
    /// intermediate first, so the caller's file is never rewritten and no
    /// `.bak` is left next to it.
    pub normalize_in_place: bool,

    /// Options passed to the normalizer.
    pub normalization: NormalizeOptions,

    /// JSON Lines file receiving one record per normalization action. Default: None.
    pub audit_log: Option<PathBuf>,

    /// Directory for intermediate artifacts. Default: None (system temp dir).
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * MIB,
            large_file_warning: 10 * MIB,
            max_hops: DEFAULT_MAX_HOPS,
            verify_input: true,
            verify_intermediates: false,
            normalize_text: true,
            normalize_in_place: false,
            normalization: NormalizeOptions::default(),
            audit_log: None,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn large_file_warning(mut self, bytes: u64) -> Self {
        self.config.large_file_warning = bytes;
        self
    }

    pub fn max_hops(mut self, hops: usize) -> Self {
        self.config.max_hops = hops.clamp(1, DEFAULT_MAX_HOPS);
        self
    }

    pub fn verify_input(mut self, v: bool) -> Self {
        self.config.verify_input = v;
        self
    }

    pub fn verify_intermediates(mut self, v: bool) -> Self {
        self.config.verify_intermediates = v;
        self
    }

    pub fn normalize_text(mut self, v: bool) -> Self {
        self.config.normalize_text = v;
        self
    }

    pub fn normalize_in_place(mut self, v: bool) -> Self {
        self.config.normalize_in_place = v;
        self
    }

    pub fn normalization(mut self, options: NormalizeOptions) -> Self {
        self.config.normalization = options;
        self
    }

    pub fn audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.audit_log = Some(path.into());
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(EngineError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        if c.large_file_warning > c.max_file_size {
            return Err(EngineError::InvalidConfig(format!(
                "large_file_warning ({}) exceeds max_file_size ({})",
                c.large_file_warning, c.max_file_size
            )));
        }
        if !(1..=DEFAULT_MAX_HOPS).contains(&c.max_hops) {
            return Err(EngineError::InvalidConfig(format!(
                "max_hops must be 1–{DEFAULT_MAX_HOPS}, got {}",
                c.max_hops
            )));
        }
        if let Some(dir) = &c.temp_dir {
            if !dir.is_dir() {
                return Err(EngineError::InvalidConfig(format!(
                    "temp_dir '{}' is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}
