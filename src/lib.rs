//! # edgequake-convert
//!
//! Orchestrate file conversions between heterogeneous formats.
//!
//! The crate does not know how to convert any particular format by itself
//! (beyond a few text and tabular built-ins). Instead it wires opaque
//! *capabilities* into multi-step routes, protects them with integrity
//! checks and encoding normalization, and prices them with a credit model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request (input, output, source, target)
//!  │
//!  ├─ 1. Verify    existence, size, structure, full read, encoding
//!  ├─ 2. Route     direct capability, else bounded BFS (≤ 3 hops)
//!  ├─ 3. Normalize text-bearing step inputs → UTF-8 (non-fatal)
//!  ├─ 4. Convert   one capability call per hop, temp intermediates
//!  └─ 5. Cleanup   intermediates deleted on every exit path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{ConversionEngine, EngineConfig, FormatId};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ConversionEngine::with_builtin(EngineConfig::default())?;
//!     let outcome = engine.convert_file(
//!         Path::new("data.tsv"),
//!         Path::new("data.json"),
//!         &FormatId::parse("tsv")?,
//!         &FormatId::parse("json")?,
//!     );
//!     println!("{}", outcome.log);
//!     Ok(())
//! }
//! ```
//!
//! ## Adding capabilities
//!
//! Register converters once at startup, before the registry is handed to
//! the engine:
//!
//! ```rust
//! use edgequake_convert::{
//!     CapabilityOutcome, CapabilityRegistry, ConversionEngine, EngineConfig, FnCapability, FormatId,
//! };
//! use std::sync::Arc;
//!
//! let mut registry = CapabilityRegistry::new();
//! edgequake_convert::capabilities::register_builtin(&mut registry).unwrap();
//! registry
//!     .register(
//!         FormatId::parse("html").unwrap(),
//!         FormatId::parse("pdf").unwrap(),
//!         "my-renderer",
//!         Arc::new(FnCapability::new("html-to-pdf", |_input, _output| {
//!             CapabilityOutcome::failed("renderer not installed")
//!         })),
//!     )
//!     .unwrap();
//! let engine = ConversionEngine::new(registry, EngineConfig::default());
//! assert!(engine.find_conversion_path(
//!     &FormatId::parse("csv").unwrap(),
//!     &FormatId::parse("pdf").unwrap(),
//! ).is_some());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `eqconvert` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod integrity;
pub mod normalize;
pub mod output;
pub mod path;
pub mod pipeline;
pub mod pricing;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::ConversionEngine;
pub use error::{EngineError, FailureKind, IntegrityFailure};
pub use format::FormatId;
pub use integrity::{Checksums, IntegrityChecker, IntegrityReport};
pub use normalize::{NormalizationAction, NormalizationRecord, NormalizeOptions};
pub use output::{ConversionLog, ConversionOutcome, ConversionRequest, ConversionResult, StepResult};
pub use path::{find_conversion_path, ConversionPath};
pub use pricing::{
    analyze_conversion_options, calculate_credits, ConversionOptions, CostBreakdown, Offer,
    QualityTier, Recommendation, Strategy,
};
pub use progress::{NoopProgressSink, Phase, ProgressSink};
pub use registry::{Capability, CapabilityOutcome, CapabilityRegistry, FnCapability};
