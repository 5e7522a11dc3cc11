//! Built-in capabilities and their registration table.
//!
//! Everything the engine can do out of the box is listed in [`BUILTIN`] and
//! registered by one explicit call to [`register_builtin`] at startup. Hosts
//! add their own converters through [`CapabilityRegistry::register`].

pub mod tabular;
pub mod text;

use crate::error::EngineError;
use crate::format::FormatId;
use crate::registry::{Capability, CapabilityOutcome, CapabilityRegistry};
use std::path::Path;
use std::sync::Arc;

/// Origin recorded for every built-in registration.
pub const BUILTIN_ORIGIN: &str = "builtin";

type TransformFn = fn(&str) -> Result<String, String>;

/// A capability that reads UTF-8 text, transforms it in memory and writes
/// UTF-8 text.
pub struct TextTransform {
    name: &'static str,
    transform: TransformFn,
}

impl TextTransform {
    pub const fn new(name: &'static str, transform: TransformFn) -> Self {
        Self { name, transform }
    }
}

impl Capability for TextTransform {
    fn name(&self) -> &str {
        self.name
    }

    fn convert(&self, input: &Path, output: &Path) -> CapabilityOutcome {
        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => return CapabilityOutcome::failed(format!("cannot read input: {e}")),
        };
        let text = match std::str::from_utf8(&bytes) {
            Ok(t) => t.trim_start_matches('\u{feff}'),
            Err(e) => return CapabilityOutcome::failed(format!("input is not UTF-8: {e}")),
        };
        let converted = match (self.transform)(text) {
            Ok(c) => c,
            Err(e) => return CapabilityOutcome::failed(e),
        };
        match std::fs::write(output, converted.as_bytes()) {
            Ok(()) => CapabilityOutcome::ok(format!("wrote {} bytes", converted.len())),
            Err(e) => CapabilityOutcome::failed(format!("cannot write output: {e}")),
        }
    }
}

/// `(source, target, capability name, transform)`.
pub const BUILTIN: &[(&str, &str, &str, TransformFn)] = &[
    ("csv", "html", "csv-to-html", tabular::csv_to_html),
    ("csv", "json", "csv-to-json", tabular::csv_to_json),
    ("csv", "tsv", "csv-to-tsv", tabular::csv_to_tsv),
    ("html", "txt", "html-to-txt", text::html_to_txt),
    ("json", "csv", "json-to-csv", tabular::json_to_csv),
    ("md", "html", "md-to-html", text::md_to_html),
    ("tsv", "csv", "tsv-to-csv", tabular::tsv_to_csv),
    ("txt", "html", "txt-to-html", text::txt_to_html),
    ("txt", "md", "txt-to-md", text::txt_to_md),
];

/// Register every built-in capability under [`BUILTIN_ORIGIN`].
///
/// Calling this twice on the same registry is harmless.
pub fn register_builtin(registry: &mut CapabilityRegistry) -> Result<(), EngineError> {
    for &(source, target, name, transform) in BUILTIN {
        registry.register(
            FormatId::parse(source)?,
            FormatId::parse(target)?,
            BUILTIN_ORIGIN,
            Arc::new(TextTransform::new(name, transform)),
        )?;
    }
    Ok(())
}
