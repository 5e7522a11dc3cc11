//! Format identifiers and the fixed format families the engine reasons about.
//!
//! A [`FormatId`] is always stored lowercase, without a leading dot, and with
//! common aliases folded (`jpeg` → `jpg`, `htm` → `html`, …), so two tokens
//! that name the same format compare equal everywhere inside the engine.
//! Malformed tokens are rejected here, at the boundary, and never reach the
//! registry or the path resolver.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Longest accepted format token.
const MAX_FORMAT_LEN: usize = 16;

/// Aliases folded during parsing: `(alias, canonical)`.
const ALIASES: &[(&str, &str)] = &[
    ("jpeg", "jpg"),
    ("htm", "html"),
    ("yml", "yaml"),
    ("tif", "tiff"),
    ("markdown", "md"),
    ("text", "txt"),
];

/// Formats whose content is character data and therefore subject to
/// encoding normalization before a conversion step reads them.
pub const TEXT_BEARING: &[&str] = &[
    "csv", "html", "ini", "json", "log", "md", "rtf", "srt", "tsv", "txt", "xml", "yaml",
];

/// Formats packaged as ZIP archives.
pub const ZIP_CONTAINERS: &[&str] = &[
    "cbz", "docx", "epub", "odp", "ods", "odt", "pptx", "xlsx", "zip",
];

/// Raster image formats the integrity checker fully decodes.
pub const RASTER_IMAGES: &[&str] = &["bmp", "gif", "jpg", "png", "tiff", "webp"];

/// Page-description formats with header/trailer markers.
pub const PAGE_DESCRIPTION: &[&str] = &["pdf"];

/// A normalized, lowercase file-format token such as `"docx"` or `"csv"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatId(String);

impl FormatId {
    /// Parse a user-supplied token: trims whitespace, strips leading dots,
    /// lowercases and folds aliases.
    ///
    /// # Example
    /// ```rust
    /// use edgequake_convert::FormatId;
    ///
    /// let f = FormatId::parse(".JPEG").unwrap();
    /// assert_eq!(f.as_str(), "jpg");
    /// ```
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        let token = input.trim().trim_start_matches('.').to_ascii_lowercase();

        if token.is_empty() {
            return Err(EngineError::InvalidFormat {
                input: input.to_string(),
                reason: "empty token".into(),
            });
        }
        if token.len() > MAX_FORMAT_LEN {
            return Err(EngineError::InvalidFormat {
                input: input.to_string(),
                reason: format!("longer than {MAX_FORMAT_LEN} characters"),
            });
        }
        if let Some(bad) = token
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '-')))
        {
            return Err(EngineError::InvalidFormat {
                input: input.to_string(),
                reason: format!("unexpected character {bad:?}"),
            });
        }

        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, canonical)| (*canonical).to_string())
            .unwrap_or(token);

        Ok(Self(canonical))
    }

    /// Derive the format from a file extension, if it has one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::parse(ext).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the normalizer must run before a step reading this format.
    pub fn is_text_bearing(&self) -> bool {
        TEXT_BEARING.contains(&self.as_str())
    }

    pub fn is_zip_container(&self) -> bool {
        ZIP_CONTAINERS.contains(&self.as_str())
    }

    pub fn is_raster_image(&self) -> bool {
        RASTER_IMAGES.contains(&self.as_str())
    }

    pub fn is_page_description(&self) -> bool {
        PAGE_DESCRIPTION.contains(&self.as_str())
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FormatId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FormatId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FormatId> for String {
    fn from(value: FormatId) -> Self {
        value.0
    }
}

impl AsRef<str> for FormatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_dots() {
        assert_eq!(FormatId::parse("DOCX").unwrap().as_str(), "docx");
        assert_eq!(FormatId::parse(".csv").unwrap().as_str(), "csv");
        assert_eq!(FormatId::parse("  Pdf ").unwrap().as_str(), "pdf");
    }

    #[test]
    fn parse_folds_aliases() {
        assert_eq!(FormatId::parse("jpeg").unwrap(), FormatId::parse("jpg").unwrap());
        assert_eq!(FormatId::parse("HTM").unwrap().as_str(), "html");
        assert_eq!(FormatId::parse("markdown").unwrap().as_str(), "md");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(FormatId::parse("").is_err());
        assert!(FormatId::parse("...").is_err());
        assert!(FormatId::parse("tar gz").is_err());
        assert!(FormatId::parse("../etc").is_err());
        assert!(FormatId::parse("averyveryverylongformat").is_err());
    }

    #[test]
    fn from_path_uses_extension() {
        let f = FormatId::from_path(Path::new("/tmp/report.XLSX")).unwrap();
        assert_eq!(f.as_str(), "xlsx");
        assert!(FormatId::from_path(Path::new("/tmp/README")).is_none());
    }

    #[test]
    fn families() {
        assert!(FormatId::parse("csv").unwrap().is_text_bearing());
        assert!(!FormatId::parse("docx").unwrap().is_text_bearing());
        assert!(FormatId::parse("epub").unwrap().is_zip_container());
        assert!(FormatId::parse("jpeg").unwrap().is_raster_image());
        assert!(FormatId::parse("pdf").unwrap().is_page_description());
    }

    #[test]
    fn serde_round_trips_through_parse() {
        let f: FormatId = serde_json::from_str(r#"".YML""#).unwrap();
        assert_eq!(f.as_str(), "yaml");
        assert_eq!(serde_json::to_string(&f).unwrap(), r#""yaml""#);
        assert!(serde_json::from_str::<FormatId>(r#""a b""#).is_err());
    }
}
