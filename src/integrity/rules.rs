//! Format-specific structural and full-content checks.
//!
//! Structural checks look at the container/header level; content checks
//! read everything (every ZIP entry to its CRC, every image pixel) so that
//! truncation and corruption are caught before a conversion starts.

use crate::error::IntegrityFailure;
use crate::format::FormatId;
use crate::normalize::detect::{detect_encoding, is_binary, EncodingLabel};
use crate::normalize::mojibake::looks_mojibaked;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

static RE_PDF_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"%PDF-\d\.\d").unwrap());
static RE_STARTXREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"startxref\s+(\d+)").unwrap());

/// Entries a ZIP-based document must contain to be what it claims.
fn required_zip_entry(format: &FormatId) -> Option<&'static str> {
    match format.as_str() {
        "docx" | "xlsx" | "pptx" => Some("[Content_Types].xml"),
        "epub" | "odt" | "ods" | "odp" => Some("mimetype"),
        _ => None,
    }
}

fn structure_err(format: &FormatId, detail: impl Into<String>) -> IntegrityFailure {
    IntegrityFailure::InvalidStructure {
        format: format.to_string(),
        detail: detail.into(),
    }
}

/// Warnings from a check that passed.
pub type Warnings = Vec<String>;

// ── Structural checks ────────────────────────────────────────────────────

/// Header/container-level validation. `header` and `tail` are the first and
/// last bytes of the file as fetched by the readability check.
pub fn check_structure(
    path: &Path,
    format: &FormatId,
    header: &[u8],
    tail: &[u8],
) -> Result<Warnings, IntegrityFailure> {
    if format.is_zip_container() {
        zip_structure(path, format)
    } else if format.is_page_description() {
        pdf_structure(format, header, tail)
    } else if format.is_raster_image() {
        image_structure(path, format)
    } else {
        match format.as_str() {
            "json" => json_structure(path, format),
            "xml" => xml_structure(format, header),
            "csv" => Ok(delimited_structure(path, b',')),
            "tsv" => Ok(delimited_structure(path, b'\t')),
            _ => Ok(Vec::new()),
        }
    }
}

fn zip_structure(path: &Path, format: &FormatId) -> Result<Warnings, IntegrityFailure> {
    let file = File::open(path).map_err(|e| IntegrityFailure::Unreadable {
        detail: e.to_string(),
    })?;
    let archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| structure_err(format, format!("not a readable ZIP archive: {e}")))?;

    if archive.len() == 0 {
        return Err(structure_err(format, "archive has no entries"));
    }
    if let Some(required) = required_zip_entry(format) {
        if !archive.file_names().any(|name| name == required) {
            return Err(structure_err(
                format,
                format!("missing required entry '{required}'"),
            ));
        }
    }
    Ok(Vec::new())
}

fn pdf_structure(
    format: &FormatId,
    header: &[u8],
    tail: &[u8],
) -> Result<Warnings, IntegrityFailure> {
    if !RE_PDF_HEADER.is_match(header) {
        return Err(structure_err(format, "missing %PDF-x.y header"));
    }
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(structure_err(format, "missing %%EOF trailer"));
    }
    let mut warnings = Vec::new();
    if !header.starts_with(b"%PDF-") {
        warnings.push("PDF header is preceded by extra bytes".to_string());
    }
    Ok(warnings)
}

fn image_structure(path: &Path, format: &FormatId) -> Result<Warnings, IntegrityFailure> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| IntegrityFailure::Unreadable {
            detail: e.to_string(),
        })?;

    let Some(detected) = reader.format() else {
        return Err(structure_err(format, "unrecognised image header"));
    };

    let mut warnings = Vec::new();
    let declared = image::ImageFormat::from_extension(format.as_str());
    if declared.is_some_and(|d| d != detected) {
        warnings.push(format!(
            "declared as {format} but content looks like {detected:?}"
        ));
    }
    Ok(warnings)
}

fn json_structure(path: &Path, format: &FormatId) -> Result<Warnings, IntegrityFailure> {
    let file = File::open(path).map_err(|e| IntegrityFailure::Unreadable {
        detail: e.to_string(),
    })?;
    // serde_json rejects a BOM; strip it before parsing.
    let mut reader = BufReader::new(file);
    let mut bom = [0u8; 3];
    let n = read_up_to(&mut reader, &mut bom).map_err(|e| IntegrityFailure::Unreadable {
        detail: e.to_string(),
    })?;
    let prefix: &[u8] = if bom[..n] == [0xEF, 0xBB, 0xBF] {
        &[]
    } else {
        &bom[..n]
    };

    serde_json::from_reader::<_, serde::de::IgnoredAny>(prefix.chain(reader))
        .map(|_| Vec::new())
        .map_err(|e| structure_err(format, format!("JSON parse error: {e}")))
}

fn xml_structure(format: &FormatId, header: &[u8]) -> Result<Warnings, IntegrityFailure> {
    let body = header.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(header);
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => Ok(Vec::new()),
        _ => Err(structure_err(format, "document does not start with a tag")),
    }
}

/// Ragged rows are advisory only: quoted fields may legitimately contain
/// delimiters, which this quick scan does not model.
fn delimited_structure(path: &Path, delimiter: u8) -> Warnings {
    let Ok(content) = std::fs::read(path) else {
        return Vec::new();
    };
    let mut widths = content
        .split(|&b| b == b'\n')
        .filter(|line| !line.iter().all(|b| b.is_ascii_whitespace()))
        .take(100)
        .map(|line| line.iter().filter(|&&b| b == delimiter).count());

    let Some(first) = widths.next() else {
        return Vec::new();
    };
    if widths.any(|w| w != first) {
        vec!["rows have differing column counts".to_string()]
    } else {
        Vec::new()
    }
}

// ── Full-content checks ──────────────────────────────────────────────────

/// Read the entire content the way a converter would.
pub fn check_content(
    path: &Path,
    format: &FormatId,
    tail: &[u8],
    size: u64,
) -> Result<Warnings, IntegrityFailure> {
    if format.is_zip_container() {
        zip_content(path)
    } else if format.is_page_description() {
        pdf_content(tail, size)
    } else if format.is_raster_image() {
        image_content(path)
    } else {
        let mut file = File::open(path).map_err(|e| IntegrityFailure::Unreadable {
            detail: e.to_string(),
        })?;
        let read = io::copy(&mut file, &mut io::sink()).map_err(|e| IntegrityFailure::Corrupted {
            detail: e.to_string(),
        })?;
        if read != size {
            return Err(IntegrityFailure::Corrupted {
                detail: format!("read {read} of {size} bytes"),
            });
        }
        Ok(Vec::new())
    }
}

fn zip_content(path: &Path) -> Result<Warnings, IntegrityFailure> {
    let file = File::open(path).map_err(|e| IntegrityFailure::Unreadable {
        detail: e.to_string(),
    })?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| IntegrityFailure::Corrupted {
            detail: e.to_string(),
        })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| IntegrityFailure::Corrupted {
            detail: format!("entry #{i}: {e}"),
        })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let expected = entry.size();
        // Reading to EOF is what triggers the CRC-32 verification.
        let read = io::copy(&mut entry, &mut io::sink()).map_err(|e| {
            IntegrityFailure::Corrupted {
                detail: format!("entry '{name}' is not fully readable: {e}"),
            }
        })?;
        if read != expected {
            return Err(IntegrityFailure::Corrupted {
                detail: format!("entry '{name}' yielded {read} of {expected} bytes"),
            });
        }
    }
    Ok(Vec::new())
}

fn pdf_content(tail: &[u8], size: u64) -> Result<Warnings, IntegrityFailure> {
    let Some(caps) = RE_STARTXREF.captures_iter(tail).last() else {
        return Err(IntegrityFailure::Corrupted {
            detail: "missing startxref".into(),
        });
    };
    let offset = std::str::from_utf8(&caps[1])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| IntegrityFailure::Corrupted {
            detail: "unparseable startxref offset".into(),
        })?;
    if offset >= size {
        return Err(IntegrityFailure::Corrupted {
            detail: format!("startxref offset {offset} beyond file size {size}"),
        });
    }
    Ok(Vec::new())
}

fn image_content(path: &Path) -> Result<Warnings, IntegrityFailure> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| IntegrityFailure::Unreadable {
            detail: e.to_string(),
        })?;

    match reader.decode() {
        Ok(_) => Ok(Vec::new()),
        Err(image::ImageError::Unsupported(e)) => {
            Ok(vec![format!("image could not be fully verified: {e}")])
        }
        Err(e) => Err(IntegrityFailure::Corrupted {
            detail: format!("image does not fully decode: {e}"),
        }),
    }
}

// ── Encoding safety ──────────────────────────────────────────────────────

/// Outcome of the encoding-safety check for a text-bearing file.
#[derive(Debug, Default)]
pub struct EncodingVerdict {
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn check_encoding(path: &Path) -> Result<EncodingVerdict, IntegrityFailure> {
    let bytes = std::fs::read(path).map_err(|e| IntegrityFailure::Unreadable {
        detail: e.to_string(),
    })?;
    if is_binary(&bytes) {
        return Err(IntegrityFailure::UnsafeEncoding {
            detail: "binary content in a text format".into(),
        });
    }

    let mut verdict = EncodingVerdict::default();
    match detect_encoding(&bytes) {
        EncodingLabel::Ascii | EncodingLabel::Utf8 => {}
        EncodingLabel::Utf8Bom => verdict
            .warnings
            .push("file starts with a UTF-8 byte-order mark".into()),
        other => {
            verdict
                .warnings
                .push(format!("file is encoded as {other}, not UTF-8"));
            verdict
                .recommendations
                .push("enable text normalization to convert it to UTF-8".into());
        }
    }
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if looks_mojibaked(text) {
            verdict
                .warnings
                .push("text contains likely mis-decoded characters (mojibake)".into());
            verdict
                .recommendations
                .push("normalization will attempt a best-effort repair".into());
        }
    }
    Ok(verdict)
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
