//! Binary classification and heuristic text-encoding detection.
//!
//! Both functions only look at bytes; neither is authoritative. When a byte
//! sequence is ambiguous the detector falls back to `windows-1252`, which
//! decodes every byte and therefore never loses data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How many leading bytes the classifiers inspect.
const SAMPLE_LEN: usize = 8192;

/// Share of control bytes above which a sample is considered binary.
const CONTROL_RATIO_LIMIT: f64 = 0.30;

/// Magic-number prefixes of binary containers that must never be rewritten.
const BINARY_MAGIC: &[&[u8]] = &[
    b"PK\x03\x04",               // ZIP local header (docx, xlsx, epub, odt, …)
    b"PK\x05\x06",               // empty ZIP
    b"PK\x07\x08",               // spanned ZIP
    b"%PDF",                     // PDF
    b"\xFF\xD8\xFF",             // JPEG
    b"\x89PNG\r\n\x1a\n",        // PNG
    b"II*\x00",                  // TIFF little-endian
    b"MM\x00*",                  // TIFF big-endian
    b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1", // OLE2 (doc, xls, ppt)
    b"\x1F\x8B",                 // gzip
    b"7z\xBC\xAF\x27\x1C",       // 7-Zip
    b"Rar!\x1A\x07",             // RAR
    b"\x7FELF",                  // ELF
    b"\x00\x00\x00\x0CjP  ",     // JPEG 2000
];

/// Magic numbers made only of printable ASCII. A text file may legitimately
/// start with these words, so they count only when a non-text byte follows
/// within [`TEXTUAL_MAGIC_WINDOW`] bytes, as it does in every real header.
const TEXTUAL_MAGIC: &[&[u8]] = &[
    b"GIF87a", // GIF
    b"GIF89a", // GIF
    b"RIFF",   // WebP, WAV, AVI
    b"OggS",   // Ogg
    b"ID3",    // MP3 with ID3 tag
];

const TEXTUAL_MAGIC_WINDOW: usize = 16;

/// Encodings the detector can report. The canonical target is always UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingLabel {
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-8-bom")]
    Utf8Bom,
    #[serde(rename = "utf-16le")]
    Utf16Le,
    #[serde(rename = "utf-16be")]
    Utf16Be,
    #[serde(rename = "windows-1252")]
    Windows1252,
}

impl EncodingLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingLabel::Ascii => "ascii",
            EncodingLabel::Utf8 => "utf-8",
            EncodingLabel::Utf8Bom => "utf-8-bom",
            EncodingLabel::Utf16Le => "utf-16le",
            EncodingLabel::Utf16Be => "utf-16be",
            EncodingLabel::Windows1252 => "windows-1252",
        }
    }

    /// The `encoding_rs` decoder matching this label.
    pub fn decoder(&self) -> &'static encoding_rs::Encoding {
        match self {
            EncodingLabel::Ascii | EncodingLabel::Utf8 | EncodingLabel::Utf8Bom => {
                encoding_rs::UTF_8
            }
            EncodingLabel::Utf16Le => encoding_rs::UTF_16LE,
            EncodingLabel::Utf16Be => encoding_rs::UTF_16BE,
            EncodingLabel::Windows1252 => encoding_rs::WINDOWS_1252,
        }
    }
}

impl fmt::Display for EncodingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn sample(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(SAMPLE_LEN)]
}

fn has_utf16_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF])
}

/// Guess UTF-16 without a BOM: ASCII-range text leaves NUL bytes in every
/// other position. Returns the endianness when the pattern is strong.
fn utf16_without_bom(bytes: &[u8]) -> Option<EncodingLabel> {
    let s = sample(bytes);
    if s.len() < 4 {
        return None;
    }
    let pairs = s.len() / 2;
    let even_nuls = s.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_nuls = s.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    if odd_nuls * 10 >= pairs * 9 && even_nuls * 10 <= pairs {
        Some(EncodingLabel::Utf16Le)
    } else if even_nuls * 10 >= pairs * 9 && odd_nuls * 10 <= pairs {
        Some(EncodingLabel::Utf16Be)
    } else {
        None
    }
}

/// `true` when the bytes start with a known binary magic number.
pub fn has_binary_magic(bytes: &[u8]) -> bool {
    if BINARY_MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
        return true;
    }
    TEXTUAL_MAGIC.iter().any(|magic| {
        bytes.starts_with(magic)
            && bytes[magic.len()..]
                .iter()
                .take(TEXTUAL_MAGIC_WINDOW)
                .any(|&b| is_non_text_byte(b))
    })
}

fn is_non_text_byte(b: u8) -> bool {
    b == 0x7F || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
}

/// Classify content as binary (magic number or byte distribution).
///
/// UTF-16 text contains NUL bytes by construction, so it is recognised
/// before the NUL test.
pub fn is_binary(bytes: &[u8]) -> bool {
    if has_binary_magic(bytes) {
        return true;
    }
    if has_utf16_bom(bytes) || utf16_without_bom(bytes).is_some() {
        return false;
    }

    let s = sample(bytes);
    if s.is_empty() {
        return false;
    }
    if s.contains(&0) {
        return true;
    }

    let control = s
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
        .count();
    (control as f64 / s.len() as f64) > CONTROL_RATIO_LIMIT
}

/// Detect the text encoding of `bytes`.
pub fn detect_encoding(bytes: &[u8]) -> EncodingLabel {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return EncodingLabel::Utf8Bom;
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return EncodingLabel::Utf16Le;
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return EncodingLabel::Utf16Be;
    }
    if let Some(label) = utf16_without_bom(bytes) {
        return label;
    }
    if bytes.is_ascii() {
        return EncodingLabel::Ascii;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return EncodingLabel::Utf8;
    }
    EncodingLabel::Windows1252
}
