//! Best-effort repair of UTF-8 text that was decoded as windows-1252.
//!
//! The classic failure: the UTF-8 bytes `C3 A9` ("é") are read as
//! windows-1252, giving "Ã©", and that text is saved again as UTF-8. Each
//! original multi-byte character turns into a lead character in
//! `U+00C2..=U+00F4` followed by one to three characters whose windows-1252
//! byte is a UTF-8 continuation byte (`0x80..=0xBF`).
//!
//! Repair walks the text, and for every such run re-encodes it as
//! windows-1252 and decodes the bytes as UTF-8. Runs that do not round-trip
//! are left untouched. This is a convenience transform: text that
//! legitimately contains "Ã©" will be altered.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fast pre-check: a lead character directly followed by a character that
/// windows-1252 maps to a continuation byte.
static RE_MOJIBAKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\u{00C2}-\u{00F4}][\u{0080}-\u{00BF}\u{0152}\u{0153}\u{0160}\u{0161}\u{0178}\
         \u{017D}\u{017E}\u{0192}\u{02C6}\u{02DC}\u{2013}\u{2014}\u{2018}-\u{201A}\
         \u{201C}-\u{201E}\u{2020}-\u{2022}\u{2026}\u{2030}\u{2039}\u{203A}\u{20AC}\u{2122}]",
    )
    .unwrap()
});

/// `true` when `text` contains at least one likely mojibake sequence.
pub fn looks_mojibaked(text: &str) -> bool {
    RE_MOJIBAKE.is_match(text)
}

/// Number of continuation characters a lead character implies, if any.
fn continuation_len(lead: char) -> Option<usize> {
    match lead as u32 {
        0xC2..=0xDF => Some(1),
        0xE0..=0xEF => Some(2),
        0xF0..=0xF4 => Some(3),
        _ => None,
    }
}

/// windows-1252 byte for `c`, if it encodes to a single byte.
fn cp1252_byte(c: char) -> Option<u8> {
    let mut buf = [0u8; 4];
    let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    if unmappable || bytes.len() != 1 {
        None
    } else {
        Some(bytes[0])
    }
}

/// Try to turn one run (lead + continuations) back into the original char.
fn repair_run(run: &[char]) -> Option<char> {
    let bytes: Vec<u8> = run
        .iter()
        .map(|&c| cp1252_byte(c))
        .collect::<Option<Vec<u8>>>()?;
    if bytes[1..].iter().any(|b| !(0x80..=0xBF).contains(b)) {
        return None;
    }
    let decoded = std::str::from_utf8(&bytes).ok()?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Upper bound on stacked mis-decodings undone by one call.
const MAX_REPAIR_PASSES: usize = 3;

/// Repair windows-1252 mojibake in `text`, returning the repaired text.
///
/// Text garbled more than once is peeled one layer per pass until no marker
/// is left or nothing changes. Text without mojibake markers is returned
/// unchanged, so the transform is idempotent on clean input.
pub fn repair_mojibake(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_REPAIR_PASSES {
        if !looks_mojibaked(&current) {
            break;
        }
        let next = repair_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Undo one layer of mis-decoding.
fn repair_pass(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(n) = continuation_len(c) {
            if i + n < chars.len() {
                if let Some(fixed) = repair_run(&chars[i..=i + n]) {
                    out.push(fixed);
                    i += n + 1;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }

    out
}
