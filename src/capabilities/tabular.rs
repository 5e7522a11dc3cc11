//! Delimited-text (CSV/TSV), JSON and HTML table transforms.
//!
//! The reader follows RFC 4180: fields may be quoted, a doubled quote inside
//! a quoted field is a literal quote, and quoted fields may span lines.
//! The first row is always the header.

use super::text::{escape_html, html_document};
use serde_json::{Map, Value};

pub type Rows = Vec<Vec<String>>;

/// Parse delimited text into rows of fields.
pub fn parse_delimited(input: &str, delimiter: char) -> Result<Rows, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut line = 1usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
            }
            '"' => return Err(format!("line {line}: stray quote inside unquoted field")),
            c if c == delimiter => {
                row.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                field_started = false;
                rows.push(std::mem::take(&mut row));
                line += 1;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(format!("line {line}: unterminated quoted field"));
    }
    if field_started || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    // Blank lines carry no data.
    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    Ok(rows)
}

/// Serialize rows, quoting fields that contain the delimiter, a quote or a
/// line break.
pub fn write_delimited(rows: &[Vec<String>], delimiter: char) -> String {
    let mut out = String::new();
    for row in rows {
        let fields: Vec<String> = row
            .iter()
            .map(|f| {
                if f.contains(delimiter) || f.contains('"') || f.contains('\n') || f.contains('\r') {
                    format!("\"{}\"", f.replace('"', "\"\""))
                } else {
                    f.clone()
                }
            })
            .collect();
        out.push_str(&fields.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

/// Make header names unique by suffixing repeats with `_2`, `_3`, ….
fn unique_headers(header: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(header.len());
    for (i, name) in header.iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("column_{}", i + 1)
        } else {
            name.trim().to_string()
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

// ── csv ↔ tsv ────────────────────────────────────────────────────────────────

pub fn csv_to_tsv(input: &str) -> Result<String, String> {
    Ok(write_delimited(&parse_delimited(input, ',')?, '\t'))
}

pub fn tsv_to_csv(input: &str) -> Result<String, String> {
    Ok(write_delimited(&parse_delimited(input, '\t')?, ','))
}

// ── csv → json ───────────────────────────────────────────────────────────────

/// Array of objects keyed by header; every value is a string. Short rows
/// are padded with empty strings, extra fields are dropped.
pub fn csv_to_json(input: &str) -> Result<String, String> {
    let rows = parse_delimited(input, ',')?;
    let Some((header, body)) = rows.split_first() else {
        return Ok("[]\n".to_string());
    };
    let keys = unique_headers(header);

    let records: Vec<Value> = body
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (i, key) in keys.iter().enumerate() {
                let v = row.get(i).cloned().unwrap_or_default();
                obj.insert(key.clone(), Value::String(v));
            }
            Value::Object(obj)
        })
        .collect();

    serde_json::to_string_pretty(&Value::Array(records))
        .map(|s| s + "\n")
        .map_err(|e| e.to_string())
}

// ── json → csv ───────────────────────────────────────────────────────────────

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Accepts an array of objects (columns are the union of keys in first-seen
/// order) or an array of arrays (first inner array is the header).
pub fn json_to_csv(input: &str) -> Result<String, String> {
    let value: Value = serde_json::from_str(input.trim_start_matches('\u{feff}'))
        .map_err(|e| format!("invalid JSON: {e}"))?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err("expected a JSON array or object".into()),
    };

    if items.iter().all(Value::is_array) {
        let rows: Rows = items
            .iter()
            .filter_map(Value::as_array)
            .map(|r| r.iter().map(cell).collect())
            .collect();
        return Ok(write_delimited(&rows, ','));
    }

    let mut columns: Vec<String> = Vec::new();
    for item in &items {
        let obj = item
            .as_object()
            .ok_or_else(|| "mixed array: expected every element to be an object".to_string())?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut rows: Rows = vec![columns.clone()];
    for item in &items {
        if let Some(obj) = item.as_object() {
            rows.push(
                columns
                    .iter()
                    .map(|c| obj.get(c).map(cell).unwrap_or_default())
                    .collect(),
            );
        }
    }
    Ok(write_delimited(&rows, ','))
}

// ── csv → html ───────────────────────────────────────────────────────────────

pub fn csv_to_html(input: &str) -> Result<String, String> {
    let rows = parse_delimited(input, ',')?;
    let mut body = String::from("<table>\n");
    if let Some((header, rest)) = rows.split_first() {
        body.push_str("<thead>\n<tr>");
        for h in header {
            body.push_str(&format!("<th>{}</th>", escape_html(h)));
        }
        body.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in rest {
            body.push_str("<tr>");
            for f in row {
                body.push_str(&format!("<td>{}</td>", escape_html(f)));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</tbody>\n");
    }
    body.push_str("</table>\n");
    Ok(html_document("Table", &body))
}
