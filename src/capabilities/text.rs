//! Plain-text, Markdown and HTML transforms.
//!
//! Each transform is a pure `&str → String` function. They aim for readable
//! output, not full fidelity: the Markdown renderer covers headings,
//! paragraphs, lists, block quotes, fenced code and the common inline marks.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Shared helpers ───────────────────────────────────────────────────────────

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap a body fragment in a minimal UTF-8 HTML document.
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn normalise_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split into paragraphs on blank lines, dropping empty ones.
fn paragraphs(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in s.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

// ── txt → html ───────────────────────────────────────────────────────────────

pub fn txt_to_html(input: &str) -> Result<String, String> {
    let text = normalise_line_endings(input);
    let mut body = String::new();
    for para in paragraphs(&text) {
        let lines: Vec<String> = para.lines().map(escape_html).collect();
        body.push_str("<p>");
        body.push_str(&lines.join("<br>\n"));
        body.push_str("</p>\n");
    }
    Ok(html_document("Document", &body))
}

// ── txt → md ─────────────────────────────────────────────────────────────────

static RE_MD_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\\`*_\[\]])").unwrap());
static RE_MD_LINE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([#>+-]|\d+\.)(\s)").unwrap());

/// Escape characters Markdown would otherwise interpret.
pub fn txt_to_md(input: &str) -> Result<String, String> {
    let text = normalise_line_endings(input);
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let escaped = RE_MD_SPECIAL.replace_all(line, r"\$1");
        let escaped = RE_MD_LINE_START.replace(&escaped, r"$1\$2$3");
        out.push_str(&escaped);
        out.push('\n');
    }
    Ok(out)
}

// ── md → html ────────────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$").unwrap());
static RE_UL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());
static RE_OL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+[.)]\s+(.*)$").unwrap());
static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```\s*([\w+-]*)\s*$").unwrap());
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*_])(\s*[-*_]){2,}\s*$").unwrap());
static RE_CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_EM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

/// Escape `text` and render inline marks.
fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);
    // Code spans first so their content is not re-marked.
    let mut spans: Vec<String> = Vec::new();
    let placeholdered = RE_CODE_SPAN.replace_all(&escaped, |c: &regex::Captures| {
        spans.push(format!("<code>{}</code>", &c[1]));
        format!("\u{0}{}\u{0}", spans.len() - 1)
    });
    let s = RE_LINK.replace_all(&placeholdered, r#"<a href="$2">$1</a>"#);
    let s = RE_STRONG.replace_all(&s, "<strong>$1</strong>");
    let s = RE_EM.replace_all(&s, "<em>$1</em>");

    let mut out = s.into_owned();
    for (i, span) in spans.iter().enumerate() {
        out = out.replace(&format!("\u{0}{i}\u{0}"), span);
    }
    out
}

#[derive(PartialEq)]
enum Block {
    None,
    Paragraph,
    Unordered,
    Ordered,
    Quote,
}

fn close(block: &mut Block, out: &mut String) {
    match block {
        Block::Paragraph => out.push_str("</p>\n"),
        Block::Unordered => out.push_str("</ul>\n"),
        Block::Ordered => out.push_str("</ol>\n"),
        Block::Quote => out.push_str("</blockquote>\n"),
        Block::None => {}
    }
    *block = Block::None;
}

pub fn md_to_html(input: &str) -> Result<String, String> {
    let text = normalise_line_endings(input);
    let mut out = String::new();
    let mut block = Block::None;
    let mut in_code = false;
    let mut title: Option<String> = None;

    for line in text.lines() {
        if let Some(c) = RE_FENCE.captures(line) {
            if in_code {
                out.push_str("</code></pre>\n");
                in_code = false;
            } else {
                close(&mut block, &mut out);
                let lang = &c[1];
                if lang.is_empty() {
                    out.push_str("<pre><code>");
                } else {
                    out.push_str(&format!("<pre><code class=\"language-{}\">", escape_html(lang)));
                }
                in_code = true;
            }
            continue;
        }
        if in_code {
            out.push_str(&escape_html(line));
            out.push('\n');
            continue;
        }

        if line.trim().is_empty() {
            close(&mut block, &mut out);
            continue;
        }

        if let Some(c) = RE_HEADING.captures(line) {
            close(&mut block, &mut out);
            let level = c[1].len();
            if title.is_none() {
                title = Some(c[2].to_string());
            }
            out.push_str(&format!("<h{level}>{}</h{level}>\n", render_inline(&c[2])));
            continue;
        }

        if RE_RULE.is_match(line) {
            close(&mut block, &mut out);
            out.push_str("<hr>\n");
            continue;
        }

        if let Some(c) = RE_UL_ITEM.captures(line) {
            if block != Block::Unordered {
                close(&mut block, &mut out);
                out.push_str("<ul>\n");
                block = Block::Unordered;
            }
            out.push_str(&format!("<li>{}</li>\n", render_inline(&c[1])));
            continue;
        }

        if let Some(c) = RE_OL_ITEM.captures(line) {
            if block != Block::Ordered {
                close(&mut block, &mut out);
                out.push_str("<ol>\n");
                block = Block::Ordered;
            }
            out.push_str(&format!("<li>{}</li>\n", render_inline(&c[1])));
            continue;
        }

        if let Some(rest) = line.trim_start().strip_prefix('>') {
            if block != Block::Quote {
                close(&mut block, &mut out);
                out.push_str("<blockquote>\n");
                block = Block::Quote;
            }
            out.push_str(&format!("<p>{}</p>\n", render_inline(rest.trim())));
            continue;
        }

        match block {
            Block::Paragraph => {
                out.push('\n');
                out.push_str(&render_inline(line.trim()));
            }
            _ => {
                close(&mut block, &mut out);
                out.push_str("<p>");
                out.push_str(&render_inline(line.trim()));
                block = Block::Paragraph;
            }
        }
    }

    if in_code {
        out.push_str("</code></pre>\n");
    }
    close(&mut block, &mut out);

    Ok(html_document(title.as_deref().unwrap_or("Document"), &out))
}

// ── html → txt ───────────────────────────────────────────────────────────────

/// Elements whose content is never visible text.
static RE_INVISIBLE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["head", "script", "style", "template"]
        .iter()
        .map(|t| Regex::new(&format!(r"(?is)<{t}\b[^>]*>.*?</{t}\s*>")).unwrap())
        .collect()
});
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|blockquote|pre|table|ul|ol)\s*>").unwrap()
});
static RE_CELL_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</t[dh]\s*>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RE_NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:x([0-9a-fA-F]+)|([0-9]+));").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn decode_entities(s: &str) -> String {
    let s = RE_NUMERIC_ENTITY.replace_all(s, |c: &regex::Captures| {
        let code = match (c.get(1), c.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| c[0].to_string())
    });
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn html_to_txt(input: &str) -> Result<String, String> {
    let s = normalise_line_endings(input);
    let s = RE_INVISIBLE_BLOCKS
        .iter()
        .fold(s, |acc, re| re.replace_all(&acc, "").into_owned());
    let s = RE_COMMENT.replace_all(&s, "");
    let s = RE_CELL_END.replace_all(&s, "\t");
    let s = RE_BREAK.replace_all(&s, "\n");
    let s = RE_TAG.replace_all(&s, "");
    let s = decode_entities(&s);

    let lines: Vec<String> = s
        .lines()
        .map(|l| RE_SPACES.replace_all(l, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    let collapsed = RE_BLANK_LINES.replace_all(joined.trim(), "\n\n");
    Ok(format!("{collapsed}\n"))
}
