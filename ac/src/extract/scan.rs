//! Best-effort local text scan of PDF bytes
//!
//! Used only when the extraction backend is unavailable. Reads text shown
//! with `Tj`/`TJ` operators in uncompressed content streams; when there are
//! none, falls back to printable runs that read like prose.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Text-showing operators and the line-moving operators between them
static CONTENT_OPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[(?P<arr>(?:\\.|[^\]\\])*)\]\s*TJ|\((?P<str>(?:\\.|[^()\\])*)\)\s*(?:Tj|'|")|(?P<nl>T\*|-?[\d.]+\s+-?[\d.]+\s+T[dD]\b|\bET\b)|(?P<page>/Type\s*/Page\b)"#,
    )
    .expect("content operator regex is valid")
});

/// String literals inside a `TJ` array
static ARRAY_STRINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?P<s>(?:\\.|[^()\\])*)\)").expect("array string regex is valid"));

/// Printable runs are kept only if they contain this many words
const MIN_RUN_WORDS: usize = 3;

/// Scan PDF bytes for text; empty when nothing usable was found
pub fn scan_pdf(bytes: &[u8]) -> String {
    debug!(bytes = bytes.len(), "scan_pdf: called");
    // Latin-1 keeps a 1:1 byte/char mapping over binary data
    let raw: String = bytes.iter().map(|&b| b as char).collect();

    let shown = scan_text_operators(&raw);
    if !shown.trim().is_empty() {
        return shown;
    }
    printable_runs(&raw)
}

fn scan_text_operators(raw: &str) -> String {
    let mut out = String::new();
    let mut pages_seen = 0;
    for caps in CONTENT_OPS.captures_iter(raw) {
        if let Some(arr) = caps.name("arr") {
            for s in ARRAY_STRINGS.captures_iter(arr.as_str()) {
                out.push_str(&unescape(&s["s"]));
            }
        } else if let Some(s) = caps.name("str") {
            out.push_str(&unescape(s.as_str()));
        } else if caps.name("nl").is_some() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        } else if caps.name("page").is_some() {
            pages_seen += 1;
            if pages_seen > 1 && !out.is_empty() {
                out.push('\x0c');
            }
        }
    }
    out
}

/// Decode PDF literal string escapes
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(d @ '0'..='7') => {
                let mut code = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(v) => {
                            code = code * 8 + v;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(code) {
                    out.push(ch);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn printable_runs(raw: &str) -> String {
    raw.split(|c: char| !(c.is_ascii_graphic() || c == ' '))
        .map(str::trim)
        .filter(|run| !run.starts_with('/') && !run.starts_with('<'))
        .filter(|run| {
            run.split_whitespace()
                .filter(|w| w.chars().any(|c| c.is_ascii_alphabetic()))
                .count()
                >= MIN_RUN_WORDS
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tj_operators() {
        let pdf = b"%PDF-1.4\n1 0 obj << /Type /Page >> endobj\nstream\nBT /F1 12 Tf 72 700 Td (1. Solve for x: 3x + 7 = 22) Tj 0 -14 Td (2. Evaluate 2\\(4\\) + 1) Tj ET\nendstream";
        let text = scan_pdf(pdf);
        assert_eq!(text, "1. Solve for x: 3x + 7 = 22\n2. Evaluate 2(4) + 1\n");
    }

    #[test]
    fn test_scan_tj_array() {
        let pdf = b"BT [(Fac) -20 (tor x) 10 (^2 - 9)] TJ ET";
        assert_eq!(scan_pdf(pdf), "Factor x^2 - 9\n");
    }

    #[test]
    fn test_scan_marks_page_breaks() {
        let pdf = b"<< /Type /Page >> BT (1. first) Tj ET << /Type /Page >> BT (2. second) Tj ET";
        let text = scan_pdf(pdf);
        assert!(text.contains('\x0c'));
        assert!(text.starts_with("1. first"));
    }

    #[test]
    fn test_unescape_octal() {
        assert_eq!(unescape("x\\264 2"), "x\u{b4} 2");
        assert_eq!(unescape("a\\\\b"), "a\\b");
    }

    #[test]
    fn test_printable_runs_fallback() {
        let mut pdf = vec![0x00, 0xff];
        pdf.extend_from_slice(b"Solve the equation for x");
        pdf.extend_from_slice(&[0x01, 0x02]);
        pdf.extend_from_slice(b"/FlateDecode");
        pdf.push(0x00);
        assert_eq!(scan_pdf(&pdf), "Solve the equation for x");
    }

    #[test]
    fn test_binary_noise_is_empty() {
        let pdf: Vec<u8> = (0u8..=255).cycle().take(2048).filter(|b| !b.is_ascii_alphabetic()).collect();
        assert!(scan_pdf(&pdf).trim().is_empty());
    }
}
