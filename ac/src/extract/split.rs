//! Splitting extracted text into raw problem candidates

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::RawCandidate;

/// `3. ...`, `3) ...`, `Question 3 ...`, `Problem 3: ...`
static NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?i:question|problem)\s*#?\s*(\d{1,3})\s*[.:)]?|(\d{1,3})\s*[.)])(?:\s+(.*))?$")
        .expect("numbered line regex is valid")
});

/// Parse a line that opens a numbered problem
///
/// Returns the number and the remainder of the line.
pub fn numbered_line(line: &str) -> Option<(u32, &str)> {
    let caps = NUMBERED_LINE.captures(line)?;
    let number = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    Some((number, rest))
}

/// Drop lines that repeat on at least `min_pages` distinct pages
///
/// Numbered lines are never treated as running headers. A threshold of 0
/// disables stripping.
pub fn strip_repeated_lines(pages: &[&str], min_pages: usize) -> (Vec<String>, usize) {
    if min_pages == 0 || pages.len() < min_pages {
        return (pages.iter().map(|p| p.to_string()).collect(), 0);
    }

    let mut seen_on: HashMap<&str, usize> = HashMap::new();
    for page in pages {
        let unique: HashSet<&str> = page.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        for line in unique {
            *seen_on.entry(line).or_insert(0) += 1;
        }
    }

    let mut removed = 0;
    let stripped = pages
        .iter()
        .map(|page| {
            page.lines()
                .filter(|line| {
                    let key = line.trim();
                    let repeated = !key.is_empty()
                        && numbered_line(key).is_none()
                        && seen_on.get(key).copied().unwrap_or(0) >= min_pages;
                    if repeated {
                        removed += 1;
                    }
                    !repeated
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    (stripped, removed)
}

/// Split text into candidates
///
/// Form feeds separate pages. Text before the first numbered line is
/// dropped. Without any numbered lines, paragraphs that look like
/// problems are used instead.
pub fn split_candidates(text: &str, min_repeat_pages: usize) -> (Vec<RawCandidate>, usize) {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let pages: Vec<&str> = normalized.split('\x0c').collect();
    let (pages, removed) = strip_repeated_lines(&pages, min_repeat_pages);
    debug!(pages = pages.len(), removed, "split_candidates: called");

    let numbered = split_numbered(&pages);
    if !numbered.is_empty() {
        return (numbered, removed);
    }
    (split_paragraphs(&pages), removed)
}

fn split_numbered(pages: &[String]) -> Vec<RawCandidate> {
    let mut candidates: Vec<RawCandidate> = Vec::new();
    let mut current: Option<(u32, u32, Vec<String>)> = None;

    for (idx, page) in pages.iter().enumerate() {
        let page_no = idx as u32 + 1;
        for line in page.lines() {
            if let Some((number, rest)) = numbered_line(line) {
                if let Some((n, p, lines)) = current.take() {
                    candidates.push(candidate(Some(n), p, &lines));
                }
                let mut lines = Vec::new();
                if !rest.trim().is_empty() {
                    lines.push(rest.trim().to_string());
                }
                current = Some((number, page_no, lines));
            } else if let Some((_, _, lines)) = current.as_mut() {
                lines.push(line.trim().to_string());
            }
        }
    }
    if let Some((n, p, lines)) = current {
        candidates.push(candidate(Some(n), p, &lines));
    }
    candidates
}

fn split_paragraphs(pages: &[String]) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_no = idx as u32 + 1;
        let mut lines: Vec<String> = Vec::new();
        for line in page.lines().chain(std::iter::once("")) {
            if line.trim().is_empty() {
                if looks_like_problem(&lines) {
                    candidates.push(candidate(None, page_no, &lines));
                }
                lines.clear();
            } else {
                lines.push(line.trim().to_string());
            }
        }
    }
    candidates
}

fn looks_like_problem(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|l| l.chars().any(|c| c.is_ascii_digit() || c == '=' || c == '?'))
}

fn candidate(number: Option<u32>, page: u32, lines: &[String]) -> RawCandidate {
    // Trim blank lines at both ends, keep interior structure
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map(|i| i + 1).unwrap_or(start);
    RawCandidate {
        number,
        text: lines[start..end].join("\n"),
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_line_forms() {
        assert_eq!(numbered_line("1. Solve for x"), Some((1, "Solve for x")));
        assert_eq!(numbered_line("  12) Factor"), Some((12, "Factor")));
        assert_eq!(numbered_line("Question 3"), Some((3, "")));
        assert_eq!(numbered_line("Problem #4: Graph y = 2x"), Some((4, "Graph y = 2x")));
        assert_eq!(numbered_line("3.5x + 2 = 9"), None);
        assert_eq!(numbered_line("(1) 27"), None);
        assert_eq!(numbered_line("2024. Annual review"), None);
    }

    #[test]
    fn test_split_three_numbered_problems() {
        let text = "Name: ______  Date: ____\n\n1. Solve for x: 3x + 7 = 22\n2. Simplify 4(x - 2)\n   and state the coefficient.\n3. What is 5 squared?\n";
        let (candidates, _) = split_candidates(text, 3);

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].number, Some(1));
        assert_eq!(candidates[0].text, "Solve for x: 3x + 7 = 22");
        assert_eq!(candidates[1].text, "Simplify 4(x - 2)\nand state the coefficient.");
        assert_eq!(candidates[2].number, Some(3));
    }

    #[test]
    fn test_pages_follow_form_feeds() {
        let text = "1. first\n2. second\x0c3. third";
        let (candidates, _) = split_candidates(text, 0);
        let pages: Vec<u32> = candidates.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 1, 2]);
    }

    #[test]
    fn test_repeated_headers_are_stripped() {
        let page = |n: u32| format!("Algebra I Regents\n{}. Solve {}x = {}\nPage footer", n, n, n * 2);
        let text = [page(1), page(2), page(3)].join("\x0c");
        let (candidates, removed) = split_candidates(&text, 3);

        assert_eq!(removed, 6);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[2].text, "Solve 3x = 6");
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "Warm-up exercises\n\nSolve x + 4 = 9\n\nWhat is the slope of y = 3x?\n\nHave fun";
        let (candidates, _) = split_candidates(text, 3);

        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.number.is_none()));
        assert_eq!(candidates[0].text, "Solve x + 4 = 9");
    }

    #[test]
    fn test_no_problems() {
        let (candidates, _) = split_candidates("Just some words\n\nand more words", 3);
        assert!(candidates.is_empty());
    }
}
