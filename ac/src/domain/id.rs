//! Domain ID generation
//!
//! Worksheet IDs use the format: `{12-char-hex}-{slug}`
//! Example: `8f3a61c07b2e-unit-3-review`
//! The hex part is the random tail of a UUIDv7, so two loads of the same
//! document in the same millisecond still get different IDs.
//! Problem IDs are derived from the source numbering: `q{number}`, with a
//! `-{n}` suffix when a number repeats within one worksheet.

use serde::{Deserialize, Serialize};

/// Generate a worksheet ID from the document name
pub fn generate_id(title: &str) -> String {
    let simple = uuid::Uuid::now_v7().simple().to_string();
    let random_tail = &simple[simple.len() - 12..];
    let slug = slugify(title);
    if slug.is_empty() {
        random_tail.to_string()
    } else {
        format!("{}-{}", random_tail, slug)
    }
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Worksheet identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorksheetId(String);

impl WorksheetId {
    /// Create a fresh ID for a document with the given name
    pub fn new(title: &str) -> Self {
        Self(generate_id(title))
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorksheetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for WorksheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Problem identifier, unique within its worksheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(String);

impl ProblemId {
    /// ID for a problem with the given source number
    ///
    /// `occurrence` is 1 for the first problem carrying this number.
    pub fn for_number(number: u32, occurrence: u32) -> Self {
        if occurrence <= 1 {
            Self(format!("q{}", number))
        } else {
            Self(format!("q{}-{}", number, occurrence))
        }
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProblemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ProblemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single tutoring session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a fresh time-ordered session ID
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("Unit 3 Review.pdf");
        assert_eq!(&id[12..], "-unit-3-review-pdf");
        assert!(id[..12].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_id_empty_title() {
        let id = generate_id("!!!");
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn test_same_title_back_to_back_gets_distinct_ids() {
        let ids: std::collections::HashSet<String> = (0..256).map(|_| generate_id("hw.txt")).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn test_slugify_strips_apostrophes() {
        assert_eq!(slugify("Jennifer's Work"), "jennifers-work");
        assert_eq!(slugify("  a -- b  "), "a-b");
    }

    #[test]
    fn test_problem_id_for_number() {
        assert_eq!(ProblemId::for_number(3, 1).as_str(), "q3");
        assert_eq!(ProblemId::for_number(3, 2).as_str(), "q3-2");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
