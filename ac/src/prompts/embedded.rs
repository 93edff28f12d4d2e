//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

/// Answer-judging prompt; asks for a JSON verdict
pub const EVALUATE: &str = include_str!("../../prompts/evaluate.pmt");

/// Stage-shaped hint prompt
pub const HINT: &str = include_str!("../../prompts/hint.pmt");

/// Answers a free-form question without judging it
pub const ASK: &str = include_str!("../../prompts/ask.pmt");

/// Worked answer for a student who gives up
pub const REVEAL: &str = include_str!("../../prompts/reveal.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "evaluate" => Some(EVALUATE),
        "hint" => Some(HINT),
        "ask" => Some(ASK),
        "reveal" => Some(REVEAL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_evaluate() {
        let evaluate = get_embedded("evaluate").unwrap();
        assert!(evaluate.contains("\"correct\""));
        assert!(evaluate.contains("{{problem}}"));
    }

    #[test]
    fn test_get_embedded_hint() {
        let hint = get_embedded("hint").unwrap();
        assert!(hint.contains("stage_final_push"));
        assert!(hint.contains("{{hint_number}}"));
    }

    #[test]
    fn test_get_embedded_reveal() {
        let reveal = get_embedded("reveal").unwrap();
        assert!(reveal.contains("{{#if expected}}"));
        assert!(get_embedded("ask").unwrap().contains("question"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
