//! Pattern heuristics over problem text

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{AnswerKind, Choice};

/// `Answer: 5`, `Ans - x = 3`
static ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?i:answer|ans)\s*[:.\-]\s*(.+?)\s*$").expect("answer regex is valid"));

/// `(1) ...` / `(A) ...` at the start of a line or after whitespace
static PAREN_CHOICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|\s)\(([1-4A-D])\)\s*").expect("choice regex is valid"));

/// `A) ...` / `A. ...` at the start of a line
static LETTER_CHOICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([A-D])[.)]\s+").expect("letter choice regex is valid"));

static DIAGRAM_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(graph|graphed|figure|diagram|chart|table|shown|below)\b").expect("diagram regex is valid")
});

/// Candidate equation: algebraic run, `=`, algebraic run
static EQUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9().^+\-*/ ]+=[A-Za-z0-9().^+\-*/ ]+").expect("equation regex is valid"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+(?:\.\d+)?(?:/\d+)?$").expect("number regex is valid"));

static NUMERIC_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(evaluate|calculate|compute|how many|how much|what is the value|find the value)\b")
        .expect("numeric cue regex is valid")
});

static EXPRESSION_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(solve|factor|simplify|expand|expression|equivalent|write an equation|rewrite)\b")
        .expect("expression cue regex is valid")
});

/// Remove answer-key lines, returning the remaining text and the answer
pub fn take_answer_line(text: &str) -> (String, Option<String>) {
    let mut expected = None;
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| match ANSWER_LINE.captures(line) {
            Some(caps) if expected.is_none() => {
                expected = Some(caps[1].to_string());
                false
            }
            Some(_) => false,
            None => true,
        })
        .collect();
    (kept.join("\n"), expected)
}

/// Split listed answer choices off the statement
///
/// Choices must start at `1`/`A` and run in order; fewer than two is not a
/// choice list and the text is returned untouched.
pub fn take_choices(text: &str) -> (String, Vec<Choice>) {
    for regex in [&*PAREN_CHOICE, &*LETTER_CHOICE] {
        let markers: Vec<(usize, usize, String)> = regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();

        if let Some(run) = ordered_run(&markers)
            && run.len() >= 2
        {
            let statement = text[..run[0].0].trim().to_string();
            let choices = run
                .iter()
                .enumerate()
                .map(|(i, (_, end, label))| {
                    let stop = run.get(i + 1).map(|next| next.0).unwrap_or(text.len());
                    Choice {
                        label: label.clone(),
                        text: collapse_whitespace(&text[*end..stop]),
                    }
                })
                .collect();
            return (statement, choices);
        }
    }
    (text.to_string(), Vec::new())
}

/// Longest in-order label run beginning at `1` or `A`
fn ordered_run(markers: &[(usize, usize, String)]) -> Option<Vec<(usize, usize, String)>> {
    let start = markers.iter().position(|(_, _, l)| l == "1" || l == "A")?;
    let mut run = vec![markers[start].clone()];
    for marker in &markers[start + 1..] {
        let prev = run.last()?.2.chars().next()?;
        let next = marker.2.chars().next()?;
        if next as u32 == prev as u32 + 1 {
            run.push(marker.clone());
        } else {
            break;
        }
    }
    Some(run)
}

/// The cue word if the statement refers to a figure
pub fn diagram_cue(statement: &str) -> Option<String> {
    DIAGRAM_CUE.find(statement).map(|m| m.as_str().to_lowercase())
}

/// First equation in the statement, without surrounding prose
pub fn find_equation(statement: &str) -> Option<String> {
    for m in EQUATION.find_iter(statement) {
        let (left, right) = m.as_str().split_once('=')?;
        let left = trim_prose(left, true);
        let right = trim_prose(right, false);
        if !left.is_empty() && !right.is_empty() {
            return Some(format!("{} = {}", left, right));
        }
    }
    None
}

/// Drop prose words (alphabetic, longer than one letter) from one end
fn trim_prose(side: &str, from_start: bool) -> String {
    let mut tokens: Vec<&str> = side.split_whitespace().collect();
    if from_start {
        let skip = tokens.iter().take_while(|t| is_prose(t)).count();
        tokens.drain(..skip);
    } else {
        let keep = tokens.len() - tokens.iter().rev().take_while(|t| is_prose(t)).count();
        tokens.truncate(keep);
    }
    tokens.join(" ")
}

fn is_prose(token: &str) -> bool {
    token.len() > 1 && token.chars().all(|c| c.is_ascii_alphabetic())
}

/// Classify the expected answer
pub fn classify_answer(statement: &str, choices: &[Choice], expected: Option<&str>) -> AnswerKind {
    if choices.len() >= 2 {
        return AnswerKind::MultipleChoice;
    }
    if let Some(expected) = expected {
        return if is_number(expected) {
            AnswerKind::Numeric
        } else {
            AnswerKind::Expression
        };
    }
    if NUMERIC_CUE.is_match(statement) {
        AnswerKind::Numeric
    } else if EXPRESSION_CUE.is_match(statement) {
        AnswerKind::Expression
    } else {
        AnswerKind::Unrecognized
    }
}

fn is_number(text: &str) -> bool {
    NUMBER.is_match(&canonical_answer(text))
}

/// Canonical form for exact answer comparison
///
/// Lowercase, no whitespace, unicode minus folded, trailing period dropped.
pub fn canonical_answer(text: &str) -> String {
    let folded: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{2212}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    folded.trim_end_matches('.').to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_answer_line() {
        let (text, expected) = take_answer_line("Solve 2x = 10\nAnswer: x = 5");
        assert_eq!(text, "Solve 2x = 10");
        assert_eq!(expected.as_deref(), Some("x = 5"));

        let (text, expected) = take_answer_line("What is 3 + 4?");
        assert_eq!(text, "What is 3 + 4?");
        assert!(expected.is_none());
    }

    #[test]
    fn test_take_inline_choices() {
        let (statement, choices) = take_choices("The expression 49x^2 - 36 is equivalent to\n(1) (7x - 6)^2 (2) (24.5x - 18)^2\n(3) (7x - 6)(7x + 6) (4) (24.5x - 18)(24.5x + 18)");
        assert_eq!(statement, "The expression 49x^2 - 36 is equivalent to");
        assert_eq!(choices.len(), 4);
        assert_eq!(choices[0].label, "1");
        assert_eq!(choices[0].text, "(7x - 6)^2");
        assert_eq!(choices[2].text, "(7x - 6)(7x + 6)");
    }

    #[test]
    fn test_take_letter_choices() {
        let (statement, choices) = take_choices("Which is a solution?\nA) 2\nB) 3\nC) 4");
        assert_eq!(statement, "Which is a solution?");
        assert_eq!(choices.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_parenthesized_numbers_are_not_choices() {
        let (statement, choices) = take_choices("Evaluate 2(4) + 1");
        assert_eq!(statement, "Evaluate 2(4) + 1");
        assert!(choices.is_empty());

        let (_, choices) = take_choices("Pick one (1) only");
        assert!(choices.is_empty());
    }

    #[test]
    fn test_find_equation() {
        assert_eq!(find_equation("Solve for x: 3x + 7 = 22").as_deref(), Some("3x + 7 = 22"));
        assert_eq!(find_equation("What is the slope of y = 3x?").as_deref(), Some("y = 3x"));
        assert_eq!(find_equation("Graph f(x) = 2x - 1 on the grid").as_deref(), Some("f(x) = 2x - 1"));
        assert_eq!(find_equation("Simplify 4(x - 2)"), None);
    }

    #[test]
    fn test_diagram_cue() {
        assert_eq!(diagram_cue("Use the graph shown below").as_deref(), Some("graph"));
        assert_eq!(diagram_cue("The TABLE lists values"), Some("table".to_string()));
        assert!(diagram_cue("Solve 2x = 4").is_none());
    }

    #[test]
    fn test_classify_answer() {
        let two = vec![
            Choice {
                label: "1".to_string(),
                text: "2".to_string(),
            },
            Choice {
                label: "2".to_string(),
                text: "3".to_string(),
            },
        ];
        assert_eq!(classify_answer("Which?", &two, None), AnswerKind::MultipleChoice);
        assert_eq!(classify_answer("Solve 2x = 10", &[], Some("x = 5")), AnswerKind::Expression);
        assert_eq!(classify_answer("Solve 2x = 10", &[], Some("\u{2212}5")), AnswerKind::Numeric);
        assert_eq!(classify_answer("Evaluate 2(4) + 1", &[], None), AnswerKind::Numeric);
        assert_eq!(classify_answer("Factor x^2 - 9", &[], None), AnswerKind::Expression);
        assert_eq!(classify_answer("Describe the pattern", &[], None), AnswerKind::Unrecognized);
    }

    #[test]
    fn test_canonical_answer() {
        assert_eq!(canonical_answer(" X = 5. "), "x=5");
        assert_eq!(canonical_answer("\u{2212}3 / 4"), "-3/4");
    }
}
