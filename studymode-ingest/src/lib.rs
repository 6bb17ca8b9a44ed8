//! Turns raw generator output into question/answer pairs.
//!
//! Generator text is untrusted: it may be a clean JSON array, a JSON array
//! buried in prose or a fenced block, or plain `Q: ... / A: ...` lines.
//! Each format is tried in that order. Individual entries with a missing or
//! empty side are dropped; only an input with no usable pair at all fails.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

pub type Pair = (String, String);

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("generator output is empty")]
    Empty,
    #[error("no question/answer pairs found in generator output")]
    NoPairs { raw: String },
}

impl ParseError {
    /// The text that failed to parse, kept for diagnostics.
    pub fn raw(&self) -> Option<&str> {
        match self {
            ParseError::Empty => None,
            ParseError::NoPairs { raw } => Some(raw),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    JsonArray,
    EmbeddedJson,
    QaLines,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parsed {
    pub format: Format,
    pub pairs: Vec<Pair>,
    /// Entries that were recognised but had a missing or empty side.
    pub dropped: usize,
}

pub fn parse_generated(text: &str) -> Result<Parsed, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let parsed = parse_json_array(trimmed)
        .map(|(pairs, dropped)| Parsed { format: Format::JsonArray, pairs, dropped })
        .or_else(|| {
            embedded_arrays(trimmed).find_map(|candidate| {
                parse_json_array(candidate)
                    .map(|(pairs, dropped)| Parsed { format: Format::EmbeddedJson, pairs, dropped })
            })
        })
        .unwrap_or_else(|| {
            let (pairs, dropped) = parse_qa_lines(trimmed);
            Parsed { format: Format::QaLines, pairs, dropped }
        });

    if parsed.dropped > 0 {
        warn!(dropped = parsed.dropped, "generator output had incomplete entries");
    }
    if parsed.pairs.is_empty() {
        return Err(ParseError::NoPairs { raw: text.to_string() });
    }
    debug!(format = ?parsed.format, pairs = parsed.pairs.len(), "parsed generator output");
    Ok(parsed)
}

fn parse_json_array(text: &str) -> Option<(Vec<Pair>, usize)> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) else {
        return None;
    };
    let mut pairs = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in &items {
        match (field(item, &["q", "question"]), field(item, &["a", "answer"])) {
            (Some(q), Some(a)) => pairs.push((q, a)),
            _ => dropped += 1,
        }
    }
    Some((pairs, dropped))
}

fn field(item: &Value, keys: &[&str]) -> Option<String> {
    let v = keys.iter().find_map(|k| item.get(*k))?;
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn fenced_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(\[.*?\])\s*```").expect("fenced block pattern"))
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("bracket pattern"))
}

fn qa_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*]\s+|\d+[.)]\s+)?\**([QqAa])\**\s*:\s*\**\s*(.*)$").expect("q/a line pattern")
    })
}

/// Array-looking slices of `text`, fenced blocks first, then the widest
/// bracketed span.
fn embedded_arrays(text: &str) -> impl Iterator<Item = &str> {
    fenced_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .chain(bracket_re().find(text).map(|m| m.as_str()))
}

fn parse_qa_lines(text: &str) -> (Vec<Pair>, usize) {
    let mut pairs = Vec::new();
    let mut dropped = 0;
    let mut question: Option<String> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(caps) = qa_line_re().captures(line) else {
            continue;
        };
        let body = caps[2].trim().to_string();
        match &caps[1] {
            "Q" | "q" => {
                if question.replace(body).is_some() {
                    dropped += 1;
                }
            }
            _ => match question.take() {
                Some(q) if !q.is_empty() && !body.is_empty() => pairs.push((q, body)),
                _ => dropped += 1,
            },
        }
    }
    if question.is_some() {
        dropped += 1;
    }
    (pairs, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(q: &str, a: &str) -> Pair {
        (q.to_string(), a.to_string())
    }

    #[test]
    fn clean_json_array() {
        let out = parse_generated(r#"[{"q":"What is H2O?","a":"Water"},{"q":"2+2","a":4}]"#).unwrap();
        assert_eq!(out.format, Format::JsonArray);
        assert_eq!(out.pairs, vec![pair("What is H2O?", "Water"), pair("2+2", "4")]);
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn long_keys_and_incomplete_entries() {
        let raw = r#"[{"question":"Capital of Chile?","answer":"Santiago"},{"q":"lonely"},{"q":"","a":"x"},"junk"]"#;
        let out = parse_generated(raw).unwrap();
        assert_eq!(out.pairs, vec![pair("Capital of Chile?", "Santiago")]);
        assert_eq!(out.dropped, 3);
    }

    #[test]
    fn array_inside_prose() {
        let raw = "Sure! Here are your flashcards:\n[{\"q\": \"Largest planet?\", \"a\": \"Jupiter\"}]\nGood luck!";
        let out = parse_generated(raw).unwrap();
        assert_eq!(out.format, Format::EmbeddedJson);
        assert_eq!(out.pairs, vec![pair("Largest planet?", "Jupiter")]);
    }

    #[test]
    fn array_in_fenced_block() {
        let raw = "Here you go [see below]\n```json\n[{\"q\": \"Speed of light?\", \"a\": \"~3e8 m/s\"}]\n```";
        let out = parse_generated(raw).unwrap();
        assert_eq!(out.format, Format::EmbeddedJson);
        assert_eq!(out.pairs.len(), 1);
    }

    #[test]
    fn qa_lines() {
        let raw = "1. Q: What is photosynthesis?\nA: Turning light into chemical energy.\n\n**Q:** Who wrote Hamlet?\n**A:** Shakespeare\nQ: dangling";
        let out = parse_generated(raw).unwrap();
        assert_eq!(out.format, Format::QaLines);
        assert_eq!(
            out.pairs,
            vec![
                pair("What is photosynthesis?", "Turning light into chemical energy."),
                pair("Who wrote Hamlet?", "Shakespeare"),
            ]
        );
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn failures_keep_raw_text() {
        assert!(matches!(parse_generated("   \n"), Err(ParseError::Empty)));
        let err = parse_generated("I could not make flashcards today.").unwrap_err();
        assert_eq!(err.raw(), Some("I could not make flashcards today."));
        assert!(matches!(parse_generated("[]"), Err(ParseError::NoPairs { .. })));
    }
}
