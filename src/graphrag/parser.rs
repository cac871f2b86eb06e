//! Tolerant parser for extraction model output.
//!
//! The model is asked for an `offense-tuples/v1` JSON array of 4-string
//! arrays, but responses often wrap it in prose or code fences, or fall back
//! to Python tuple literals. The parser locates every top-level list whose
//! first element is a record, evaluates it, and validates every record.
//! A list holding any bad record is dropped whole, with one error per bad
//! record; other lists in the same response are unaffected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::analysis::models::OffenseTuple;

/// Start of a list of records (or an empty list).
static LIST_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(?:[\[\(]|\])").expect("valid list start pattern"));

const FIELDS: [&str; 4] = ["offense", "chapter", "section", "punishment"];

/// Why a single record was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RecordError {
    #[error("record {index}: expected 4 fields, found {found}")]
    WrongArity { index: usize, found: usize },

    #[error("record {index}: field `{field}` is not a string")]
    NonStringField { index: usize, field: &'static str },

    #[error("record {index}: field `{field}` is empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("record {index}: not a list or tuple")]
    NotARecord { index: usize },
}

/// Why a whole candidate list was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum CandidateError {
    #[error("list at byte {offset} is never closed")]
    Unterminated { offset: usize },

    #[error("list at byte {offset} is not a valid literal: {reason}")]
    Invalid { offset: usize, reason: String },
}

/// Result of parsing one model response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub tuples: Vec<OffenseTuple>,
    pub rejected: Vec<RecordError>,
    pub invalid: Vec<CandidateError>,
}

impl ParseReport {
    /// True when nothing was dropped.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.invalid.is_empty()
    }
}

/// Parse every record list found in `text`.
pub fn parse_tuples(text: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut pos = 0;

    while let Some(m) = LIST_START.find_at(text, pos) {
        let offset = m.start();
        let Some(end) = matching_bracket(text, offset) else {
            report.invalid.push(CandidateError::Unterminated { offset });
            break;
        };

        let candidate = &text[offset..end];
        match serde_json::from_str::<Vec<Value>>(&normalize_literal(candidate)) {
            Ok(records) => {
                let (valid, errors): (Vec<_>, Vec<_>) = records
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| validate_record(index, record))
                    .partition(|r| r.is_ok());

                // A list with any bad record is discarded whole.
                if errors.is_empty() {
                    report.tuples.extend(valid.into_iter().flatten());
                } else {
                    report
                        .rejected
                        .extend(errors.into_iter().filter_map(|r| r.err()));
                }
            }
            Err(err) => report.invalid.push(CandidateError::Invalid {
                offset,
                reason: err.to_string(),
            }),
        }

        pos = end;
    }

    report
}

fn validate_record(index: usize, record: Value) -> Result<OffenseTuple, RecordError> {
    let Value::Array(items) = record else {
        return Err(RecordError::NotARecord { index });
    };
    if items.len() != FIELDS.len() {
        return Err(RecordError::WrongArity {
            index,
            found: items.len(),
        });
    }

    let mut fields = Vec::with_capacity(FIELDS.len());
    for (value, field) in items.into_iter().zip(FIELDS) {
        let Value::String(s) = value else {
            return Err(RecordError::NonStringField { index, field });
        };
        let s = s.trim();
        if s.is_empty() {
            return Err(RecordError::EmptyField { index, field });
        }
        fields.push(s.to_string());
    }

    let [offense, chapter, section, punishment]: [String; 4] = fields
        .try_into()
        .map_err(|_| RecordError::WrongArity { index, found: 0 })?;
    Ok(OffenseTuple::new(offense, chapter, section, punishment))
}

/// Byte index just past the bracket closing the one at `start`.
fn matching_bracket(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Rewrite Python list/tuple literal syntax as JSON.
///
/// Parentheses become brackets, single-quoted strings become double-quoted
/// strings and trailing commas are dropped. Double-quoted strings are copied
/// unchanged.
pub fn normalize_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                let mut escaped = false;
                for c in chars.by_ref() {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(other) => {
                                out.push('\\');
                                out.push(other);
                            }
                            None => out.push('\\'),
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            '(' => out.push('['),
            ')' => out.push(']'),
            ',' => {
                let rest = chars.clone().find(|c| !c.is_whitespace());
                if !matches!(rest, Some(']') | Some(')')) {
                    out.push(',');
                }
            }
            other => out.push(other),
        }
    }

    out
}
