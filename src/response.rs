//! Turning a generation reply back into typed data.
//!
//! Replies are parsed by an ordered chain of strategies; the first one that
//! yields an array wins. Elements are then validated one at a time, so a
//! single bad element never poisons the rest.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

const URL_KEYS: [&str; 3] = ["url", "URL", "Url"];
const SCORE_KEYS: [&str; 3] = ["score", "SCORE", "Score"];

/// Outcome of parsing a whole reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The reply contained an array; its raw elements, in order.
    Parsed(Vec<Value>),
    Unparsable,
}

type Strategy = fn(&str) -> Option<Vec<Value>>;

const STRATEGIES: [Strategy; 2] = [strict_array, bracketed_array];

/// Run the parse strategies in order:
/// 1. the whole reply as a JSON array;
/// 2. the span from the first `[` to the last `]`, as JSON or as a lenient
///    array literal.
pub fn parse_reply(text: &str) -> ParseOutcome {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(text))
        .map_or(ParseOutcome::Unparsable, ParseOutcome::Parsed)
}

fn strict_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str(text.trim()) {
        Ok(Value::Array(elements)) => Some(elements),
        _ => None,
    }
}

fn bracketed_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    let span = &text[start..=end];
    strict_array(span).or_else(|| strict_array(&normalize_literal(span)?))
}

/// Rewrite a loosely written array literal into JSON.
///
/// Handles single-quoted strings, `True`/`False`/`None`, and trailing
/// commas. Returns `None` for an unterminated string.
fn normalize_literal(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                out.push('"');
                let mut closed = false;
                while let Some(s) = chars.next() {
                    match s {
                        '\\' => {
                            let escaped = chars.next()?;
                            if escaped == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(escaped);
                            }
                        }
                        q if q == c => {
                            closed = true;
                            break;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            ']' | '}' => {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() && next != '_' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }

    Some(out)
}

/// A URL/score pair asserted by the model. Not yet trusted: the URL still
/// has to be matched against the candidates that were sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Rescore {
    pub url: String,
    pub score: f32,
}

/// Validate one reply element.
pub fn extract_rescore(element: &Value) -> Result<Rescore> {
    let obj = element
        .as_object()
        .ok_or_else(|| Error::ResponseParse("element is not an object".into()))?;

    let url = match lookup(obj, &URL_KEYS) {
        Some(Value::String(url)) if !url.trim().is_empty() => url.trim().to_string(),
        Some(_) => return Err(Error::ResponseParse("url is not a string".into())),
        None => return Err(Error::ResponseParse("element has no url".into())),
    };

    let score = match lookup(obj, &SCORE_KEYS) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => {
            return Err(Error::ResponseParse(format!("no score for {url}")));
        }
    }
    .ok_or_else(|| Error::ResponseParse(format!("score for {url} is not a number")))?;

    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(Error::ResponseParse(format!(
            "score {score} for {url} is outside [0, 1]"
        )));
    }

    Ok(Rescore {
        url,
        score: score as f32,
    })
}

/// First present, non-null value among `keys`.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}
