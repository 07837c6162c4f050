//! Tolerant parsing of LLM responses.
//!
//! Models asked for JSON often wrap it in prose, fence it in a markdown code
//! block, or leave trailing commas behind. Every entry point here tries a
//! series of recovery strategies and, if all of them fail, logs a warning
//! and returns an empty result. A parse failure never reaches the caller.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::ReasoningError;

/// What the model made of one observation candidate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObservationNote {
    /// The subject the note is about.
    pub guid: String,
    /// Natural-language summary of what the subject is doing.
    #[serde(default, alias = "summary")]
    pub summary_of_activity: Option<String>,
    /// How much the observer cares, usually on a 1-10 scale.
    #[serde(default, deserialize_with = "lenient_importance")]
    pub importance: Option<i64>,
}

/// Parse the observation response: a list of
/// `{guid, summary_of_activity, importance}` objects.
///
/// Entries that do not match the shape are skipped individually.
pub fn parse_observation_notes(raw: &str) -> Vec<ObservationNote> {
    parse_list(raw)
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ObservationNote>(item) {
            Ok(note) => Some(note),
            Err(e) => {
                warn!(error = %e, "skipping malformed observation note");
                None
            }
        })
        .collect()
}

/// Parse the reaction response: a list of action options, passed through
/// to the simulation as-is.
pub fn parse_action_options(raw: &str) -> Vec<Value> {
    parse_list(raw)
}

/// Recover a JSON list from the response.
///
/// An object holding a single list (`{"options": [...]}`) is unwrapped; any
/// other object is treated as a one-element list.
fn parse_list(raw: &str) -> Vec<Value> {
    match recover_json::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(map)) => {
            let mut lists = map.values().filter_map(Value::as_array);
            match (lists.next(), lists.next()) {
                (Some(only), None) => only.clone(),
                _ => vec![Value::Object(map)],
            }
        }
        Ok(other) => {
            warn!(response = %other, "LLM response is not a list, treating as empty");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, raw_response = raw, "failed to parse LLM response, treating as empty");
            Vec::new()
        }
    }
}

/// Deserialize the response through each recovery strategy in turn:
/// the trimmed text, the contents of a markdown code block, then both of
/// those with trailing commas removed.
pub fn recover_json<T: DeserializeOwned>(raw: &str) -> Result<T, ReasoningError> {
    let trimmed = raw.trim();
    let fenced = extract_json_from_codeblock(trimmed);

    let candidates = [Some(trimmed), fenced].into_iter().flatten();
    for candidate in candidates.clone() {
        if let Ok(parsed) = serde_json::from_str::<T>(candidate) {
            return Ok(parsed);
        }
    }
    for candidate in candidates {
        if let Ok(parsed) = serde_json::from_str::<T>(&strip_trailing_commas(candidate)) {
            return Ok(parsed);
        }
    }

    Err(ReasoningError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Extract the body of the first markdown code block, with or without a
/// language tag.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let (_, after_fence) = text.split_once("```")?;
    // The rest of the opening fence line is the language tag.
    let body = match after_fence.split_once('\n') {
        Some((_tag, body)) => body,
        None => after_fence,
    };
    let (inner, _) = body.split_once("```")?;
    Some(inner.trim())
}

/// Remove commas that directly precede a closing brace or bracket, leaving
/// string literals untouched.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let rest = chars.clone().find(|n| !n.is_whitespace());
                if !matches!(rest, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Accept importance as an integer, a float, or a numeric string.
fn lenient_importance<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|i| i.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX))
            .or_else(|| n.as_f64().and_then(round_importance)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().and_then(round_importance),
        _ => None,
    })
}

/// Importance range kept; model output beyond it is clamped.
const IMPORTANCE_MIN: i64 = -1_000_000;
const IMPORTANCE_MAX: i64 = 1_000_000;

/// Round a fractional importance. Non-finite values are dropped.
fn round_importance(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    // Both bounds are exactly representable as f64 and well inside i64.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let rounded = f
        .round()
        .clamp(IMPORTANCE_MIN as f64, IMPORTANCE_MAX as f64) as i64;
    Some(rounded)
}
