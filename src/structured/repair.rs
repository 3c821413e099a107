//! Response normalization: turn whatever a model sent back into one canonical JSON object.
//!
//! Valid JSON objects pass through untouched apart from compact re-serialization (key
//! order is preserved). Anything else gets exactly one repair pass and one more parse
//! attempt. The repairs, in order:
//!
//! 1. take the body of the first markdown code fence, closed or not, when that fence
//!    holds the reply's first `{`
//! 2. start at the first `{` and stop where that object closes, dropping commentary
//! 3. escape quotes inside strings that are not followed by `,` `:` `}` `]` or the end
//! 4. escape raw newlines and tabs inside strings
//! 5. drop trailing commas before a closer
//! 6. close an unterminated string, then any containers still open
//!
//! If the repaired text still does not parse into an object, the caller gets
//! [`Error::MalformedResponse`]. Nothing here exits or prints.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::error::{summarize, ValidationError};
use super::schema::PlanSchema;
use super::validator::PlanValidator;
use crate::error::Error;

/// Body of a code fence; an unterminated fence runs to the end of the text.
static FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)(?:```|\z)").ok());

/// Normalizes raw model replies, optionally checking them against a plan schema.
#[derive(Debug, Default)]
pub struct Normalizer {
    validator: Option<PlanValidator>,
}

impl Normalizer {
    /// Shape-agnostic normalizer: any JSON object is accepted.
    pub fn new() -> Self {
        Self { validator: None }
    }

    /// Normalizer that also rejects objects violating `plan`.
    pub fn with_schema(plan: PlanSchema) -> Result<Self, Error> {
        Ok(Self {
            validator: Some(PlanValidator::new(plan)?),
        })
    }

    /// Normalizer that checks against the single-step form of `plan`.
    pub fn with_single_step_schema(plan: PlanSchema) -> Result<Self, Error> {
        Ok(Self {
            validator: Some(PlanValidator::single_step(plan)?),
        })
    }

    /// Canonical compact JSON string for `raw`.
    pub fn normalize(&self, raw: &str) -> Result<String, Error> {
        let value = self.normalize_value(raw)?;
        Ok(serde_json::to_string(&value)?)
    }

    /// Same as [`normalize`](Self::normalize) for a reply the provider already parsed.
    pub fn normalize_json(&self, value: Value) -> Result<String, Error> {
        let raw = value.to_string();
        let value = self.accept(value, &raw)?;
        Ok(serde_json::to_string(&value)?)
    }

    pub fn normalize_value(&self, raw: &str) -> Result<Value, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::malformed("empty response", raw));
        }

        match serde_json::from_str::<Value>(trimmed) {
            // A JSON string holding the real payload (double-encoded replies)
            Ok(Value::String(inner)) => self.repair_and_accept(&inner, raw),
            Ok(value) => self.accept(value, raw),
            Err(_) => self.repair_and_accept(trimmed, raw),
        }
    }

    fn repair_and_accept(&self, text: &str, raw: &str) -> Result<Value, Error> {
        let candidate = strip_code_fence(text);
        let repaired = repair_structure(candidate)
            .ok_or_else(|| Error::malformed("no JSON object found", raw))?;
        tracing::debug!(
            raw_len = raw.len(),
            repaired_len = repaired.len(),
            "model reply was not valid JSON; applied repair"
        );
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => self.accept(value, raw),
            Err(e) => Err(Error::malformed(format!("unparseable after repair: {}", e), raw)),
        }
    }

    fn accept(&self, value: Value, raw: &str) -> Result<Value, Error> {
        if !value.is_object() {
            return Err(Error::malformed("expected a JSON object", raw));
        }
        if let Some(validator) = &self.validator {
            let errors: Vec<ValidationError> = validator.violations(&value);
            if !errors.is_empty() {
                return Err(Error::malformed(
                    format!("{} plan schema violated: {}", validator.label(), summarize(&errors)),
                    raw,
                ));
            }
        }
        Ok(value)
    }
}

/// Normalize with no schema check.
pub fn normalize(raw: &str) -> Result<String, Error> {
    Normalizer::new().normalize(raw)
}

/// Fence body if the fence opens before the first `{` and wraps an object.
///
/// A fence that only appears in trailing commentary leaves the text as it is.
fn strip_code_fence(text: &str) -> &str {
    let Some(re) = FENCE.as_ref() else {
        return text;
    };
    let Some(caps) = re.captures(text) else {
        return text;
    };
    let (Some(fence), Some(body)) = (caps.get(0), caps.get(1)) else {
        return text;
    };
    let object_start = text.find('{');
    let wraps_first_object =
        body.as_str().contains('{') && object_start.map_or(false, |start| fence.start() < start);
    if wraps_first_object {
        body.as_str().trim()
    } else {
        text
    }
}

/// Single string-aware pass over the text starting at the first `{`.
fn repair_structure(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let chars: Vec<char> = text[start..].chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' if closes_string(&chars[i + 1..]) => {
                    out.push(c);
                    in_string = false;
                }
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                // mismatched closers are dropped
                if closers.last() == Some(&c) {
                    strip_trailing_comma(&mut out);
                    closers.pop();
                    out.push(c);
                    if closers.is_empty() {
                        return Some(out);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = closers.pop() {
        strip_trailing_comma(&mut out);
        out.push(closer);
    }
    Some(out)
}

fn closes_string(rest: &[char]) -> bool {
    match rest.iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ',' | ':' | '}' | ']'),
    }
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
