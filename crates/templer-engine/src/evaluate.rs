//! Recursive evaluation of variable blocks
//!
//! Variable values may themselves be templates (`image: "{{ registry }}/web"`).
//! Every string is rendered against the variables resolved so far and the
//! output is parsed back into a typed value, so `"{{ replicas * 2 }}"` becomes
//! an integer and `"{{ [a, b] }}"` a list. Values that render to the omit
//! sentinel are dropped from their parent.

use templer_core::{Mapping, Scalar, Value, deep_merge};

use crate::engine::Engine;
use crate::error::TemplateError;
use crate::filters::parse_bool_word;
use crate::omit::OmitSentinel;

impl Engine {
    /// Evaluate one value against `context`
    ///
    /// Returns `None` when the value rendered to the omit sentinel. `origin`
    /// names the variable source in error messages.
    pub fn evaluate(
        &self,
        value: &Value,
        context: &Mapping,
        origin: &str,
    ) -> Result<Option<Value>, TemplateError> {
        match value {
            Value::Scalar(Scalar::String(text)) => {
                let rendered = self.render_str(text, context, origin)?;
                if rendered == *text {
                    Ok(Some(value.clone()))
                } else if self.omit().is_in(&rendered) {
                    Ok(None)
                } else {
                    Ok(Some(parse_literal(&rendered)))
                }
            }
            Value::Scalar(_) => Ok(Some(value.clone())),
            Value::Sequence(items) => {
                let mut evaluated = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = self.evaluate(item, context, origin)? {
                        evaluated.push(item);
                    }
                }
                Ok(Some(Value::Sequence(evaluated)))
            }
            Value::Mapping(map) => self
                .evaluate_mapping(map, context, origin)
                .map(|map| Some(Value::Mapping(map))),
        }
    }

    /// Evaluate every value of `source` against `context`, dropping omitted keys
    pub fn evaluate_mapping(
        &self,
        source: &Mapping,
        context: &Mapping,
        origin: &str,
    ) -> Result<Mapping, TemplateError> {
        let mut evaluated = Mapping::with_capacity(source.len());
        for (key, value) in source {
            match self.evaluate(value, context, origin)? {
                Some(value) => {
                    evaluated.insert(key.clone(), value);
                }
                None => tracing::debug!("Omitting variable '{}' from {}", key, origin),
            }
        }
        Ok(evaluated)
    }

    /// Evaluate a variable block on top of `base`
    ///
    /// Keys are evaluated in order and each result is merged into the
    /// accumulated mapping before the next key is rendered, so a value may
    /// reference the keys above it in the same block. Values nested inside a
    /// key see the mapping as it was when that key started.
    pub fn evaluate_onto(
        &self,
        block: &Mapping,
        base: Mapping,
        origin: &str,
    ) -> Result<Mapping, TemplateError> {
        let mut resolved = base;
        for (key, value) in block {
            match self.evaluate(value, &resolved, origin)? {
                Some(value) => deep_merge(&mut resolved, Mapping::from([(key.clone(), value)])),
                None => tracing::debug!("Omitting variable '{}' from {}", key, origin),
            }
        }
        Ok(resolved)
    }
}

/// Parse rendered text into a typed value
///
/// Integers, floats, flow-style lists and dicts, quoted strings, `None` and
/// boolean words are recognized; anything else stays the (untrimmed) text.
pub fn parse_literal(text: &str) -> Value {
    let trimmed = text.trim();

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Scalar(Scalar::Int(i));
    }

    if looks_like_float(trimmed) {
        if let Ok(f) = trimmed.replace('_', "").parse::<f64>() {
            return Value::Scalar(Scalar::Float(f));
        }
    }

    if let Some(value) = parse_flow(trimmed) {
        return value;
    }

    if trimmed == "None" {
        return Value::NULL;
    }

    if let Some(b) = parse_bool_word(trimmed) {
        return Value::Scalar(Scalar::Bool(b));
    }

    Value::string(text)
}

fn looks_like_float(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | '_'))
}

/// Flow-style YAML whose type matches its opening character
fn parse_flow(text: &str) -> Option<Value> {
    let first = text.chars().next()?;
    if !matches!(first, '[' | '{' | '\'' | '"') {
        return None;
    }

    let parsed: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    let matches_kind = match first {
        '[' => parsed.is_sequence(),
        '{' => parsed.is_mapping(),
        _ => parsed.is_string(),
    };
    matches_kind.then(|| Value::from(parsed))
}

/// Recursively remove every string carrying the omit sentinel
///
/// Strings are dropped from their parent sequence or mapping. Returns `None`
/// when `value` itself is omitted.
pub fn strip_omitted(value: serde_yaml::Value, omit: &OmitSentinel) -> Option<serde_yaml::Value> {
    match value {
        serde_yaml::Value::String(s) if omit.is_in(&s) => None,
        serde_yaml::Value::Sequence(items) => Some(serde_yaml::Value::Sequence(
            items
                .into_iter()
                .filter_map(|item| strip_omitted(item, omit))
                .collect(),
        )),
        serde_yaml::Value::Mapping(map) => Some(serde_yaml::Value::Mapping(
            map.into_iter()
                .filter_map(|(key, value)| {
                    let key = strip_omitted(key, omit)?;
                    strip_omitted(value, omit).map(|value| (key, value))
                })
                .collect(),
        )),
        serde_yaml::Value::Tagged(mut tagged) => {
            tagged.value = strip_omitted(tagged.value, omit)?;
            Some(serde_yaml::Value::Tagged(tagged))
        }
        other => Some(other),
    }
}
