//! Template filters
//!
//! These filters extend MiniJinja with the Ansible-style helpers compose
//! templates rely on.

use minijinja::value::{Kwargs, Rest, ValueKind};
use minijinja::{Error, ErrorKind, Value};
use regex::Regex;
use serde::Serialize;

use crate::error::MandatoryValueError;

/// Fail the render when a value is undefined, none or an empty string
///
/// Usage: {{ db_password | mandatory("db_password must be set") }}
pub fn mandatory(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);

    if missing {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Mandatory variable is not defined".to_string());
        return Err(Error::new(ErrorKind::InvalidOperation, message.clone())
            .with_source(MandatoryValueError { message }));
    }

    Ok(value)
}

/// Convert a value to YAML
///
/// Usage: {{ environment | to_yaml }}
pub fn to_yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value).map_err(invalid_operation)
}

/// Convert a value to block-style YAML indented by `indent` spaces (default 4)
///
/// Usage: {{ services | to_nice_yaml(2) }}
pub fn to_nice_yaml(value: Value, indent: Option<usize>) -> Result<String, Error> {
    let yaml = to_yaml(value)?;
    let indent = indent.unwrap_or(4);
    if indent == 2 {
        return Ok(yaml);
    }

    // serde_yaml always indents nested levels by two spaces
    let reindented = yaml
        .lines()
        .map(|line| {
            let depth = line.len() - line.trim_start_matches(' ').len();
            let content = line.trim_start_matches(' ');
            format!("{}{}", " ".repeat(depth / 2 * indent + depth % 2), content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!("{}\n", reindented))
}

/// Convert a value to single-line JSON with `", "` and `": "` separators
///
/// Usage: {{ labels | to_json }}
pub fn to_json(value: Value) -> Result<String, Error> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, SpacedFormatter);
    value.serialize(&mut serializer).map_err(invalid_operation)?;
    String::from_utf8(buffer).map_err(invalid_operation)
}

/// Convert a value to indented JSON with sorted keys
///
/// Usage: {{ config | to_nice_json }}
pub fn to_nice_json(value: Value, indent: Option<usize>) -> Result<String, Error> {
    // serde_json::Map without `preserve_order` sorts keys
    let json: serde_json::Value = serde_json::to_value(&value).map_err(invalid_operation)?;

    let indent = " ".repeat(indent.unwrap_or(4));
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    json.serialize(&mut serializer).map_err(invalid_operation)?;
    String::from_utf8(buffer).map_err(invalid_operation)
}

/// Compact JSON formatter that keeps a space after separators
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Interpret common boolean spellings (`yes`, `on`, `1`, `false`, ...)
pub fn parse_bool_word(word: &str) -> Option<bool> {
    match word.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Convert a value to a boolean
///
/// Usage: {{ 'yes' | to_bool }} or {{ value | to_bool(default_value=false) }}
pub fn to_bool(value: Value, kwargs: Kwargs) -> Result<bool, Error> {
    let default: Option<bool> = kwargs.get("default_value")?;
    kwargs.assert_all_used()?;

    let parsed = match value.kind() {
        ValueKind::Bool => Some(value.is_true()),
        ValueKind::String => value.as_str().and_then(parse_bool_word),
        ValueKind::Number => match value.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed.or(default).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("Value '{}' can not be converted to bool", value),
        )
    })
}

fn invalid_operation(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid regular expression '{}': {}", pattern, e),
        )
    })
}

/// Escape regular expression metacharacters
///
/// Usage: {{ '[foo](bar)' | regex_escape }}
#[must_use]
pub fn regex_escape(value: String) -> String {
    regex::escape(&value)
}

/// All matches of `pattern`; the first capture group when the pattern has one
///
/// Usage: {{ 'Lorem ipsum dolor sit amet' | regex_findall('[ae]m') }}
pub fn regex_findall(value: String, pattern: String) -> Result<Vec<String>, Error> {
    let re = compile(&pattern)?;
    let found = if re.captures_len() > 1 {
        re.captures_iter(&value)
            .map(|caps| caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect()
    } else {
        re.find_iter(&value).map(|m| m.as_str().to_string()).collect()
    };
    Ok(found)
}

/// Replace every match of `pattern`; `\1` style back references are supported
///
/// Usage: {{ 'foobar' | regex_replace('^foo', 'Cocktail') }}
pub fn regex_replace(value: String, pattern: String, replacement: String) -> Result<String, Error> {
    let re = compile(&pattern)?;
    let backref = Regex::new(r"\\(\d+)").map_err(invalid_operation)?;
    let replacement = backref.replace_all(&replacement, "$${${1}}");
    Ok(re.replace_all(&value, replacement.as_ref()).into_owned())
}

/// First match of `pattern`, or the requested groups (`'\\1'`, `'\\g<name>'`)
///
/// Returns none when nothing matches.
///
/// Usage: {{ 'Lorem ipsum' | regex_search('ip(\S+)', '\\1') }}
pub fn regex_search(value: String, pattern: String, groups: Rest<String>) -> Result<Value, Error> {
    let re = compile(&pattern)?;
    let Some(caps) = re.captures(&value) else {
        return Ok(Value::from(()));
    };

    if groups.is_empty() {
        return Ok(Value::from(caps.get(0).map(|m| m.as_str()).unwrap_or_default()));
    }

    let selected = groups
        .iter()
        .map(|group| {
            let named = group.strip_prefix("\\g<").and_then(|g| g.strip_suffix('>'));
            let m = if let Some(name) = named {
                caps.name(name)
            } else if let Some(index) = group.strip_prefix('\\') {
                index.parse::<usize>().ok().and_then(|i| caps.get(i))
            } else {
                caps.name(group)
            };
            m.map(|m| m.as_str().to_string()).unwrap_or_default()
        })
        .collect::<Vec<_>>();

    Ok(Value::from(selected))
}

/// Whether `pattern` matches anywhere in the value
///
/// Usage: {{ image | regex_contains(':latest$') }}
pub fn regex_contains(value: String, pattern: String) -> Result<bool, Error> {
    Ok(compile(&pattern)?.is_match(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::Environment;

    fn env() -> Environment<'static> {
        let mut env = Environment::new();
        env.add_filter("to_bool", to_bool);
        env.add_filter("regex_search", regex_search);
        env.add_filter("to_json", to_json);
        env
    }

    #[test]
    fn test_mandatory() {
        assert!(mandatory(Value::from("x"), None).is_ok());
        assert!(mandatory(Value::from(0), None).is_ok());

        let err = mandatory(Value::UNDEFINED, Some("db_password must be set".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "db_password must be set");

        assert!(mandatory(Value::from(()), None).is_err());
        assert!(mandatory(Value::from(""), None).is_err());
    }

    #[test]
    fn test_to_yaml() {
        let value = Value::from_serialize(serde_json::json!({"name": "web", "ports": [80]}));
        let yaml = to_yaml(value).unwrap();
        assert!(yaml.contains("name: web"));
        assert!(yaml.contains("- 80"));
        assert!(yaml.ends_with('\n'));
    }

    #[test]
    fn test_to_nice_yaml_reindents() {
        let value = Value::from_serialize(serde_json::json!({"a": {"b": {"c": 1}}}));
        assert_eq!(to_nice_yaml(value, None).unwrap(), "a:\n    b:\n        c: 1\n");
    }

    #[test]
    fn test_to_json() {
        let value = Value::from_serialize(serde_json::json!({"a": "foo", "e": ["my", "own"]}));
        assert_eq!(to_json(value).unwrap(), r#"{"a": "foo", "e": ["my", "own"]}"#);
    }

    #[test]
    fn test_to_json_keeps_key_order() {
        let rendered = env()
            .render_str("{{ {'z': 1, 'a': 2} | to_json }}", ())
            .unwrap();
        assert_eq!(rendered, r#"{"z": 1, "a": 2}"#);
    }

    #[test]
    fn test_to_nice_json() {
        let value = Value::from_serialize(serde_json::json!({"b": 1, "a": [1, 2]}));
        assert_eq!(
            to_nice_json(value, None).unwrap(),
            "{\n    \"a\": [\n        1,\n        2\n    ],\n    \"b\": 1\n}"
        );
    }

    #[test]
    fn test_to_bool() {
        let env = env();
        assert_eq!(env.render_str("{{ 'yes' | to_bool }}", ()).unwrap(), "true");
        assert_eq!(env.render_str("{{ 'Off' | to_bool }}", ()).unwrap(), "false");
        assert_eq!(
            env.render_str("{{ 'xyz' | to_bool(default_value=false) }}", ())
                .unwrap(),
            "false"
        );
        assert!(env.render_str("{{ 'xyz' | to_bool }}", ()).is_err());
    }

    #[test]
    fn test_parse_bool_word() {
        assert_eq!(parse_bool_word(" n "), Some(false));
        assert_eq!(parse_bool_word("TRUE"), Some(true));
        assert_eq!(parse_bool_word("maybe"), None);
    }

    #[test]
    fn test_regex_escape() {
        assert_eq!(regex_escape("[foo](bar)".to_string()), r"\[foo\]\(bar\)");
    }

    #[test]
    fn test_regex_findall() {
        assert_eq!(
            regex_findall("Lorem ipsum dolor sit amet".into(), "[ae]m".into()).unwrap(),
            vec!["em", "am"]
        );
    }

    #[test]
    fn test_regex_replace() {
        assert_eq!(
            regex_replace("foobar".into(), "^foo".into(), "Cocktail".into()).unwrap(),
            "Cocktailbar"
        );
        assert_eq!(
            regex_replace("web-1".into(), r"(\w+)-(\d)".into(), r"\2-\1".into()).unwrap(),
            "1-web"
        );
    }

    #[test]
    fn test_regex_search() {
        let env = env();
        assert_eq!(
            env.render_str(r"{{ 'Lorem ipsum dolor sit amet' | regex_search('ip(\\S+)') }}", ())
                .unwrap(),
            "ipsum"
        );
        assert_eq!(
            env.render_str(
                r"{{ 'Lorem ipsum dolor sit amet' | regex_search('ip(\\S+)', '\\1') | to_json }}",
                ()
            )
            .unwrap(),
            r#"["sum"]"#
        );
        assert_eq!(
            env.render_str("{{ 'abc' | regex_search('x') is none }}", ()).unwrap(),
            "true"
        );
    }

    #[test]
    fn test_regex_contains() {
        assert!(regex_contains("foobar".into(), "^foo[bB]ar$".into()).unwrap());
        assert!(!regex_contains("foobar".into(), "barfoo".into()).unwrap());
        assert!(regex_contains("x".into(), "(".into()).is_err());
    }
}
