//! Fuzzy matching suggestions for template errors
//!
//! Uses Levenshtein distance to point users at the variable or filter they
//! most likely meant.

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Filters registered by [`crate::Engine`]
pub const TEMPLER_FILTERS: &[&str] = &[
    "mandatory", "to_yaml", "to_nice_yaml", "to_json", "to_nice_json", "to_bool",
    "regex_escape", "regex_findall", "regex_replace", "regex_search", "regex_contains",
];

/// MiniJinja builtins commonly used in compose templates
const BUILTIN_FILTERS: &[&str] = &[
    "default", "upper", "lower", "title", "capitalize", "replace", "trim", "join",
    "first", "last", "length", "reverse", "sort", "unique", "map", "select", "reject",
    "selectattr", "rejectattr", "batch", "slice", "dictsort", "items", "attr", "int",
    "float", "abs", "round", "string", "list", "bool", "safe", "escape", "urlencode",
    "tojson", "indent",
];

/// Every filter name known to the engine
pub fn available_filters() -> impl Iterator<Item = &'static str> {
    TEMPLER_FILTERS.iter().chain(BUILTIN_FILTERS).copied()
}

/// Candidates within [`MAX_SUGGESTION_DISTANCE`] of `input`, closest first
///
/// Exact matches are skipped. Ties keep candidate order.
pub fn closest<'a>(
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<&'a str> {
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|candidate| (strsim::levenshtein(input, candidate), candidate))
        .filter(|(distance, _)| (1..=MAX_SUGGESTION_DISTANCE).contains(distance))
        .collect();

    scored.sort_by_key(|(distance, _)| *distance);
    scored.into_iter().take(limit).map(|(_, candidate)| candidate).collect()
}

/// "Did you mean ...?" for an undefined variable, from the names in the context
pub fn suggest_undefined_variable(name: &str, defined: &[String]) -> Option<String> {
    let found = closest(
        name,
        defined.iter().map(String::as_str).filter(|n| *n != "omit"),
        3,
    );
    if found.is_empty() {
        return None;
    }

    let quoted: Vec<String> = found.iter().map(|n| format!("`{}`", n)).collect();
    Some(format!("Did you mean {}?", quoted.join(" or ")))
}

/// Closest known filter, or the full list when nothing is close
pub fn suggest_unknown_filter(name: &str) -> String {
    match closest(name, available_filters(), 1).first() {
        Some(best) => format!("Did you mean `{}`?", best),
        None => format!(
            "Unknown filter `{}`. Available: {}",
            name,
            available_filters().collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Extract a variable name from a plain error message like "undefined value 'foo'"
pub fn extract_variable_name(message: &str) -> Option<String> {
    let start = message.find(['\'', '`'])?;
    let quote = message[start..].chars().next()?;
    let rest = &message[start + 1..];
    let end = rest.find(quote)?;
    let name = &rest[..end];
    (!name.is_empty()).then(|| name.to_string())
}
