//! Placeholder parsing and substitution
//!
//! Placeholders use the syntax `{name}` where `name` starts with a letter or
//! underscore. Substitution is literal and single-pass: a value containing a
//! `{token}` of its own is inserted verbatim, never re-expanded.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::domain::PromptError;

/// Regex to match placeholder tokens: {name}
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}").unwrap());

/// Extract distinct placeholder names in order of first occurrence
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names = Vec::new();

    for cap in PLACEHOLDER_PATTERN.captures_iter(text) {
        let name = cap.get(1).unwrap().as_str();

        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}

/// Substitute placeholder values into a template string
///
/// Every placeholder occurring in `text` must have a key in `values`;
/// missing names are collected and reported together. Keys in `values`
/// that the template never references are ignored.
pub fn resolve(text: &str, values: &HashMap<String, String>) -> Result<String, PromptError> {
    let mut missing = Vec::new();

    let resolved = PLACEHOLDER_PATTERN.replace_all(text, |cap: &Captures<'_>| {
        let name = cap.get(1).unwrap().as_str();

        match values.get(name) {
            Some(value) => value.clone(),
            None => {
                if !missing.iter().any(|n| n == name) {
                    missing.push(name.to_string());
                }
                cap.get(0).unwrap().as_str().to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(PromptError::missing_parameter(missing));
    }

    Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_no_placeholders() {
        let result = resolve("Hello, world!", &HashMap::new()).unwrap();
        assert_eq!(result, "Hello, world!");
    }

    #[test]
    fn test_resolve_single_placeholder() {
        let result = resolve("Hello {name}", &values(&[("name", "Ana")])).unwrap();
        assert_eq!(result, "Hello Ana");
    }

    #[test]
    fn test_resolve_repeated_placeholder() {
        let result = resolve("{name}, {name}!", &values(&[("name", "Ana")])).unwrap();
        assert_eq!(result, "Ana, Ana!");
    }

    #[test]
    fn test_resolve_multiple_placeholders() {
        let result = resolve(
            "You are {role}. Focus on {focus}.",
            &values(&[("role", "an assistant"), ("focus", "accuracy")]),
        )
        .unwrap();

        assert_eq!(result, "You are an assistant. Focus on accuracy.");
    }

    #[test]
    fn test_resolve_missing_collects_all_names() {
        let result = resolve("{a} {b} {a} {c}", &values(&[("b", "x")]));

        match result {
            Err(PromptError::MissingParameter { names }) => {
                assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
            }
            other => panic!("Expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_extra_values_ignored() {
        let result = resolve("Hello {name}", &values(&[("name", "Ana"), ("tone", "warm")]));
        assert_eq!(result.unwrap(), "Hello Ana");
    }

    #[test]
    fn test_resolve_is_not_recursive() {
        // A value that looks like a placeholder is inserted literally.
        let result = resolve("{outer}", &values(&[("outer", "{inner}"), ("inner", "x")])).unwrap();
        assert_eq!(result, "{inner}");
    }

    #[test]
    fn test_resolve_leaves_unmatched_braces_alone() {
        let result = resolve("JSON: {\"k\": 1} and {name}", &values(&[("name", "Ana")]));
        // "{\"k\"..." is not a valid placeholder token and passes through.
        assert!(result.unwrap().starts_with("JSON: {\"k\": 1}"));
    }

    #[test]
    fn test_placeholders_distinct_in_order() {
        let names = placeholders("{b} then {a} then {b} again");
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_placeholders_with_underscores_and_hyphens() {
        let names = placeholders("{user_name} {api-key}");
        assert_eq!(names, vec!["user_name".to_string(), "api-key".to_string()]);
    }

    #[test]
    fn test_placeholders_empty_for_plain_text() {
        assert!(placeholders("no tokens here").is_empty());
    }
}
