//! Placeholder substitution for prompt templates.
//!
//! Templates use `{{ name }}` placeholders where `name` is made of ASCII
//! letters, digits and underscores. Whitespace just inside the braces is
//! ignored, so `{{name}}` and `{{  name }}` are the same placeholder.
//!
//! Substitution is a single left-to-right pass over the template: values
//! are inserted verbatim and never scanned again, so a value that itself
//! looks like `{{ other }}` stays literal text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap();
}

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Template text with every placeholder replaced
    pub text: String,
    /// Placeholder names without a value, each once, in order of first appearance
    pub missing: Vec<String>,
}

impl Rendered {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Marker left in the output for a placeholder with no value.
pub fn missing_marker(name: &str) -> String {
    format!("<MISSING:{}>", name)
}

/// Substitute `variables` into `template`.
///
/// Unknown placeholders become `<MISSING:name>` and are reported in
/// [`Rendered::missing`].
pub fn render(template: &str, variables: &HashMap<String, String>) -> Rendered {
    let mut missing: Vec<String> = Vec::new();

    let text = PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                    missing_marker(name)
                }
            }
        })
        .into_owned();

    Rendered { text, missing }
}

/// Distinct placeholder names in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_REGEX.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Convert caller-supplied JSON values into the strings substituted by
/// [`render`]: strings verbatim, `null` as empty text, anything else as its
/// JSON representation.
pub fn stringify_variables<'a, I>(values: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a serde_json::Value)>,
{
    values
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let rendered = render("Hello {{name}}, you are {{ age }}.", &vars(&[("name", "Ada"), ("age", "36")]));

        assert_eq!(rendered.text, "Hello Ada, you are 36.");
        assert!(rendered.is_complete());
    }

    #[test]
    fn test_render_ignores_whitespace_inside_braces() {
        let rendered = render("{{name}}|{{ name }}|{{   name\t}}", &vars(&[("name", "x")]));
        assert_eq!(rendered.text, "x|x|x");
    }

    #[test]
    fn test_render_marks_missing_variables() {
        let rendered = render("Hello {{name}}", &HashMap::new());

        assert_eq!(rendered.text, "Hello <MISSING:name>");
        assert_eq!(rendered.missing, vec!["name".to_string()]);
    }

    #[test]
    fn test_render_reports_each_missing_name_once_in_first_seen_order() {
        let rendered = render("{{b}} {{a}} {{b}} {{c}} {{a}}", &vars(&[("c", "3")]));

        assert_eq!(rendered.text, "<MISSING:b> <MISSING:a> <MISSING:b> 3 <MISSING:a>");
        assert_eq!(rendered.missing, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let rendered = render(
            "{{first}} and {{second}}",
            &vars(&[("first", "{{second}}"), ("second", "{{first}}")]),
        );

        assert_eq!(rendered.text, "{{second}} and {{first}}");
        assert!(rendered.is_complete());
    }

    #[test]
    fn test_render_leaves_non_placeholder_braces_alone() {
        let template = "{{ not valid }} {{}} {single} {{name-with-dash}}";
        let rendered = render(template, &HashMap::new());

        assert_eq!(rendered.text, template);
        assert!(rendered.missing.is_empty());
    }

    #[test]
    fn test_render_is_stable_on_placeholder_free_output() {
        let first = render("Dear {{who}}, {{greeting}}!", &vars(&[("who", "Ada"), ("greeting", "hi")]));
        let again = render(&first.text, &vars(&[("who", "Bob"), ("unused", "1")]));

        assert_eq!(again.text, first.text);
        assert!(again.missing.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let variables = vars(&[("a", "1")]);
        let template = "{{a}} {{b}} {{a}}";
        assert_eq!(render(template, &variables), render(template, &variables));
    }

    #[test]
    fn test_placeholders_are_distinct_and_ordered() {
        assert_eq!(
            placeholders("{{ topic }} for {{audience}} about {{topic}}"),
            vec!["topic".to_string(), "audience".to_string()]
        );
        assert!(placeholders("no variables here").is_empty());
    }

    #[test]
    fn test_stringify_variables() {
        let mut raw = BTreeMap::new();
        raw.insert("name".to_string(), json!("Ada"));
        raw.insert("count".to_string(), json!(3));
        raw.insert("flag".to_string(), json!(true));
        raw.insert("empty".to_string(), json!(null));
        raw.insert("list".to_string(), json!(["a", "b"]));

        let values = stringify_variables(&raw);

        assert_eq!(values["name"], "Ada");
        assert_eq!(values["count"], "3");
        assert_eq!(values["flag"], "true");
        assert_eq!(values["empty"], "");
        assert_eq!(values["list"], r#"["a","b"]"#);
    }
}
