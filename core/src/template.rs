//! Template rendering for configuration documents.
//!
//! `TemplateRenderer` substitutes values into a base document. The bundled
//! `MustacheRenderer` understands the variable tags `{{name}}`, `{{{name}}}`
//! and `{{& name}}`; strings are inserted verbatim and every other JSON value
//! is inserted as compact JSON. No HTML escaping is done, the documents
//! rendered here are JSON. Sections, inverted sections, comments, partials
//! and delimiter changes are rejected with `UnsupportedTag`, so a custom
//! template may only use variable tags.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A tag names a value that was not supplied.
    #[error("no value for '{{{{{0}}}}}'")]
    MissingValue(String),
    /// A section, comment, partial or delimiter tag.
    #[error("unsupported tag '{{{{{0}}}}}', only variable tags are rendered")]
    UnsupportedTag(String),
    /// A tag was opened and never closed.
    #[error("unterminated tag at byte {0}")]
    Unterminated(usize),
}

/// Substitutes values into a base template.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, values: &Map<String, Value>) -> Result<String, TemplateError>;
}

/// Minimal mustache-style variable substitution.
#[derive(Debug, Default, Clone, Copy)]
pub struct MustacheRenderer;

impl TemplateRenderer for MustacheRenderer {
    fn render(&self, template: &str, values: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let (open, close) = if rest[start..].starts_with("{{{") {
                ("{{{", "}}}")
            } else {
                ("{{", "}}")
            };
            let body_start = start + open.len();
            let end = rest[body_start..]
                .find(close)
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let body = rest[body_start..body_start + end].trim();
            if body.starts_with(['#', '^', '/', '!', '>', '=']) {
                return Err(TemplateError::UnsupportedTag(body.to_string()));
            }
            let name = body.strip_prefix('&').map_or(body, str::trim);
            let value = values
                .get(name)
                .ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;
            match value {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
            let consumed = body_start + end + close.len();
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn substitutes_strings_and_numbers() {
        let vals = values(json!({"name": "geth", "id": 77}));
        let out = MustacheRenderer
            .render("{{name}} on {{ id }}", &vals)
            .unwrap();
        assert_eq!(out, "geth on 77");
    }

    #[test]
    fn objects_render_as_json() {
        let vals = values(json!({"alloc": {"0x01": {"balance": "5"}}}));
        let out = MustacheRenderer.render("\"alloc\": {{{alloc}}}", &vals).unwrap();
        assert_eq!(out, r#""alloc": {"0x01":{"balance":"5"}}"#);
    }

    #[test]
    fn text_without_tags_is_unchanged() {
        let out = MustacheRenderer.render("{ \"a\": 1 }", &Map::new()).unwrap();
        assert_eq!(out, "{ \"a\": 1 }");
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = MustacheRenderer.render("{{nope}}", &Map::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingValue("nope".into()));
        assert_eq!(err.to_string(), "no value for '{{nope}}'");
    }

    #[test]
    fn ampersand_tag_is_a_variable() {
        let vals = values(json!({"gas": "0x01"}));
        assert_eq!(MustacheRenderer.render("{{& gas}}", &vals).unwrap(), "0x01");
    }

    #[test]
    fn non_variable_tags_are_rejected() {
        let vals = values(json!({"alloc": {}}));
        for (template, tag) in [
            ("{{#alloc}}x{{/alloc}}", "#alloc"),
            ("{{^alloc}}x{{/alloc}}", "^alloc"),
            ("{{! note }}", "! note"),
            ("{{> base}}", "> base"),
        ] {
            let err = MustacheRenderer.render(template, &vals).unwrap_err();
            assert_eq!(err, TemplateError::UnsupportedTag(tag.into()));
        }
        let err = MustacheRenderer.render("{{#alloc}}", &vals).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported tag '{{#alloc}}', only variable tags are rendered"
        );
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let vals = values(json!({"a": 1}));
        let err = MustacheRenderer.render("x {{a}} {{b", &vals).unwrap_err();
        assert_eq!(err, TemplateError::Unterminated(8));
    }
}
