//! Artifact rendering.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::Result;
use crate::template::TemplateSource;
use crate::version::MigrationVersion;

/// Indentation of statements inside `up`/`down`.
const STATEMENT_INDENT: &str = "        ";

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Migration version.
    pub version: &'a MigrationVersion,
    /// Statements for `up`, in order.
    pub apply_statements: &'a [String],
    /// Statements for `down`, in order.
    pub revert_statements: &'a [String],
    /// Extra source injected at `<custom>`.
    pub custom_methods: &'a str,
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"<(version|up|down|custom)>").expect("Invalid placeholder regex")
    })
}

/// Renders statements as `target.add_sql(...)` lines.
///
/// Each statement becomes an escaped string literal.
#[must_use]
pub fn statement_lines(statements: &[String]) -> String {
    statements
        .iter()
        .map(|sql| format!("{STATEMENT_INDENT}target.add_sql({sql:?});"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitutes the context into template text.
///
/// Substitution is a single pass, so placeholder-like text inside statements
/// or custom methods is left alone.
#[must_use]
pub fn render_text(template: &str, context: &TemplateContext<'_>) -> String {
    let up = statement_lines(context.apply_statements);
    let down = statement_lines(context.revert_statements);

    placeholder()
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "version" => context.version.to_string(),
            "up" => up.clone(),
            "down" => down.clone(),
            _ => context.custom_methods.to_string(),
        })
        .into_owned()
}

/// Loads a template and renders the context into it.
pub fn render(template: &dyn TemplateSource, context: &TemplateContext<'_>) -> Result<String> {
    let text = template.load()?;
    Ok(render_text(&text, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DefaultTemplate;

    fn version() -> MigrationVersion {
        MigrationVersion::parse("20160705000000").unwrap()
    }

    #[test]
    fn test_default_template() {
        let version = version();
        let apply = vec!["CREATE TABLE \"example\" (\"id\" INTEGER NOT NULL)".to_string()];
        let revert = vec!["DROP TABLE \"example\"".to_string()];
        let context = TemplateContext {
            version: &version,
            apply_statements: &apply,
            revert_statements: &revert,
            custom_methods: "",
        };

        let text = render(&DefaultTemplate, &context).unwrap();
        assert!(text.contains("pub struct Version20160705000000;"));
        assert!(text.contains("const VERSION: &'static str = \"20160705000000\";"));
        assert!(text.contains(
            "        target.add_sql(\"CREATE TABLE \\\"example\\\" (\\\"id\\\" INTEGER NOT NULL)\");"
        ));
        assert!(text.contains("        target.add_sql(\"DROP TABLE \\\"example\\\"\");"));
        assert!(!text.contains("<up>"));
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let version = version();
        let apply = vec!["SELECT '<down>'".to_string()];
        let context = TemplateContext {
            version: &version,
            apply_statements: &apply,
            revert_statements: &[],
            custom_methods: "// <version>",
        };

        let text = render_text("<up>|<down>|<custom>", &context);
        assert_eq!(
            text,
            "        target.add_sql(\"SELECT '<down>'\");||// <version>"
        );
    }

    #[test]
    fn test_empty_sequences() {
        let version = version();
        let context = TemplateContext {
            version: &version,
            apply_statements: &[],
            revert_statements: &[],
            custom_methods: "",
        };
        assert_eq!(render_text("[<up>][<down>]", &context), "[][]");
    }
}
