use std::collections::BTreeMap;
use thiserror::Error;

/// Failures surfaced by a renderer. Collected per-file by the candidate set
/// builder; one bad template aborts the whole set rather than producing a
/// partial one.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("template syntax error: {0}")]
    Syntax(String),
}

/// External collaborator seam: anything that can turn a template plus
/// variables into file content.
pub trait TemplateRenderer {
    fn render(
        &self,
        template: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<String, RenderError>;
}

/// Plain `{{name}}` substitution. Braces without a closing pair are a syntax
/// error; unknown names are undefined-variable errors. Single braces pass
/// through untouched.
pub struct VarRenderer;

impl TemplateRenderer for VarRenderer {
    fn render(
        &self,
        template: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                return Err(RenderError::Syntax(format!(
                    "unterminated '{{{{' near offset {open}"
                )));
            };
            let name = after_open[..close].trim();
            match vars.get(name) {
                Some(value) => out.push_str(value),
                None => return Err(RenderError::UndefinedVariable(name.to_string())),
            }
            rest = &after_open[close + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_variables() {
        let out = VarRenderer
            .render("Hello {{name}}, from {{project}}.", &vars(&[("name", "a"), ("project", "b")]))
            .unwrap();
        assert_eq!(out, "Hello a, from b.");
    }

    #[test]
    fn undefined_variable_errors() {
        let err = VarRenderer.render("{{missing}}", &vars(&[])).unwrap_err();
        assert_eq!(err, RenderError::UndefinedVariable("missing".to_string()));
    }

    #[test]
    fn unterminated_braces_error() {
        let err = VarRenderer.render("start {{oops", &vars(&[])).unwrap_err();
        assert!(matches!(err, RenderError::Syntax(_)));
    }

    #[test]
    fn single_braces_pass_through() {
        let out = VarRenderer
            .render("fn main() { let x = 1; }", &vars(&[]))
            .unwrap();
        assert_eq!(out, "fn main() { let x = 1; }");
    }

    #[test]
    fn whitespace_in_tag_is_trimmed() {
        let out = VarRenderer
            .render("{{ name }}", &vars(&[("name", "ok")]))
            .unwrap();
        assert_eq!(out, "ok");
    }
}
