//! Template errors with source-annotated diagnostics
//!
//! MiniJinja reports failures with a line number and, in its alternate
//! display, a listing of the template with the failing line marked by `>`.
//! [`TemplateError`] turns that into a `miette` diagnostic labelled at the
//! failing line, with a hint derived from the variables that were in scope.

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use templer_core::Mapping;
use thiserror::Error;

use crate::suggestions::{extract_variable_name, suggest_undefined_variable, suggest_unknown_filter};

/// Raised by the `mandatory` filter
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct MandatoryValueError {
    pub message: String,
}

/// What went wrong while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    SyntaxError,
    MandatoryValue,
    Other,
}

impl TemplateErrorKind {
    fn classify(err: &minijinja::Error) -> Self {
        if mandatory_cause(err).is_some() {
            return Self::MandatoryValue;
        }
        match err.kind() {
            minijinja::ErrorKind::UndefinedError => Self::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => Self::UnknownFilter,
            minijinja::ErrorKind::SyntaxError => Self::SyntaxError,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFilter => "unknown_filter",
            Self::SyntaxError => "syntax",
            Self::MandatoryValue => "mandatory",
            Self::Other => "render",
        }
    }
}

impl fmt::Display for TemplateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed render of one template string
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(templer::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Convert a MiniJinja error raised while rendering `source` as `name`
    ///
    /// `context` is the mapping the template was rendered with; its keys feed
    /// the suggestions for undefined variables.
    pub fn from_minijinja(
        err: minijinja::Error,
        name: &str,
        source: &str,
        context: Option<&Mapping>,
    ) -> Self {
        let kind = TemplateErrorKind::classify(&err);
        let marked = MarkedExpression::find(&format!("{:#}", err));

        let message = match (kind, &marked) {
            (TemplateErrorKind::MandatoryValue, _) => mandatory_cause(&err)
                .map(|cause| cause.message.clone())
                .unwrap_or_else(|| err.to_string()),
            (TemplateErrorKind::UndefinedVariable, Some(expr)) => {
                format!("Variable `{}` is undefined", expr.variable())
            }
            (TemplateErrorKind::UndefinedVariable, None) => {
                format!("Variable {}", err.to_string().replace("undefined value", "is undefined"))
            }
            (TemplateErrorKind::SyntaxError, _) => format!("Template error: {}", err),
            _ => err.to_string(),
        };

        let suggestion = match kind {
            TemplateErrorKind::UndefinedVariable => {
                let variable = marked
                    .as_ref()
                    .map(|expr| expr.variable().to_string())
                    .or_else(|| extract_variable_name(&err.to_string()));
                variable.map(|name| undefined_hint(&name, context))
            }
            TemplateErrorKind::UnknownFilter => marked
                .as_ref()
                .and_then(MarkedExpression::last_filter)
                .map(suggest_unknown_filter),
            TemplateErrorKind::SyntaxError => Some(
                "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements, `{# #}` for comments"
                    .to_string(),
            ),
            _ => None,
        };

        Self {
            message,
            kind,
            src: NamedSource::new(name, source.to_string()),
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion,
        }
    }

    /// An error with no template source attached
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn undefined_hint(expression: &str, context: Option<&Mapping>) -> String {
    let root = expression.split(['.', '[']).next().unwrap_or(expression);
    let defined: Vec<String> = context
        .map(|ctx| ctx.keys().cloned().collect())
        .unwrap_or_default();

    suggest_undefined_variable(root, &defined).unwrap_or_else(|| {
        format!(
            "Define `{}` in `vars` or an `include_vars` file, or use `| default(...)`.",
            root
        )
    })
}

fn mandatory_cause(err: &minijinja::Error) -> Option<&MandatoryValueError> {
    let mut cause = std::error::Error::source(err);
    while let Some(current) = cause {
        if let Some(mandatory) = current.downcast_ref::<MandatoryValueError>() {
            return Some(mandatory);
        }
        cause = current.source();
    }
    None
}

/// The `{{ ... }}` expression on the line MiniJinja marks as failing
///
/// ```text
///    8 >   image: {{ registry }}/web
///      i            ^^^^^^^^ undefined value
/// ```
#[derive(Debug, PartialEq)]
struct MarkedExpression(String);

impl MarkedExpression {
    fn find(display: &str) -> Option<Self> {
        display
            .lines()
            .map(str::trim_start)
            .filter(|line| line.contains(" > ") || line.starts_with("> "))
            .find_map(|line| {
                let open = line.find("{{")?;
                let close = open + line[open..].find("}}")?;
                let expr = line[open + 2..close].trim();
                (!expr.is_empty()).then(|| Self(expr.to_string()))
            })
    }

    /// The expression before any filter
    fn variable(&self) -> &str {
        self.0.split('|').next().unwrap_or(&self.0).trim()
    }

    /// Name of the last filter applied, without arguments
    fn last_filter(&self) -> Option<&str> {
        let (_, filter) = self.0.rsplit_once('|')?;
        filter
            .trim()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .filter(|name| !name.is_empty())
    }
}

/// Span covering line `line` (1-based) of `source`
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (number, text) in (1..).zip(source.lines()) {
        if number == line {
            return Some(SourceSpan::new(offset.into(), text.len()));
        }
        offset += text.len() + 1;
    }
    None
}
