//! Render error types

use miette::Diagnostic;
use std::path::PathBuf;
use templer_core::CoreError;
use templer_engine::TemplateError;
use thiserror::Error;

/// Errors raised while building or rendering the graph
#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    /// The definition document is missing or malformed
    #[error("{0}")]
    #[diagnostic(code(templer::definition))]
    Definition(CoreError),

    /// A `vars` block or `include_vars` file could not be loaded or evaluated
    #[error("Error loading variables from '{origin}': {description}")]
    #[diagnostic(code(templer::variables))]
    VariableSource { origin: String, description: String },

    /// A template inside a `vars` block or `include_vars` file failed to render
    #[error("Error loading variables from '{origin}': {source}")]
    #[diagnostic(code(templer::variables))]
    VariableTemplate {
        origin: String,
        #[source]
        #[diagnostic_source]
        source: TemplateError,
    },

    /// Template expansion failed
    #[error("Error rendering template '{}': {source}", path.display())]
    #[diagnostic(code(templer::template))]
    Template {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: TemplateError,
    },

    /// Reading a source or writing a destination failed
    #[error(transparent)]
    #[diagnostic(code(templer::file))]
    File(#[from] CoreError),

    /// The rendered text is not valid YAML
    #[error("Error parsing rendered output of '{}': {description}", path.display())]
    #[diagnostic(
        code(templer::output),
        help("The template must render to a YAML document")
    )]
    Output { path: PathBuf, description: String },

    /// The filesystem watcher failed
    #[error("Watch error: {0}")]
    #[diagnostic(code(templer::watch))]
    Watch(String),
}

impl RenderError {
    pub fn variable_source(origin: impl Into<String>, description: impl ToString) -> Self {
        Self::VariableSource {
            origin: origin.into(),
            description: description.to_string(),
        }
    }

    pub fn variable_template(origin: impl Into<String>, source: TemplateError) -> Self {
        Self::VariableTemplate {
            origin: origin.into(),
            source,
        }
    }

    pub fn template(path: impl Into<PathBuf>, source: TemplateError) -> Self {
        Self::Template {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = RenderError::variable_source("vars/web.yml", "File does not exist");
        assert_eq!(
            err.to_string(),
            "Error loading variables from 'vars/web.yml': File does not exist"
        );

        let err = RenderError::variable_template("stack.yml", TemplateError::simple("boom"));
        assert_eq!(err.to_string(), "Error loading variables from 'stack.yml': boom");
        assert!(std::error::Error::source(&err).is_some());

        let err = RenderError::template(
            "web.yml.j2",
            TemplateError::simple("Variable `x` is undefined"),
        );
        assert_eq!(
            err.to_string(),
            "Error rendering template 'web.yml.j2': Variable `x` is undefined"
        );

        let err = RenderError::from(CoreError::NotFound {
            path: PathBuf::from("/tmp/missing.yml"),
        });
        assert_eq!(err.to_string(), "File does not exist: /tmp/missing.yml");
    }
}
