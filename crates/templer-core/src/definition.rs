//! Definition document parsing
//!
//! A definition declares which templates to render and the variables shared
//! by all of them:
//!
//! ```yaml
//! include_vars: vars/common.yml
//! vars:
//!   registry: docker.io
//! templates:
//!   - src: templates/web.yml.j2
//!     dest: "out/{{ name }}.yml"
//!     vars:
//!       name: web
//! ```

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::values::{Mapping, Scalar, Value};

/// Variable sources shared by the document and each template entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarOptions {
    /// Inline variables (values may contain template expressions)
    pub vars: Mapping,

    /// Variable files, relative to the definition unless absolute
    pub include_vars: Vec<String>,
}

/// One `templates` entry
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    /// Template source path expression
    pub src: String,

    /// Destination path expression
    pub dest: String,

    pub options: VarOptions,
}

/// A parsed definition document
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub path: PathBuf,
    pub options: VarOptions,
    pub templates: Vec<TemplateEntry>,
}

impl Definition {
    /// Parse and validate a definition document read from `path`
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let root = Value::from_yaml(content)
            .map_err(|e| CoreError::definition(path, e.to_string()))?;

        let root = match root {
            Value::Mapping(map) => map,
            Value::Scalar(Scalar::Null) => Mapping::new(),
            other => {
                return Err(CoreError::definition(
                    path,
                    format!("Definition must be a dict, found {}", other.kind_name()),
                ));
            }
        };

        let options = parse_options(&root, path)?;

        let entries = match root.get("templates") {
            None => return Err(CoreError::definition(path, "Missing 'templates' definition")),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => {
                return Err(CoreError::definition(
                    path,
                    "Value of 'templates' must be of type list",
                ));
            }
        };

        let templates = entries
            .iter()
            .map(|entry| parse_entry(entry, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            options,
            templates,
        })
    }

    /// Directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    /// Resolve a path relative to the definition's directory
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_relative(self.base_dir(), path.as_ref())
    }
}

/// Join `path` to `base` unless it is absolute
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn parse_entry(entry: &Value, path: &Path) -> Result<TemplateEntry> {
    let Value::Mapping(map) = entry else {
        return Err(CoreError::definition(
            path,
            "Template definition must be a dict",
        ));
    };

    Ok(TemplateEntry {
        src: required_string(map, "src", path)?,
        dest: required_string(map, "dest", path)?,
        options: parse_options(map, path)?,
    })
}

fn required_string(map: &Mapping, key: &str, path: &Path) -> Result<String> {
    match map.get(key) {
        Some(Value::Scalar(Scalar::String(s))) => Ok(s.clone()),
        Some(_) => Err(CoreError::definition(
            path,
            format!("Value of '{}' must be of type string", key),
        )),
        None => Err(CoreError::definition(
            path,
            format!("Missing key '{}' in template definition", key),
        )),
    }
}

fn parse_options(map: &Mapping, path: &Path) -> Result<VarOptions> {
    let vars = match map.get("vars") {
        None | Some(Value::Scalar(Scalar::Null)) => Mapping::new(),
        Some(Value::Mapping(vars)) => vars.clone(),
        Some(_) => {
            return Err(CoreError::definition(
                path,
                "Value of 'vars' must be of type dict",
            ));
        }
    };

    let include_vars = match map.get("include_vars") {
        None | Some(Value::Scalar(Scalar::Null)) => Vec::new(),
        Some(Value::Scalar(Scalar::String(file))) => vec![file.clone()],
        Some(Value::Sequence(files)) => files
            .iter()
            .map(|file| {
                file.as_str().map(str::to_string).ok_or_else(|| {
                    CoreError::definition(
                        path,
                        format!(
                            "Entries of 'include_vars' must be of type string, found {}",
                            file.kind_name()
                        ),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(CoreError::definition(
                path,
                "Value of 'include_vars' must be of type list or string",
            ));
        }
    };

    Ok(VarOptions { vars, include_vars })
}
