//! Templer Engine - Jinja2 templating for configuration files
//!
//! This crate provides a MiniJinja-based template engine with:
//! - Strict undefined variables
//! - The `omit` sentinel for dropping keys and list entries
//! - Ansible-style filters (mandatory, to_yaml, to_json, regex_*, to_bool)
//! - Recursive evaluation of variable blocks with typed-literal parsing
//! - Human-readable error messages with suggestions

pub mod engine;
pub mod error;
pub mod evaluate;
pub mod filters;
pub mod omit;
pub mod suggestions;

pub use engine::{Engine, EngineBuilder};
pub use error::{MandatoryValueError, TemplateError, TemplateErrorKind};
pub use evaluate::{parse_literal, strip_omitted};
pub use omit::OmitSentinel;
pub use suggestions::{TEMPLER_FILTERS, available_filters};
