//! Templer Core - Core types shared by every templer crate
//!
//! This crate provides the foundational types used throughout templer:
//! - `Value`: Variable values with deep merge and content hashing
//! - `ChangeSignal`: Ordered listener list fired on content changes
//! - `FileRegistry`: Deduplicated, cached and optionally watched source files
//! - `Definition`: The parsed definition document

pub mod definition;
pub mod error;
pub mod files;
pub mod signal;
pub mod values;

pub use definition::{Definition, TemplateEntry, VarOptions, resolve_relative};
pub use error::{CoreError, Result};
pub use files::{FileRegistry, PathWatcher, SourceFile, normalize_path};
pub use signal::ChangeSignal;
pub use values::{Mapping, Scalar, Value, content_hash, deep_merge, mapping_from_yaml};
