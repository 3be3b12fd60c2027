//! Templer Render - Incremental rendering of template definitions
//!
//! This crate ties the core types and the engine together:
//! - `ContextChain`: Layered variable sources resolved lazily and cached per position
//! - `RenderUnit`: One template rendered to one destination file
//! - `output`: Omitted entries cut from rendered text, keeping its layout
//! - `Manifest`: A definition file and the units it declares
//! - `Workspace`: The arena owning files, manifests and units, and dispatching changes
//! - `WatchLoop`: Re-renders affected units when watched files change

pub mod chain;
pub mod error;
pub mod listener;
pub mod manifest;
pub mod output;
pub mod report;
pub mod unit;
pub mod watch;
pub mod workspace;

pub use chain::{ContextChain, ContextNode, NodeSource};
pub use error::{RenderError, Result};
pub use listener::{IdAllocator, Listener, ManifestId, NodeRef, UnitId};
pub use manifest::Manifest;
pub use report::RenderReport;
pub use unit::RenderUnit;
pub use watch::{NotifyWatcher, WatchLoop};
pub use workspace::{RenderOptions, Workspace};

/// File registry specialized to the listeners of the render graph
pub type Files = templer_core::FileRegistry<Listener>;
