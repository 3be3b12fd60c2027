//! Rendering of a single template entry

use std::path::{Path, PathBuf};

use templer_core::{Definition, SourceFile, TemplateEntry, resolve_relative};
use templer_engine::Engine;

use crate::chain::ContextChain;
use crate::error::{RenderError, Result};
use crate::listener::{Listener, ManifestId, UnitId};
use crate::output;
use crate::workspace::RenderOptions;
use crate::Files;

/// One template rendered to one destination
///
/// Both `src` and `dest` are template expressions evaluated against the
/// unit's context on every render, so the source file a unit listens to can
/// change when its variables do.
#[derive(Debug)]
pub struct RenderUnit {
    id: UnitId,
    manifest: ManifestId,
    src: String,
    dest: String,
    base_dir: PathBuf,
    options: RenderOptions,
    chain: ContextChain,
    source_path: Option<PathBuf>,
    renders: usize,
}

impl RenderUnit {
    /// Create the unit for `entry`, building and subscribing its chain
    pub fn new(
        id: UnitId,
        manifest: ManifestId,
        definition: &Definition,
        entry: &TemplateEntry,
        options: RenderOptions,
        files: &mut Files,
    ) -> Self {
        let mut chain = ContextChain::build(id, definition, entry, files, options.watch);
        chain.subscribe_tail(Listener::Unit(id));

        Self {
            id,
            manifest,
            src: entry.src.clone(),
            dest: entry.dest.clone(),
            base_dir: definition.base_dir().to_path_buf(),
            options,
            chain,
            source_path: None,
            renders: 0,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn manifest(&self) -> ManifestId {
        self.manifest
    }

    /// The source path expression as written in the definition
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    /// The source file the unit currently listens to
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Number of successful renders
    pub fn renders(&self) -> usize {
        self.renders
    }

    pub fn chain(&self) -> &ContextChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ContextChain {
        &mut self.chain
    }

    /// Label for reports: the resolved source path once known
    pub fn label(&self) -> String {
        match &self.source_path {
            Some(path) => path.display().to_string(),
            None => self.src.clone(),
        }
    }

    /// Render the template and write the destination file
    ///
    /// Returns the destination path.
    pub fn render(&mut self, files: &mut Files, engine: &Engine) -> Result<PathBuf> {
        let context = self.chain.context(files, engine)?;

        let src = engine
            .render_str(&self.src, &context, "src")
            .map_err(|e| RenderError::template(&self.src, e))?;
        let source_path = resolve_relative(&self.base_dir, Path::new(&src));
        self.follow_source(&source_path, files);

        let template = files.read(&source_path)?.to_string();
        let name = source_path.display().to_string();
        let rendered = engine
            .render_str(&template, &context, &name)
            .map_err(|e| RenderError::template(&source_path, e))?;

        let content =
            output::finish(&rendered, engine.omit()).map_err(|description| RenderError::Output {
                path: source_path.clone(),
                description,
            })?;

        let dest = engine
            .render_str(&self.dest, &context, "dest")
            .map_err(|e| RenderError::template(&source_path, e))?;
        let dest = resolve_relative(&self.base_dir, Path::new(&dest));

        SourceFile::<Listener>::write(&content, &dest, self.options.force_overwrite)?;
        tracing::info!("Created file '{}'", dest.display());

        self.renders += 1;
        Ok(dest)
    }

    /// Move the source subscription to `path` if it changed
    fn follow_source(&mut self, path: &Path, files: &mut Files) {
        if self.source_path.as_deref() == Some(path) {
            return;
        }

        let listener = Listener::Unit(self.id);
        if let Some(old) = self.source_path.take() {
            tracing::debug!("Template of {} moved from '{}'", self.id, old.display());
            files.unsubscribe(&old, &listener);
        }
        files.subscribe(path, self.options.watch, listener);
        self.source_path = Some(path.to_path_buf());
    }

    /// Unsubscribe the unit and its chain from every file
    pub fn dispose(&mut self, files: &mut Files) {
        self.chain.dispose(files);
        if let Some(path) = self.source_path.take() {
            files.unsubscribe(&path, &Listener::Unit(self.id));
        }
    }
}
