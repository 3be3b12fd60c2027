//! Layered variable resolution
//!
//! A [`ContextChain`] holds the variable sources of one render unit in
//! precedence order: definition `include_vars`, definition `vars`, entry
//! `include_vars`, entry `vars`. Each [`ContextNode`] evaluates its own source
//! key by key on top of the mapping resolved by its predecessor, so a value
//! can reference every variable defined before it, including earlier keys of
//! the same source.
//!
//! Resolved mappings are cached per node. Cached nodes always form a prefix of
//! the chain: invalidating a node invalidates everything after it.

use std::path::{Path, PathBuf};

use templer_core::{
    ChangeSignal, Definition, Mapping, TemplateEntry, content_hash, mapping_from_yaml,
};
use templer_engine::Engine;

use crate::error::{RenderError, Result};
use crate::listener::{Listener, NodeRef, UnitId};
use crate::Files;

/// Where a node's variables come from
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    /// An `include_vars` file (absolute path)
    File(PathBuf),
    /// A `vars` block of the definition at `origin`
    Inline { origin: PathBuf, vars: Mapping },
}

impl NodeSource {
    /// Label used in log and error messages
    pub fn origin(&self) -> String {
        match self {
            NodeSource::File(path) => path.display().to_string(),
            NodeSource::Inline { origin, .. } => format!("vars of {}", origin.display()),
        }
    }

    fn load(&self, files: &mut Files) -> Result<Mapping> {
        match self {
            NodeSource::File(path) => {
                let content = files
                    .read(path)
                    .map_err(|e| RenderError::variable_source(self.origin(), e))?;
                mapping_from_yaml(content)
                    .map_err(|e| RenderError::variable_source(self.origin(), e))
            }
            NodeSource::Inline { vars, .. } => Ok(vars.clone()),
        }
    }
}

/// One position of a chain
#[derive(Debug)]
pub struct ContextNode {
    source: NodeSource,
    cache: Option<Mapping>,
    hash: Option<String>,
    signal: ChangeSignal<Listener>,
}

impl ContextNode {
    fn new(source: NodeSource) -> Self {
        Self {
            source,
            cache: None,
            hash: None,
            signal: ChangeSignal::new(),
        }
    }

    pub fn source(&self) -> &NodeSource {
        &self.source
    }

    /// The resolved mapping, if cached
    pub fn cached(&self) -> Option<&Mapping> {
        self.cache.as_ref()
    }

    /// Hash of the last successfully resolved mapping
    pub fn content_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn signal(&self) -> &ChangeSignal<Listener> {
        &self.signal
    }
}

/// Ordered variable sources of one render unit
#[derive(Debug)]
pub struct ContextChain {
    unit: UnitId,
    nodes: Vec<ContextNode>,
}

impl ContextChain {
    /// Build the chain of `entry` in `definition` and subscribe it to its files
    pub fn build(
        unit: UnitId,
        definition: &Definition,
        entry: &TemplateEntry,
        files: &mut Files,
        watch: bool,
    ) -> Self {
        let mut sources = Vec::new();
        for options in [&definition.options, &entry.options] {
            sources.extend(
                options
                    .include_vars
                    .iter()
                    .map(|file| NodeSource::File(definition.resolve_path(file))),
            );
            if !options.vars.is_empty() {
                sources.push(NodeSource::Inline {
                    origin: definition.path.clone(),
                    vars: options.vars.clone(),
                });
            }
        }

        Self::new(unit, sources, files, watch)
    }

    /// Create a chain over `sources` and wire its subscriptions
    ///
    /// Node `i + 1` listens to node `i`; file-backed nodes listen to their file.
    pub fn new(unit: UnitId, sources: Vec<NodeSource>, files: &mut Files, watch: bool) -> Self {
        let mut nodes: Vec<ContextNode> = sources.into_iter().map(ContextNode::new).collect();

        for position in 0..nodes.len() {
            let listener = Listener::Node(NodeRef { unit, position });
            if position > 0 {
                nodes[position - 1].signal.subscribe(listener);
            }
            if let NodeSource::File(path) = &nodes[position].source {
                files.subscribe(path, watch, listener);
            }
        }

        Self { unit, nodes }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, position: usize) -> Option<&ContextNode> {
        self.nodes.get(position)
    }

    pub fn nodes(&self) -> &[ContextNode] {
        &self.nodes
    }

    /// Subscribe `listener` to the last node; returns false for an empty chain
    pub fn subscribe_tail(&mut self, listener: Listener) -> bool {
        match self.nodes.last_mut() {
            Some(tail) => {
                tail.signal.subscribe(listener);
                true
            }
            None => false,
        }
    }

    /// Resolve the mapping at `position`, computing uncached predecessors first
    pub fn resolve_at(
        &mut self,
        position: usize,
        files: &mut Files,
        engine: &Engine,
    ) -> Result<&Mapping> {
        if position >= self.nodes.len() {
            return Err(RenderError::variable_source(
                format!("{}/node#{}", self.unit, position),
                "no such context node",
            ));
        }

        let start = self.nodes[..=position]
            .iter()
            .position(|node| node.cache.is_none())
            .unwrap_or(position + 1);

        for index in start..=position {
            let base = match index {
                0 => Mapping::new(),
                _ => self.nodes[index - 1].cache.clone().unwrap_or_default(),
            };

            let node = &mut self.nodes[index];
            let origin = node.source.origin();
            let source = node.source.load(files)?;
            let merged = engine
                .evaluate_onto(&source, base, &origin)
                .map_err(|e| RenderError::variable_template(&origin, e))?;
            tracing::debug!("Resolved {} variables from {}", merged.len(), origin);

            node.hash = Some(content_hash(&merged));
            node.cache = Some(merged);
        }

        Ok(self.nodes[position].cache.get_or_insert_with(Mapping::new))
    }

    /// The merged mapping of the whole chain (empty for an empty chain)
    pub fn context(&mut self, files: &mut Files, engine: &Engine) -> Result<Mapping> {
        match self.nodes.len() {
            0 => Ok(Mapping::new()),
            len => self.resolve_at(len - 1, files, engine).cloned(),
        }
    }

    /// Drop the cache of `position` and every later node
    pub fn invalidate_from(&mut self, position: usize) {
        for node in self.nodes.iter_mut().skip(position) {
            node.cache = None;
        }
    }

    /// Recompute `position` after a change upstream
    ///
    /// Returns whether the resolved mapping differs from the previous one. On
    /// error the node stays uncached and forgets its hash, so the next
    /// successful resolution counts as a change.
    pub fn refresh(&mut self, position: usize, files: &mut Files, engine: &Engine) -> Result<bool> {
        let Some(node) = self.nodes.get_mut(position) else {
            return Ok(false);
        };
        let old_hash = node.hash.take();

        self.invalidate_from(position);
        self.resolve_at(position, files, engine)?;

        let changed = self.nodes[position].hash != old_hash;
        tracing::debug!(
            "Context node {}/node#{} {}",
            self.unit,
            position,
            if changed { "changed" } else { "unchanged" }
        );
        Ok(changed)
    }

    /// Listeners of the node at `position`
    pub fn listeners(&self, position: usize) -> Vec<Listener> {
        self.nodes
            .get(position)
            .map(|node| node.signal.fire())
            .unwrap_or_default()
    }

    /// Paths of the file-backed nodes, in chain order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.nodes.iter().filter_map(|node| match &node.source {
            NodeSource::File(path) => Some(path.as_path()),
            NodeSource::Inline { .. } => None,
        })
    }

    /// Unsubscribe every file-backed node from its file and drop all caches
    pub fn dispose(&mut self, files: &mut Files) {
        for (position, node) in self.nodes.iter_mut().enumerate() {
            if let NodeSource::File(path) = &node.source {
                files.unsubscribe(path, &Listener::Node(NodeRef {
                    unit: self.unit,
                    position,
                }));
            }
            node.cache = None;
            node.hash = None;
        }
    }
}
