//! The render graph and its change dispatch
//!
//! A [`Workspace`] owns every object of the graph: the file registry, the
//! engine, the manifests and, through them, the units and their context
//! chains. Signals only hold [`Listener`] values, so propagating a change is a
//! plain synchronous walk: each listener is looked up by id, updated, and the
//! listeners it notifies in turn are handled before the next one.

use std::collections::BTreeMap;
use std::path::Path;

use templer_core::{PathWatcher, normalize_path};
use templer_engine::Engine;

use crate::listener::{IdAllocator, Listener, ManifestId, NodeRef, UnitId};
use crate::manifest::Manifest;
use crate::report::RenderReport;
use crate::unit::RenderUnit;
use crate::Files;

/// Options shared by every manifest of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Overwrite existing destination files
    pub force_overwrite: bool,

    /// Register every read file with the watcher
    pub watch: bool,
}

/// Owner of the render graph
pub struct Workspace {
    files: Files,
    engine: Engine,
    ids: IdAllocator,
    manifests: BTreeMap<ManifestId, Manifest>,
    options: RenderOptions,
}

impl Workspace {
    /// Workspace without change notifications
    pub fn new(options: RenderOptions) -> Self {
        Self::with_files(options, Files::new())
    }

    /// Workspace registering watched files with `watcher`
    pub fn with_watcher(options: RenderOptions, watcher: Box<dyn PathWatcher>) -> Self {
        Self::with_files(options, Files::with_watcher(watcher))
    }

    fn with_files(options: RenderOptions, files: Files) -> Self {
        Self {
            files,
            engine: Engine::default(),
            ids: IdAllocator::new(),
            manifests: BTreeMap::new(),
            options,
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Register the definition file at `path`
    pub fn add_manifest(&mut self, path: &Path) -> ManifestId {
        let id = self.ids.manifest();
        let manifest = Manifest::new(id, normalize_path(path), self.options, &mut self.files);
        self.manifests.insert(id, manifest);
        id
    }

    pub fn manifest(&self, id: ManifestId) -> Option<&Manifest> {
        self.manifests.get(&id)
    }

    pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    pub fn unit(&self, id: UnitId) -> Option<&RenderUnit> {
        self.manifests.values().find_map(|manifest| manifest.unit(id))
    }

    /// Parse and render every manifest
    ///
    /// A manifest that fails to parse is reported and skipped; the others are
    /// still rendered.
    pub fn render_all(&mut self) -> RenderReport {
        let mut report = RenderReport::new();
        let ids: Vec<ManifestId> = self.manifests.keys().copied().collect();
        for id in ids {
            report.merge(self.render_manifest(id));
        }
        report
    }

    /// Parse and render one manifest
    pub fn render_manifest(&mut self, id: ManifestId) -> RenderReport {
        let mut report = RenderReport::new();
        let Some(manifest) = self.manifests.get_mut(&id) else {
            return report;
        };

        match manifest.parse(&mut self.files, &mut self.ids) {
            Ok(()) => report.merge(manifest.render_templates(&mut self.files, &self.engine)),
            Err(e) => {
                tracing::error!("{}", e);
                report.add_error(manifest.path().display().to_string(), e);
            }
        }
        report
    }

    /// Handle a filesystem event for `path`
    ///
    /// Re-reads the file and, if its content changed, propagates the change
    /// to everything depending on it. Unknown paths are ignored.
    pub fn handle_file_event(&mut self, path: &Path) -> RenderReport {
        let mut report = RenderReport::new();
        if !self.files.contains(path) {
            return report;
        }

        match self.files.refresh(path) {
            Ok(true) => {
                tracing::debug!("Detected change of '{}'", path.display());
                let listeners = self.files.listeners(path);
                self.dispatch(listeners, &mut report);
            }
            Ok(false) => tracing::debug!("File '{}' is unchanged", path.display()),
            Err(e) => {
                tracing::error!("{}", e);
                report.add_error(path.display().to_string(), e.into());
            }
        }
        report
    }

    /// Notify `listeners` in order, depth first
    ///
    /// Listeners whose target no longer exists are skipped.
    pub fn dispatch(&mut self, listeners: Vec<Listener>, report: &mut RenderReport) {
        for listener in listeners {
            tracing::debug!("Notifying {}", listener);
            match listener {
                Listener::Manifest(id) => self.reload_manifest(id, report),
                Listener::Node(node) => {
                    let next = self.refresh_node(node, report);
                    self.dispatch(next, report);
                }
                Listener::Unit(id) => self.render_unit(id, report),
            }
        }
    }

    fn reload_manifest(&mut self, id: ManifestId, report: &mut RenderReport) {
        match self.manifests.get_mut(&id) {
            Some(manifest) => {
                report.merge(manifest.reload(&mut self.files, &mut self.ids, &self.engine))
            }
            None => tracing::debug!("Skipping stale listener {}", id),
        }
    }

    /// Recompute a context node; returns the listeners to notify next
    fn refresh_node(&mut self, node: NodeRef, report: &mut RenderReport) -> Vec<Listener> {
        let Some(unit) = self
            .manifests
            .values_mut()
            .find_map(|manifest| manifest.unit_mut(node.unit))
        else {
            tracing::debug!("Skipping stale listener {}", Listener::Node(node));
            return Vec::new();
        };

        let chain = unit.chain_mut();
        match chain.refresh(node.position, &mut self.files, &self.engine) {
            Ok(true) => chain.listeners(node.position),
            Ok(false) => Vec::new(),
            Err(e) => {
                tracing::error!("{}", e);
                report.add_error(unit.label(), e);
                Vec::new()
            }
        }
    }

    fn render_unit(&mut self, id: UnitId, report: &mut RenderReport) {
        let rendered = self
            .manifests
            .values_mut()
            .find(|manifest| manifest.unit(id).is_some())
            .and_then(|manifest| manifest.render_unit(id, &mut self.files, &self.engine));

        match rendered {
            Some(unit_report) => report.merge(unit_report),
            None => tracing::debug!("Skipping stale listener {}", id),
        }
    }

    /// Release every watch registration
    pub fn release_watches(&mut self) {
        self.files.release_watches();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Project {
        dir: TempDir,
    }

    impl Project {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            path
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join(name)).unwrap()
        }
    }

    fn force() -> RenderOptions {
        RenderOptions {
            force_overwrite: true,
            watch: false,
        }
    }

    fn renders(workspace: &Workspace) -> Vec<usize> {
        workspace
            .manifests()
            .flat_map(|m| m.units().iter().map(RenderUnit::renders))
            .collect()
    }

    #[test]
    fn test_render_all_with_broken_manifest() {
        let project = Project::new();
        let good = project.write("good.yml", "templates:\n  - src: a.j2\n    dest: a.yml\n");
        let bad = project.write("bad.yml", "templates: nope\n");
        project.write("a.j2", "a: 1\n");

        let mut workspace = Workspace::new(RenderOptions::default());
        workspace.add_manifest(&bad);
        workspace.add_manifest(&good);

        let report = workspace.render_all();
        assert_eq!(report.total_errors, 1);
        assert_eq!(report.written.len(), 1);
        assert_eq!(project.read("a.yml"), "a: 1\n");
    }

    #[test]
    fn test_change_isolation() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            r#"
include_vars: common.yml
templates:
  - src: web.j2
    dest: out/web.yml
    include_vars: web.yml
  - src: db.j2
    dest: out/db.yml
    include_vars: db.yml
"#,
        );
        project.write("common.yml", "registry: docker.io\n");
        let web_vars = project.write("web.yml", "name: web\n");
        project.write("db.yml", "name: db\n");
        project.write("web.j2", "image: {{ registry }}/{{ name }}\n");
        project.write("db.j2", "image: {{ registry }}/{{ name }}\n");

        let mut workspace = Workspace::new(force());
        workspace.add_manifest(&def);
        assert!(workspace.render_all().is_success());
        assert_eq!(renders(&workspace), vec![1, 1]);

        // Only the web unit depends on web.yml
        project.write("web.yml", "name: frontend\n");
        let report = workspace.handle_file_event(&web_vars);
        assert!(report.is_success());
        assert_eq!(renders(&workspace), vec![2, 1]);
        assert_eq!(project.read("out/web.yml"), "image: docker.io/frontend\n");
    }

    #[test]
    fn test_shared_file_rerenders_all_dependents() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "include_vars: common.yml\ntemplates:\n  - src: t.j2\n    dest: a.yml\n  - src: t.j2\n    dest: b.yml\n",
        );
        let common = project.write("common.yml", "v: 1\n");
        let template = project.write("t.j2", "v: {{ v }}\n");

        let mut workspace = Workspace::new(force());
        workspace.add_manifest(&def);
        workspace.render_all();

        project.write("common.yml", "v: 2\n");
        workspace.handle_file_event(&common);
        assert_eq!(renders(&workspace), vec![2, 2]);
        assert_eq!(project.read("b.yml"), "v: 2\n");

        project.write("t.j2", "value: {{ v }}\n");
        workspace.handle_file_event(&template);
        assert_eq!(renders(&workspace), vec![3, 3]);
        assert_eq!(project.read("a.yml"), "value: 2\n");
    }

    #[test]
    fn test_equal_mapping_stops_propagation() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "templates:\n  - src: t.j2\n    dest: a.yml\n    include_vars: v.yml\n",
        );
        let vars = project.write("v.yml", "v: 1\n");
        project.write("t.j2", "v: {{ v }}\n");

        let mut workspace = Workspace::new(force());
        workspace.add_manifest(&def);
        workspace.render_all();

        // Different bytes, same mapping
        project.write("v.yml", "# comment\nv: 1\n");
        workspace.handle_file_event(&vars);
        assert_eq!(renders(&workspace), vec![1]);

        // Identical bytes
        workspace.handle_file_event(&vars);
        assert_eq!(renders(&workspace), vec![1]);
    }

    #[test]
    fn test_template_source_follows_its_variables() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "templates:\n  - src: \"{{ which }}.j2\"\n    dest: out.yml\n    include_vars: which.yml\n",
        );
        let which = project.write("which.yml", "which: a\n");
        let a = project.write("a.j2", "v: a\n");
        let b = project.write("b.j2", "v: b\n");

        let mut workspace = Workspace::new(force());
        let id = workspace.add_manifest(&def);
        assert!(workspace.render_all().is_success());
        let unit = workspace.manifest(id).unwrap().units()[0].id();
        assert_eq!(workspace.files().listeners(&a), vec![Listener::Unit(unit)]);
        assert!(!workspace.files().contains(&b));

        project.write("which.yml", "which: b\n");
        assert!(workspace.handle_file_event(&which).is_success());
        assert_eq!(project.read("out.yml"), "v: b\n");
        assert!(!workspace.files().contains(&a));
        assert_eq!(workspace.files().listeners(&b), vec![Listener::Unit(unit)]);

        // The previous template no longer reaches the unit
        project.write("a.j2", "v: stale\n");
        let report = workspace.handle_file_event(&a);
        assert!(report.written.is_empty());
        assert_eq!(project.read("out.yml"), "v: b\n");
        assert_eq!(renders(&workspace), vec![2]);
    }

    #[test]
    fn test_cache_coherence() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "templates:\n  - src: t.j2\n    dest: a.yml\n  - src: t.j2\n    dest: b.yml\n",
        );
        let template = project.write("t.j2", "a: 1\n");

        let mut workspace = Workspace::new(force());
        workspace.add_manifest(&def);
        workspace.render_all();
        assert_eq!(workspace.files().get(&template).map(|f| f.loads()), Some(1));

        // Served from cache until a change is handled
        project.write("t.j2", "a: 2\n");
        let units: Vec<Listener> = workspace
            .manifests()
            .flat_map(|m| m.units().iter().map(|u| Listener::Unit(u.id())))
            .collect();
        let mut report = RenderReport::new();
        workspace.dispatch(units, &mut report);
        assert!(report.is_success());
        assert_eq!(project.read("a.yml"), "a: 1\n");
        assert_eq!(workspace.files().get(&template).map(|f| f.loads()), Some(1));

        workspace.handle_file_event(&template);
        assert_eq!(project.read("a.yml"), "a: 2\n");
        assert_eq!(project.read("b.yml"), "a: 2\n");
    }

    #[test]
    fn test_definition_change_reloads() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "vars:\n  name: db\ntemplates:\n  - src: t.j2\n    dest: a.yml\n",
        );
        project.write("t.j2", "name: {{ name }}\n");

        let mut workspace = Workspace::new(force());
        let id = workspace.add_manifest(&def);
        workspace.render_all();
        let old_unit = workspace.manifest(id).unwrap().units()[0].id();

        project.write(
            "stack.yml",
            "vars:\n  name: web\ntemplates:\n  - src: t.j2\n    dest: a.yml\n  - src: t.j2\n    dest: b.yml\n",
        );
        let report = workspace.handle_file_event(&def);

        assert!(report.is_success());
        assert_eq!(report.written.len(), 2);
        assert!(workspace.unit(old_unit).is_none());
        assert_eq!(project.read("b.yml"), "name: web\n");
    }

    #[test]
    fn test_variable_error_is_isolated_to_its_unit() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "templates:\n  - src: t.j2\n    dest: a.yml\n    include_vars: missing.yml\n  - src: t.j2\n    dest: b.yml\n    vars:\n      v: 1\n",
        );
        project.write("t.j2", "v: {{ v }}\n");

        let mut workspace = Workspace::new(RenderOptions::default());
        workspace.add_manifest(&def);
        let report = workspace.render_all();

        assert_eq!(report.total_errors, 1);
        assert_eq!(project.read("b.yml"), "v: 1\n");
    }

    #[test]
    fn test_idempotent_with_force() {
        let project = Project::new();
        let def = project.write(
            "stack.yml",
            "templates:\n  - src: t.j2\n    dest: out.yml\n    vars:\n      name: web\n",
        );
        project.write("t.j2", "service: {{ name }}\n");

        let mut first = Workspace::new(RenderOptions::default());
        first.add_manifest(&def);
        assert!(first.render_all().is_success());
        let bytes = project.read("out.yml");

        let mut again = Workspace::new(RenderOptions::default());
        again.add_manifest(&def);
        let report = again.render_all();
        assert_eq!(report.total_errors, 1);
        assert!(matches!(
            report.errors_by_file.values().next().map(|e| &e[0]),
            Some(crate::RenderError::File(templer_core::CoreError::AlreadyExists { .. }))
        ));

        let mut forced = Workspace::new(force());
        forced.add_manifest(&def);
        assert!(forced.render_all().is_success());
        assert_eq!(project.read("out.yml"), bytes);
    }

    #[test]
    fn test_unknown_path_is_ignored() {
        let project = Project::new();
        let mut workspace = Workspace::new(RenderOptions::default());
        let report = workspace.handle_file_event(&project.dir.path().join("other.yml"));
        assert!(report.is_success());
        assert!(report.written.is_empty());
    }
}
