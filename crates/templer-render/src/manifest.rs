//! A definition file and the render units it declares

use std::path::{Path, PathBuf};

use templer_core::Definition;
use templer_engine::Engine;

use crate::error::{RenderError, Result};
use crate::listener::{IdAllocator, Listener, ManifestId, UnitId};
use crate::report::RenderReport;
use crate::unit::RenderUnit;
use crate::workspace::RenderOptions;
use crate::Files;

/// A definition file
///
/// The manifest listens to its own file. When it changes, every unit is
/// disposed and the definition is parsed and rendered again from scratch.
#[derive(Debug)]
pub struct Manifest {
    id: ManifestId,
    path: PathBuf,
    options: RenderOptions,
    units: Vec<RenderUnit>,
}

impl Manifest {
    /// Create a manifest for the definition at `path` (absolute)
    pub fn new(id: ManifestId, path: PathBuf, options: RenderOptions, files: &mut Files) -> Self {
        files.subscribe(&path, options.watch, Listener::Manifest(id));
        Self {
            id,
            path,
            options,
            units: Vec::new(),
        }
    }

    pub fn id(&self) -> ManifestId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn units(&self) -> &[RenderUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&RenderUnit> {
        self.units.iter().find(|unit| unit.id() == id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut RenderUnit> {
        self.units.iter_mut().find(|unit| unit.id() == id)
    }

    /// Parse the definition and build one unit per template entry
    ///
    /// Units from a previous parse are disposed first.
    pub fn parse(&mut self, files: &mut Files, ids: &mut IdAllocator) -> Result<()> {
        self.dispose_units(files);

        let content = files.read(&self.path).map_err(RenderError::Definition)?;
        let definition = Definition::parse(content, &self.path).map_err(RenderError::Definition)?;

        for entry in &definition.templates {
            let id = ids.unit();
            let unit = RenderUnit::new(id, self.id, &definition, entry, self.options, files);
            self.units.push(unit);
        }

        tracing::debug!(
            "Parsed {} template(s) from '{}'",
            self.units.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Render every unit, collecting failures without stopping
    pub fn render_templates(&mut self, files: &mut Files, engine: &Engine) -> RenderReport {
        let mut report = RenderReport::new();
        for unit in &mut self.units {
            record(&mut report, unit, files, engine);
        }
        report
    }

    /// Render a single unit of this manifest
    pub fn render_unit(
        &mut self,
        id: UnitId,
        files: &mut Files,
        engine: &Engine,
    ) -> Option<RenderReport> {
        let unit = self.unit_mut(id)?;
        let mut report = RenderReport::new();
        record(&mut report, unit, files, engine);
        Some(report)
    }

    /// Re-parse and re-render after the definition file changed
    pub fn reload(
        &mut self,
        files: &mut Files,
        ids: &mut IdAllocator,
        engine: &Engine,
    ) -> RenderReport {
        tracing::info!("Reloading definition '{}'", self.path.display());
        match self.parse(files, ids) {
            Ok(()) => self.render_templates(files, engine),
            Err(e) => {
                tracing::error!("{}", e);
                let mut report = RenderReport::new();
                report.add_error(self.path.display().to_string(), e);
                report
            }
        }
    }

    fn dispose_units(&mut self, files: &mut Files) {
        for mut unit in self.units.drain(..) {
            unit.dispose(files);
        }
        files.release_unused();
    }

    /// Unsubscribe the manifest and all of its units
    pub fn dispose(&mut self, files: &mut Files) {
        self.dispose_units(files);
        files.unsubscribe(&self.path, &Listener::Manifest(self.id));
    }
}

fn record(report: &mut RenderReport, unit: &mut RenderUnit, files: &mut Files, engine: &Engine) {
    match unit.render(files, engine) {
        Ok(dest) => report.add_success(dest),
        Err(e) => {
            tracing::error!("{}", e);
            report.add_error(unit.label(), e);
        }
    }
}
