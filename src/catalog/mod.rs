//! The catalog: one store per object kind over a single database.
//!
//! `Catalog` is an explicit value; callers open it, pass it by reference, and
//! close it. `CatalogSession` adds the init/reinit/shutdown lifecycle for
//! front ends that switch between databases.
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::{
    Benefit, Event, FloodMap, Measure, ObjectKind, Projection, Scenario, Strategy, TippingPoint,
};
use crate::paths::DatabasePaths;
use crate::runner::{
    self, hazard, CommandLauncher, ImpactMetrics, ScenarioRunner, SimulatorLauncher,
};
use crate::settings::Settings;
use crate::site::{self, SiteConfig};
use crate::store::ObjectStore;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

mod cleanup;

pub use cleanup::CleanupReport;

pub struct Catalog {
    settings: Settings,
    paths: DatabasePaths,
    site: SiteConfig,
    launcher: Box<dyn SimulatorLauncher>,
    pub events: ObjectStore<Event>,
    pub projections: ObjectStore<Projection>,
    pub measures: ObjectStore<Measure>,
    pub strategies: ObjectStore<Strategy>,
    pub scenarios: ObjectStore<Scenario>,
    pub benefits: ObjectStore<Benefit>,
    pub tipping_points: ObjectStore<TippingPoint>,
}

/// Output status of one scenario.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScenarioOutput {
    pub name: String,
    pub path: PathBuf,
    pub finished: bool,
    pub hazard_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood_map: Option<FloodMap>,
}

impl Catalog {
    /// Open the database named by `settings` with simulators launched per the
    /// settings' execution mode.
    pub fn open(settings: Settings) -> Result<Catalog> {
        let launcher = Box::new(CommandLauncher::from_settings(&settings));
        Catalog::open_with_launcher(settings, launcher)
    }

    /// Open with an explicit launcher; runs crash cleanup when enabled.
    pub fn open_with_launcher(
        settings: Settings,
        launcher: Box<dyn SimulatorLauncher>,
    ) -> Result<Catalog> {
        let paths = DatabasePaths::new(&settings.database_root, &settings.database_name);
        let site = site::load_site_config(&paths)?;
        let standard = |kind: ObjectKind| site.standard_names(kind);
        let catalog = Catalog {
            events: ObjectStore::new(paths.clone(), standard(ObjectKind::Event)),
            projections: ObjectStore::new(paths.clone(), standard(ObjectKind::Projection)),
            measures: ObjectStore::new(paths.clone(), standard(ObjectKind::Measure)),
            strategies: ObjectStore::new(paths.clone(), standard(ObjectKind::Strategy)),
            scenarios: ObjectStore::new(paths.clone(), standard(ObjectKind::Scenario)),
            benefits: ObjectStore::new(paths.clone(), standard(ObjectKind::Benefit)),
            tipping_points: ObjectStore::new(paths.clone(), standard(ObjectKind::TippingPoint)),
            settings,
            paths,
            site,
            launcher,
        };
        tracing::info!(
            root = %catalog.paths.root().display(),
            site = %catalog.site.name,
            "catalog opened"
        );
        // Crash recovery is best effort; a failed pass never blocks opening.
        if let Err(err) = catalog.cleanup() {
            tracing::warn!(
                root = %catalog.paths.root().display(),
                error = %format!("{err:#}"),
                "crash cleanup failed"
            );
        }
        Ok(catalog)
    }

    /// Release the catalog. Nothing is cached beyond the value itself, so this
    /// only logs; it exists to make the lifecycle explicit at call sites.
    pub fn close(self) {
        tracing::info!(root = %self.paths.root().display(), "catalog closed");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn paths(&self) -> &DatabasePaths {
        &self.paths
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Whether this catalog is the one `root` + `name` refers to.
    pub fn is_database(&self, root: &Path, name: &str) -> bool {
        self.settings.database_root == root && self.settings.database_name == name
    }

    /// Remove orphaned and unfinished scenario output when crash cleanup is
    /// enabled.
    pub fn cleanup(&self) -> Result<CleanupReport> {
        if !self.settings.delete_crashed_runs {
            return Ok(CleanupReport::default());
        }
        self.remove_crashed_runs()
    }

    /// Remove orphaned and unfinished scenario output whatever the settings say.
    pub fn remove_crashed_runs(&self) -> Result<CleanupReport> {
        cleanup::remove_crashed_runs(&self.paths)
    }

    /// Run every named scenario in order, attempting all of them even when
    /// some fail, then report the failures together.
    pub fn run_scenarios<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut failed = Vec::new();
        for name in names {
            let name = name.as_ref();
            if let Err(err) = self.run_scenario(name) {
                tracing::warn!(scenario = name, error = %format!("{err:#}"), "scenario failed");
                failed.push((name.to_string(), format!("{err:#}")));
            }
        }
        if !failed.is_empty() {
            return Err(CatalogError::PartialBatchFailure { failed }.into());
        }
        Ok(())
    }

    fn run_scenario(&self, name: &str) -> Result<()> {
        let scenario = self.scenarios.get(name)?;
        self.has_run_hazard(name)?;
        ScenarioRunner::new(&self.paths, &self.site, self.launcher.as_ref()).run(&scenario)
    }

    /// Whether `name`'s hazard output is available, reusing the output of a
    /// completed hazard-equivalent scenario when there is one.
    pub fn has_run_hazard(&self, name: &str) -> Result<bool> {
        if runner::hazard_complete(&self.paths, name) {
            return Ok(true);
        }
        let scenario = self.scenarios.get(name)?;
        Ok(hazard::reuse_equivalent_hazard(&self.paths, &scenario)?.is_some())
    }

    pub fn scenario_has_run(&self, name: &str) -> Result<bool> {
        if !self.scenarios.exists(name) {
            return Err(CatalogError::not_found(ObjectKind::Scenario, name).into());
        }
        Ok(runner::scenario_finished(&self.paths, name))
    }

    /// Output status of every scenario that has an output directory.
    pub fn list_scenario_outputs(&self) -> Result<Vec<ScenarioOutput>> {
        let scenarios_dir = self.paths.output_dir().join("Scenarios");
        let mut outputs = Vec::new();
        for name in fsutil::subdirectory_names(&scenarios_dir)? {
            let hazard_complete = runner::hazard_complete(&self.paths, &name);
            let flood_map = if hazard_complete {
                Some(FloodMap::load(&self.paths.floodmap_manifest_path(&name))?)
            } else {
                None
            };
            outputs.push(ScenarioOutput {
                path: self.paths.scenario_output_dir(&name),
                finished: runner::scenario_finished(&self.paths, &name),
                hazard_complete,
                flood_map,
                name,
            });
        }
        Ok(outputs)
    }

    pub fn flood_map(&self, scenario: &str) -> Result<FloodMap> {
        if !runner::hazard_complete(&self.paths, scenario) {
            return Err(CatalogError::NotReady {
                kind: ObjectKind::Scenario,
                name: scenario.to_string(),
                reason: "its hazard stage has not completed".to_string(),
            }
            .into());
        }
        FloodMap::load(&self.paths.floodmap_manifest_path(scenario))
    }

    pub fn impact_metrics(&self, scenario: &str) -> Result<ImpactMetrics> {
        if !runner::scenario_finished(&self.paths, scenario) {
            return Err(CatalogError::NotReady {
                kind: ObjectKind::Scenario,
                name: scenario.to_string(),
                reason: "it has not finished running".to_string(),
            }
            .into());
        }
        ImpactMetrics::load(&self.paths.impact_metrics_path(scenario))
    }
}

/// Holds at most one open catalog for front ends that switch databases.
#[derive(Default)]
pub struct CatalogSession {
    current: Option<Catalog>,
}

impl CatalogSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `settings`' database, reusing the current catalog when it already
    /// points there.
    pub fn init(&mut self, settings: Settings) -> Result<&Catalog> {
        let launcher = Box::new(CommandLauncher::from_settings(&settings));
        self.init_with_launcher(settings, launcher)
    }

    pub fn init_with_launcher(
        &mut self,
        settings: Settings,
        launcher: Box<dyn SimulatorLauncher>,
    ) -> Result<&Catalog> {
        let same = self.current.as_ref().is_some_and(|catalog| {
            catalog.is_database(&settings.database_root, &settings.database_name)
        });
        if !same {
            self.shutdown();
            self.current = Some(Catalog::open_with_launcher(settings, launcher)?);
        }
        self.catalog()
    }

    /// Close the current catalog, if any.
    pub fn shutdown(&mut self) {
        if let Some(catalog) = self.current.take() {
            catalog.close();
        }
    }

    pub fn catalog(&self) -> Result<&Catalog> {
        self.current
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no catalog is open"))
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}
