//! Scenario execution: hazard stage, impact stage, finished marker.
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::Scenario;
use crate::paths::DatabasePaths;
use crate::site::SiteConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Instant;

pub mod hazard;
pub mod impact;
pub mod launcher;

pub use impact::ImpactMetrics;
pub use launcher::{CommandLauncher, ProcessOutput, Simulator, SimulatorLauncher};

/// Whether the scenario's hazard stage completed (its flood map manifest exists).
pub fn hazard_complete(paths: &DatabasePaths, scenario: &str) -> bool {
    paths.floodmap_manifest_path(scenario).is_file()
}

/// Whether the whole scenario completed.
pub fn scenario_finished(paths: &DatabasePaths, scenario: &str) -> bool {
    paths.scenario_finished_marker(scenario).is_file()
}

/// Runs one scenario's stages against the configured simulators.
pub struct ScenarioRunner<'a> {
    paths: &'a DatabasePaths,
    site: &'a SiteConfig,
    launcher: &'a dyn SimulatorLauncher,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(
        paths: &'a DatabasePaths,
        site: &'a SiteConfig,
        launcher: &'a dyn SimulatorLauncher,
    ) -> Self {
        Self {
            paths,
            site,
            launcher,
        }
    }

    /// Run the hazard stage unless it already completed, then the impact
    /// stage, then write the finished marker.
    pub fn run(&self, scenario: &Scenario) -> Result<()> {
        let name = scenario.name.as_str();
        if scenario_finished(self.paths, name) {
            tracing::info!(scenario = name, "scenario already finished");
            return Ok(());
        }
        let start = Instant::now();
        let inputs = scenario.load_inputs(self.paths)?;

        if hazard_complete(self.paths, name) {
            tracing::info!(scenario = name, "hazard output present; skipping hazard stage");
        } else {
            fsutil::remove_dir_all_if_exists(&self.paths.flooding_dir(name))?;
            hazard::run_hazard(self.paths, scenario, &inputs, self.launcher)?;
        }

        fsutil::remove_dir_all_if_exists(&self.paths.impacts_dir(name))?;
        impact::run_impact(self.paths, self.site, scenario, &inputs, self.launcher)?;

        let marker = self.paths.scenario_finished_marker(name);
        let finished_at = fsutil::now_epoch_ms()?;
        fs::write(&marker, format!("{finished_at}\n"))
            .with_context(|| format!("write {}", marker.display()))?;
        tracing::info!(
            scenario = name,
            elapsed_ms = start.elapsed().as_millis(),
            "scenario finished"
        );
        Ok(())
    }
}

/// Invoke a simulator whose inputs are already in `work_dir`.
///
/// Fails when the process exits non-zero or when `expected_output` is not
/// produced. Captured stdout and stderr go to `<simulator>.log` either way.
pub(crate) fn run_simulator(
    launcher: &dyn SimulatorLauncher,
    simulator: Simulator,
    work_dir: &Path,
    expected_output: &str,
) -> Result<()> {
    let start = Instant::now();
    tracing::info!(simulator = %simulator, work_dir = %work_dir.display(), "simulator start");
    let failure = |detail: String| -> anyhow::Error {
        CatalogError::ExternalProcessFailure {
            simulator: simulator.to_string(),
            work_dir: work_dir.display().to_string(),
            detail,
        }
        .into()
    };

    let log_path = work_dir.join(simulator.log_file_name());
    let output = match launcher.launch(simulator, work_dir) {
        Ok(output) => output,
        Err(err) => {
            let detail = format!("{err:#}");
            let log = format!("== launch error ==\n{detail}\n");
            fs::write(&log_path, log).with_context(|| format!("write {}", log_path.display()))?;
            return Err(failure(format!("could not start: {detail}")));
        }
    };

    let mut log = Vec::new();
    log.extend_from_slice(b"== stdout ==\n");
    log.extend_from_slice(&output.stdout);
    log.extend_from_slice(b"\n== stderr ==\n");
    log.extend_from_slice(&output.stderr);
    fs::write(&log_path, log).with_context(|| format!("write {}", log_path.display()))?;

    if !output.success {
        return Err(failure(format!(
            "exited with {}; see {}",
            output.status,
            log_path.display()
        )));
    }
    if !work_dir.join(expected_output).is_file() {
        return Err(failure(format!(
            "expected output {expected_output} was not produced"
        )));
    }
    tracing::info!(
        simulator = %simulator,
        elapsed_ms = start.elapsed().as_millis(),
        "simulator finished"
    );
    Ok(())
}
