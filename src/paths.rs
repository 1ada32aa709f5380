//! Typed paths into a catalog database layout.
//!
//! Centralizing path construction keeps file access consistent across the
//! stores, the runners, and cleanup.
use crate::objects::ObjectKind;
use std::path::{Path, PathBuf};

pub const DEFINITION_EXTENSION: &str = "toml";
pub const FINISHED_MARKER: &str = "finished.txt";
pub const FLOODING_DIR: &str = "Flooding";
pub const IMPACTS_DIR: &str = "Impacts";
/// Transient simulator working directories inside `Flooding/`.
pub const SIMULATIONS_DIR: &str = "simulations";
pub const FLOODMAP_MANIFEST: &str = "floodmap.json";
pub const IMPACT_METRICS_FILE: &str = "metrics.json";

/// Path helper rooted at `<database_root>/<database_name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePaths {
    root: PathBuf,
}

impl DatabasePaths {
    pub fn new(database_root: &Path, database_name: &str) -> Self {
        Self {
            root: database_root.join(database_name),
        }
    }

    /// Return the database directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `input/` directory.
    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    /// Return the `output/` directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Return the `static/config/site.toml` path.
    pub fn site_config_path(&self) -> PathBuf {
        self.root.join("static").join("config").join("site.toml")
    }

    /// Return the `input/<kind>/` directory.
    pub fn kind_dir(&self, kind: ObjectKind) -> PathBuf {
        self.input_dir().join(kind.input_dir_name())
    }

    /// Return the `input/<kind>/<name>/` directory.
    pub fn object_dir(&self, kind: ObjectKind, name: &str) -> PathBuf {
        self.kind_dir(kind).join(name)
    }

    /// Return the `input/<kind>/<name>/<name>.toml` definition path.
    pub fn definition_path(&self, kind: ObjectKind, name: &str) -> PathBuf {
        self.object_dir(kind, name)
            .join(format!("{name}.{DEFINITION_EXTENSION}"))
    }

    /// Return `output/<Kind>/` for kinds that produce output.
    pub fn kind_output_dir(&self, kind: ObjectKind) -> Option<PathBuf> {
        kind.output_dir_name()
            .map(|dir_name| self.output_dir().join(dir_name))
    }

    /// Return `output/<Kind>/<name>/` for kinds that produce output.
    pub fn object_output_dir(&self, kind: ObjectKind, name: &str) -> Option<PathBuf> {
        self.kind_output_dir(kind).map(|dir| dir.join(name))
    }

    /// Return the `output/Scenarios/<name>/` directory.
    pub fn scenario_output_dir(&self, name: &str) -> PathBuf {
        self.output_dir().join("Scenarios").join(name)
    }

    /// Return the `output/Scenarios/<name>/finished.txt` marker path.
    pub fn scenario_finished_marker(&self, name: &str) -> PathBuf {
        self.scenario_output_dir(name).join(FINISHED_MARKER)
    }

    /// Return the `output/Scenarios/<name>/Flooding/` directory.
    pub fn flooding_dir(&self, name: &str) -> PathBuf {
        self.scenario_output_dir(name).join(FLOODING_DIR)
    }

    /// Return the `Flooding/simulations/` working directory root.
    pub fn simulations_dir(&self, name: &str) -> PathBuf {
        self.flooding_dir(name).join(SIMULATIONS_DIR)
    }

    /// Return the `Flooding/floodmap.json` manifest path.
    pub fn floodmap_manifest_path(&self, name: &str) -> PathBuf {
        self.flooding_dir(name).join(FLOODMAP_MANIFEST)
    }

    /// Return the `output/Scenarios/<name>/Impacts/` directory.
    pub fn impacts_dir(&self, name: &str) -> PathBuf {
        self.scenario_output_dir(name).join(IMPACTS_DIR)
    }

    /// Return the `Impacts/metrics.json` path.
    pub fn impact_metrics_path(&self, name: &str) -> PathBuf {
        self.impacts_dir(name).join(IMPACT_METRICS_FILE)
    }

    /// Return the `output/Benefits/<name>/results.json` path.
    pub fn benefit_results_path(&self, name: &str) -> PathBuf {
        self.output_dir()
            .join("Benefits")
            .join(name)
            .join("results.json")
    }

    /// Return the `output/TippingPoints/<name>/progress.json` path.
    pub fn tipping_point_progress_path(&self, name: &str) -> PathBuf {
        self.output_dir()
            .join("TippingPoints")
            .join(name)
            .join("progress.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_lives_in_object_directory() {
        let paths = DatabasePaths::new(Path::new("/data"), "charleston");
        assert_eq!(
            paths.definition_path(ObjectKind::TippingPoint, "slr_test"),
            PathBuf::from("/data/charleston/input/tipping_points/slr_test/slr_test.toml")
        );
        assert_eq!(
            paths.object_output_dir(ObjectKind::Scenario, "s1"),
            Some(PathBuf::from("/data/charleston/output/Scenarios/s1"))
        );
        assert_eq!(paths.object_output_dir(ObjectKind::Measure, "m1"), None);
    }
}
