use crate::fsutil;
use crate::objects::ObjectKind;
use crate::paths::DatabasePaths;
use crate::runner;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

/// Scenario output directories removed by one cleanup pass.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Output whose scenario definition no longer exists.
    pub orphaned: Vec<String>,
    /// Output of a scenario that never wrote its finished marker.
    pub unfinished: Vec<String>,
    /// Output that should have been removed but could not be.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.orphaned.is_empty() && self.unfinished.is_empty()
    }
}

/// Remove orphaned and unfinished scenario output.
///
/// A directory that cannot be removed is logged, listed under `failed`, and
/// left for the next pass; it never stops the scan.
pub(super) fn remove_crashed_runs(paths: &DatabasePaths) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    let Some(scenarios_dir) = paths.kind_output_dir(ObjectKind::Scenario) else {
        return Ok(report);
    };
    if !scenarios_dir.is_dir() {
        return Ok(report);
    }
    let entries = fs::read_dir(&scenarios_dir)
        .with_context(|| format!("read {}", scenarios_dir.display()))?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(path = %scenarios_dir.display(), error = %err, "skipped unreadable entry");
                continue;
            }
        };
        let output_dir = entry.path();
        if !output_dir.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        // Scenario names are validated UTF-8, so any other name is orphaned.
        let (name, orphaned) = match file_name.to_str() {
            Some(name) => (
                name.to_string(),
                !paths.definition_path(ObjectKind::Scenario, name).is_file(),
            ),
            None => (file_name.to_string_lossy().into_owned(), true),
        };
        if !orphaned && runner::scenario_finished(paths, &name) {
            continue;
        }
        if let Err(err) = fsutil::remove_dir_all_if_exists(&output_dir) {
            tracing::warn!(
                scenario = %name,
                error = %format!("{err:#}"),
                "could not remove crashed run output"
            );
            report.failed.push(name);
            continue;
        }
        if orphaned {
            tracing::info!(scenario = %name, path = %output_dir.display(), "removed orphaned output");
            report.orphaned.push(name);
        } else {
            tracing::info!(scenario = %name, path = %output_dir.display(), "removed unfinished output");
            report.unfinished.push(name);
        }
    }
    report.orphaned.sort();
    report.unfinished.sort();
    report.failed.sort();
    Ok(report)
}
