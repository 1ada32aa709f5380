//! Hazard stage and hazard-output reuse.
use super::{hazard_complete, run_simulator, Simulator, SimulatorLauncher};
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::floodmap::FLOODMAP_SCHEMA_VERSION;
use crate::objects::{
    FloodMap, FloodMapType, Forcings, MeasureKind, ObjectKind, PhysicalProjection, Scenario,
    ScenarioInputs, TimeWindow,
};
use crate::paths::{DatabasePaths, FLOODMAP_MANIFEST, SIMULATIONS_DIR};
use crate::store;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Input document written into every hazard working directory.
pub const HAZARD_INPUT_FILE: &str = "hazard_input.json";
/// File the hazard simulator must produce.
pub const HAZARD_OUTPUT_FILE: &str = "max_water_level.tif";
/// Directory under `Flooding/` holding the maps listed in the manifest.
pub const MAPS_DIR: &str = "maps";

#[derive(Debug, Serialize)]
struct HazardInput<'a> {
    scenario: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_event: Option<&'a str>,
    time: &'a TimeWindow,
    forcings: &'a Forcings,
    physical: &'a PhysicalProjection,
    measures: Vec<&'a MeasureKind>,
}

/// Run the hazard simulator once per event (or once per sub-event of a risk
/// event set) and write the flood map manifest.
pub fn run_hazard(
    paths: &DatabasePaths,
    scenario: &Scenario,
    inputs: &ScenarioInputs,
    launcher: &dyn SimulatorLauncher,
) -> Result<FloodMap> {
    let name = scenario.name.as_str();
    let event = &inputs.event;
    let start = Instant::now();
    let measures: Vec<_> = inputs
        .strategy
        .load_measures(paths)?
        .into_iter()
        .filter(|measure| measure.is_hazard())
        .collect();

    let runs: Vec<(&str, Option<&str>, &Forcings)> = if event.is_risk() {
        event
            .sub_events
            .iter()
            .map(|sub| (sub.name.as_str(), Some(sub.name.as_str()), &sub.forcings))
            .collect()
    } else {
        vec![(event.name.as_str(), None, &event.forcings)]
    };

    let flooding_dir = paths.flooding_dir(name);
    let mut map_paths = Vec::new();
    for (label, sub_event, forcings) in runs {
        let work_dir = paths.simulations_dir(name).join(label);
        fs::create_dir_all(&work_dir)
            .with_context(|| format!("create {}", work_dir.display()))?;

        let event_dir = paths.object_dir(ObjectKind::Event, &event.name);
        for file in forcings.csv_files() {
            stage_aux_file(ObjectKind::Event, &event.name, &event_dir, file, &work_dir)?;
        }
        for measure in &measures {
            if let Some(file) = measure.kind.geometry_file() {
                let measure_dir = paths.object_dir(ObjectKind::Measure, &measure.name);
                stage_aux_file(ObjectKind::Measure, &measure.name, &measure_dir, file, &work_dir)?;
            }
        }
        let input = HazardInput {
            scenario: name,
            event: &event.name,
            sub_event,
            time: &event.time,
            forcings,
            physical: &inputs.projection.physical,
            measures: measures.iter().map(|measure| &measure.kind).collect(),
        };
        fsutil::write_json(&work_dir.join(HAZARD_INPUT_FILE), &input)?;

        run_simulator(launcher, Simulator::Hazard, &work_dir, HAZARD_OUTPUT_FILE)?;

        let rel = format!("{MAPS_DIR}/{label}.tif");
        let target = flooding_dir.join(&rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let produced = work_dir.join(HAZARD_OUTPUT_FILE);
        fs::copy(&produced, &target)
            .with_context(|| format!("copy {} to {}", produced.display(), target.display()))?;
        map_paths.push(rel);
    }

    let map = FloodMap {
        schema_version: FLOODMAP_SCHEMA_VERSION,
        scenario: name.to_string(),
        map_type: if event.is_risk() {
            FloodMapType::WaterDepth
        } else {
            FloodMapType::WaterLevel
        },
        paths: map_paths,
        generated_at_epoch_ms: fsutil::now_epoch_ms()?,
    };
    map.write(&paths.floodmap_manifest_path(name))?;
    tracing::info!(
        scenario = name,
        maps = map.paths.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "hazard stage complete"
    );
    Ok(map)
}

fn stage_aux_file(
    kind: ObjectKind,
    owner: &str,
    source_dir: &Path,
    rel: &str,
    work_dir: &Path,
) -> Result<()> {
    let source = source_dir.join(rel);
    if !source.is_file() {
        return Err(CatalogError::validation(
            kind,
            owner,
            format!("auxiliary file '{rel}' is missing from {}", source_dir.display()),
        )
        .into());
    }
    let target = work_dir.join(rel);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::copy(&source, &target)
        .with_context(|| format!("copy {} to {}", source.display(), target.display()))?;
    Ok(())
}

/// Copy the hazard output of a completed, hazard-equivalent scenario into
/// `scenario`'s output, returning the source scenario name.
///
/// Only scenarios whose hazard stage completed are candidates. Transient
/// simulation directories are not copied, and the manifest is written last so
/// an interrupted copy never looks complete.
pub fn reuse_equivalent_hazard(paths: &DatabasePaths, scenario: &Scenario) -> Result<Option<String>> {
    for candidate in store::read_all::<Scenario>(paths)? {
        if candidate.name == scenario.name || !hazard_complete(paths, &candidate.name) {
            continue;
        }
        if !scenario.is_hazard_equivalent(&candidate, paths)? {
            continue;
        }
        let source = paths.flooding_dir(&candidate.name);
        let dest = paths.flooding_dir(&scenario.name);
        fsutil::remove_dir_all_if_exists(&dest)?;
        let copied =
            fsutil::copy_dir_recursive(&source, &dest, &[SIMULATIONS_DIR, FLOODMAP_MANIFEST])?;

        let mut map = FloodMap::load(&paths.floodmap_manifest_path(&candidate.name))?;
        map.scenario = scenario.name.clone();
        map.write(&paths.floodmap_manifest_path(&scenario.name))?;
        tracing::info!(
            scenario = %scenario.name,
            source = %candidate.name,
            files = copied,
            "reused hazard output from equivalent scenario"
        );
        return Ok(Some(candidate.name));
    }
    Ok(None)
}
