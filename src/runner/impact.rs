//! Impact stage: damage simulation on top of a completed flood map.
use super::{run_simulator, Simulator, SimulatorLauncher};
use crate::fsutil;
use crate::objects::{
    FloodMap, FloodMapType, MeasureKind, Scenario, ScenarioInputs, SocioEconomicChange,
};
use crate::paths::DatabasePaths;
use crate::site::SiteConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

pub const IMPACT_METRICS_SCHEMA_VERSION: u32 = 1;
pub const IMPACT_INPUT_FILE: &str = "impact_input.json";
/// File the impact simulator must produce.
pub const IMPACT_OUTPUT_FILE: &str = "impact_output.json";
const IMPACT_WORK_DIR: &str = "simulation";

/// Per-partition, per-area metric values: `partition -> area -> metric -> value`.
pub type AggregatedMetrics = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

/// What the impact simulator reports in its output file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SimulatorMetrics {
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub aggregation_areas: AggregatedMetrics,
}

/// `Impacts/metrics.json` of a scenario.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImpactMetrics {
    pub schema_version: u32,
    pub scenario: String,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub aggregation_areas: AggregatedMetrics,
    pub generated_at_epoch_ms: u128,
}

impl ImpactMetrics {
    pub fn load(path: &Path) -> Result<ImpactMetrics> {
        fsutil::read_json(path)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Values of `metric` for every area of one partition.
    pub fn area_metric(&self, partition: &str, metric: &str) -> BTreeMap<String, f64> {
        self.aggregation_areas
            .get(partition)
            .map(|areas| {
                areas
                    .iter()
                    .filter_map(|(area, values)| {
                        values.get(metric).map(|value| (area.clone(), *value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct FloodMapInput {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ImpactInput<'a> {
    scenario: &'a str,
    map_type: FloodMapType,
    flood_maps: Vec<FloodMapInput>,
    socio_economic: &'a SocioEconomicChange,
    measures: Vec<&'a MeasureKind>,
    aggregation_areas: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    return_periods: Vec<u32>,
}

/// Annual frequency of each sub-event, scaled by the projected storm
/// frequency increase.
pub fn sub_event_frequencies(inputs: &ScenarioInputs) -> BTreeMap<String, f64> {
    let factor = 1.0 + inputs.projection.physical.storm_frequency_increase_pct / 100.0;
    inputs
        .event
        .sub_events
        .iter()
        .map(|sub| (sub.name.clone(), sub.frequency * factor))
        .collect()
}

pub fn run_impact(
    paths: &DatabasePaths,
    site: &SiteConfig,
    scenario: &Scenario,
    inputs: &ScenarioInputs,
    launcher: &dyn SimulatorLauncher,
) -> Result<ImpactMetrics> {
    let name = scenario.name.as_str();
    let start = Instant::now();
    let flooding_dir = paths.flooding_dir(name);
    let flood_map = FloodMap::load(&paths.floodmap_manifest_path(name))?;
    let frequencies = sub_event_frequencies(inputs);

    let flood_maps = flood_map
        .resolve(&flooding_dir)
        .into_iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            FloodMapInput {
                path: path.display().to_string(),
                frequency: frequencies.get(&stem).copied(),
            }
        })
        .collect();

    let measures: Vec<_> = inputs
        .strategy
        .load_measures(paths)?
        .into_iter()
        .filter(|measure| !measure.is_hazard())
        .collect();

    let work_dir = paths.impacts_dir(name).join(IMPACT_WORK_DIR);
    fs::create_dir_all(&work_dir).with_context(|| format!("create {}", work_dir.display()))?;
    let input = ImpactInput {
        scenario: name,
        map_type: flood_map.map_type,
        flood_maps,
        socio_economic: &inputs.projection.socio_economic,
        measures: measures.iter().map(|measure| &measure.kind).collect(),
        aggregation_areas: &site.aggregation_areas,
        return_periods: if inputs.event.is_risk() {
            site.risk.return_periods.clone()
        } else {
            Vec::new()
        },
    };
    fsutil::write_json(&work_dir.join(IMPACT_INPUT_FILE), &input)?;

    run_simulator(launcher, Simulator::Impact, &work_dir, IMPACT_OUTPUT_FILE)?;

    let reported: SimulatorMetrics = fsutil::read_json(&work_dir.join(IMPACT_OUTPUT_FILE))?;
    if let Some((metric, _)) = reported.metrics.iter().find(|(_, value)| !value.is_finite()) {
        return Err(anyhow!(
            "impact simulator reported a non-finite value for {metric} in scenario {name}"
        ));
    }
    let metrics = ImpactMetrics {
        schema_version: IMPACT_METRICS_SCHEMA_VERSION,
        scenario: name.to_string(),
        metrics: reported.metrics,
        aggregation_areas: reported.aggregation_areas,
        generated_at_epoch_ms: fsutil::now_epoch_ms()?,
    };
    fsutil::write_json(&paths.impact_metrics_path(name), &metrics)?;
    tracing::info!(
        scenario = name,
        metrics = metrics.metrics.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "impact stage complete"
    );
    Ok(metrics)
}
