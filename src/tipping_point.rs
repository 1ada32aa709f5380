//! Sea-level-rise sweep that stops at the first increment crossing a metric
//! threshold.
use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::scenario::scenarios_referencing;
use crate::objects::{ObjectKind, Projection, Scenario, TippingPoint};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    NotStarted,
    Running,
    Reached,
    NotReached,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::NotStarted => "not_started",
            SearchStatus::Running => "running",
            SearchStatus::Reached => "reached",
            SearchStatus::NotReached => "not_reached",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchStatus::Reached | SearchStatus::NotReached)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IncrementProgress {
    pub sea_level_rise_m: f64,
    pub projection: String,
    pub scenario: String,
    /// Whether this search saved the scenario (false when it already existed).
    pub created: bool,
    pub run: bool,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Conditions that held at this increment.
    #[serde(default)]
    pub reached_metrics: Vec<String>,
    pub reached: bool,
}

/// `output/TippingPoints/<name>/progress.json`, rewritten after every step.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TippingPointProgress {
    pub schema_version: u32,
    pub tipping_point: String,
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reached_at_m: Option<f64>,
    pub increments: Vec<IncrementProgress>,
    pub updated_at_epoch_ms: u128,
}

impl TippingPointProgress {
    fn new(tipping_point: &str) -> Self {
        Self {
            schema_version: PROGRESS_SCHEMA_VERSION,
            tipping_point: tipping_point.to_string(),
            status: SearchStatus::NotStarted,
            reached_at_m: None,
            increments: Vec::new(),
            updated_at_epoch_ms: 0,
        }
    }
}

pub struct TippingPointSearch<'a> {
    catalog: &'a Catalog,
    tipping_point: TippingPoint,
    progress: TippingPointProgress,
}

impl<'a> TippingPointSearch<'a> {
    pub fn new(catalog: &'a Catalog, name: &str) -> Result<Self> {
        let tipping_point = catalog.tipping_points.get(name)?;
        let progress = TippingPointProgress::new(&tipping_point.name);
        Ok(Self {
            catalog,
            tipping_point,
            progress,
        })
    }

    /// Progress persisted by an earlier search, if any.
    pub fn load_progress(catalog: &Catalog, name: &str) -> Result<Option<TippingPointProgress>> {
        let path = catalog.paths().tipping_point_progress_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        fsutil::read_json(&path).map(Some)
    }

    pub fn status(&self) -> SearchStatus {
        self.progress.status
    }

    pub fn progress(&self) -> &TippingPointProgress {
        &self.progress
    }

    /// Visit increments in ascending order until one reaches the tipping point.
    pub fn run(&mut self) -> Result<&TippingPointProgress> {
        let base = self
            .catalog
            .projections
            .get(&self.tipping_point.projection)?;
        self.progress = TippingPointProgress::new(&self.tipping_point.name);
        self.progress.status = SearchStatus::Running;
        self.persist()?;

        for sea_level_rise_m in self.tipping_point.ordered_increments() {
            let projection_name = self.tipping_point.derived_projection_name(sea_level_rise_m);
            let mut projection = base.with_sea_level_rise(projection_name.clone(), sea_level_rise_m);
            projection.description = format!(
                "created for tipping point '{}'",
                self.tipping_point.name
            );
            self.prepare_projection(&projection)?;
            let scenario = self.tipping_point.derived_scenario(sea_level_rise_m);
            let created = self.prepare_scenario(&scenario)?;
            self.progress.increments.push(IncrementProgress {
                sea_level_rise_m,
                projection: projection_name,
                scenario: scenario.name.clone(),
                created,
                run: false,
                metrics: BTreeMap::new(),
                reached_metrics: Vec::new(),
                reached: false,
            });
            self.persist()?;

            self.catalog.run_scenarios(&[scenario.name.as_str()])?;
            let metrics = self.catalog.impact_metrics(&scenario.name)?;

            let mut values = BTreeMap::new();
            let mut reached_metrics = Vec::new();
            for condition in &self.tipping_point.metrics {
                let value = metrics.metric(&condition.name).ok_or_else(|| {
                    CatalogError::validation(
                        ObjectKind::TippingPoint,
                        &self.tipping_point.name,
                        format!(
                            "scenario '{}' reports no metric '{}'",
                            scenario.name, condition.name
                        ),
                    )
                })?;
                values.insert(condition.name.clone(), value);
                if condition.is_met(value) {
                    reached_metrics.push(condition.name.clone());
                }
            }
            let reached = !reached_metrics.is_empty();
            tracing::info!(
                tipping_point = %self.tipping_point.name,
                sea_level_rise_m,
                reached,
                "tipping point increment evaluated"
            );
            if let Some(entry) = self.progress.increments.last_mut() {
                entry.run = true;
                entry.metrics = values;
                entry.reached_metrics = reached_metrics;
                entry.reached = reached;
            }
            if reached {
                self.progress.status = SearchStatus::Reached;
                self.progress.reached_at_m = Some(sea_level_rise_m);
                self.persist()?;
                return Ok(&self.progress);
            }
            self.persist()?;
        }

        self.progress.status = SearchStatus::NotReached;
        self.persist()?;
        tracing::info!(
            tipping_point = %self.tipping_point.name,
            "tipping point not reached within the configured increments"
        );
        Ok(&self.progress)
    }

    /// Save the derived projection, or bring an existing one in line with the
    /// current base projection.
    ///
    /// A stale projection is rewritten and the output of every scenario using
    /// it is cleared. Users other than scenarios make it an error instead.
    fn prepare_projection(&self, wanted: &Projection) -> Result<()> {
        let projections = &self.catalog.projections;
        if !projections.exists(&wanted.name) {
            return projections.save(wanted, false);
        }
        let existing = projections.get(&wanted.name)?;
        if existing.physical == wanted.physical && existing.socio_economic == wanted.socio_economic {
            return Ok(());
        }

        let paths = self.catalog.paths();
        let scenario_users = scenarios_referencing(paths, ObjectKind::Projection, &wanted.name)?;
        let other_users: Vec<String> = projections
            .check_higher_level_usage(&wanted.name)?
            .into_iter()
            .filter(|user| !scenario_users.contains(user))
            .collect();
        if !other_users.is_empty() {
            return Err(CatalogError::validation(
                ObjectKind::TippingPoint,
                &self.tipping_point.name,
                format!(
                    "derived projection '{}' no longer matches projection '{}' and is also used by {}",
                    wanted.name,
                    self.tipping_point.projection,
                    other_users.join(", ")
                ),
            )
            .into());
        }
        projections.replace_derived(wanted)?;
        for scenario in &scenario_users {
            self.catalog.scenarios.clear_output(scenario)?;
        }
        tracing::warn!(
            tipping_point = %self.tipping_point.name,
            projection = %wanted.name,
            cleared = scenario_users.len(),
            "refreshed stale derived projection"
        );
        Ok(())
    }

    /// Save the derived scenario unless an identical one exists; returns
    /// whether a definition was written.
    fn prepare_scenario(&self, wanted: &Scenario) -> Result<bool> {
        let scenarios = &self.catalog.scenarios;
        if !scenarios.exists(&wanted.name) {
            scenarios.save(wanted, false)?;
            return Ok(true);
        }
        let existing = scenarios.get(&wanted.name)?;
        if existing.key() == wanted.key() {
            return Ok(false);
        }
        scenarios.save(wanted, true)?;
        tracing::warn!(
            tipping_point = %self.tipping_point.name,
            scenario = %wanted.name,
            "replaced derived scenario with different inputs"
        );
        Ok(true)
    }

    fn persist(&mut self) -> Result<()> {
        self.progress.updated_at_epoch_ms = fsutil::now_epoch_ms()?;
        let path = self
            .catalog
            .paths()
            .tipping_point_progress_path(&self.tipping_point.name);
        fsutil::write_json(&path, &self.progress)
    }
}
