//! Cost-benefit analysis over four scenario runs.
//!
//! The analysis compares expected annual damages with and without a strategy
//! now and in the future, interpolates the yearly benefit between the two
//! horizons and discounts it to present value.
use crate::catalog::Catalog;
use crate::error::{catalog_error, CatalogError};
use crate::fsutil;
use crate::objects::{Benefit, DomainObject, ObjectKind, Scenario, ScenarioRole};
use crate::runner::{self, ImpactMetrics};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BENEFIT_RESULTS_SCHEMA_VERSION: u32 = 1;
/// Impact metric the benefit is computed from.
pub const DAMAGE_METRIC: &str = "ExpectedAnnualDamages";

/// One row of the `check_scenarios` table.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScenarioCheck {
    pub role: ScenarioRole,
    pub event: String,
    pub projection: String,
    pub strategy: String,
    /// Name of the saved scenario matching this combination, if any.
    pub existing: Option<String>,
    pub finished: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YearlyBenefit {
    pub year: u32,
    pub benefit: f64,
    pub discounted_benefit: f64,
    pub cost: f64,
    pub discounted_cost: f64,
}

/// `output/Benefits/<name>/results.json`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BenefitResults {
    pub schema_version: u32,
    pub benefit: String,
    pub metric: String,
    pub current_year: u32,
    pub future_year: u32,
    pub discount_rate: f64,
    pub benefit_now: f64,
    pub benefit_future: f64,
    pub yearly: Vec<YearlyBenefit>,
    pub present_value_benefits: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present_value_costs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_present_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefit_cost_ratio: Option<f64>,
    /// Present-value benefits as `partition -> area -> value`.
    #[serde(default)]
    pub per_area: BTreeMap<String, BTreeMap<String, f64>>,
    pub generated_at_epoch_ms: u128,
}

pub struct BenefitRunner<'a> {
    catalog: &'a Catalog,
    benefit: Benefit,
}

impl<'a> BenefitRunner<'a> {
    pub fn new(catalog: &'a Catalog, name: &str) -> Result<Self> {
        let benefit = catalog.benefits.get(name)?;
        Ok(Self { catalog, benefit })
    }

    /// Runner for a definition that has not been saved yet, so its scenario
    /// table can be checked while the analysis is being set up.
    pub fn from_definition(catalog: &'a Catalog, benefit: Benefit) -> Self {
        Self { catalog, benefit }
    }

    pub fn benefit(&self) -> &Benefit {
        &self.benefit
    }

    /// Report, per required combination, the saved scenario matching it.
    ///
    /// Matching is by (event, projection, strategy); names are ignored.
    pub fn check_scenarios(&self) -> Result<Vec<ScenarioCheck>> {
        let saved = crate::store::read_all::<Scenario>(self.catalog.paths())?;
        let paths = self.catalog.paths();
        Ok(self
            .benefit
            .required_scenarios()
            .into_iter()
            .map(|(role, required)| {
                let existing = saved
                    .iter()
                    .find(|scenario| **scenario == required)
                    .map(|scenario| scenario.name.clone());
                let finished = existing
                    .as_deref()
                    .is_some_and(|name| runner::scenario_finished(paths, name));
                ScenarioCheck {
                    role,
                    event: required.event,
                    projection: required.projection,
                    strategy: required.strategy,
                    existing,
                    finished,
                }
            })
            .collect())
    }

    /// Save a scenario for every required combination that has none.
    ///
    /// A scenario created concurrently under the derived name is accepted as
    /// long as it describes the same combination.
    pub fn create_missing_scenarios(&self) -> Result<Vec<String>> {
        let checks = self.check_scenarios()?;
        let mut created = Vec::new();
        for (check, (_, scenario)) in checks.iter().zip(self.benefit.required_scenarios()) {
            if check.existing.is_some() {
                continue;
            }
            match self.catalog.scenarios.save(&scenario, false) {
                Ok(()) => {
                    tracing::info!(
                        benefit = %self.benefit.name,
                        scenario = %scenario.name,
                        role = %check.role,
                        "created scenario for benefit"
                    );
                    created.push(scenario.name.clone());
                }
                Err(err) => {
                    let raced = matches!(
                        catalog_error(&err),
                        Some(CatalogError::AlreadyExists { .. })
                    ) && self.catalog.scenarios.get(&scenario.name)? == scenario;
                    if !raced {
                        return Err(err);
                    }
                    tracing::debug!(scenario = %scenario.name, "scenario already created");
                }
            }
        }
        Ok(created)
    }

    /// All four scenarios exist and have finished running.
    pub fn ready_to_run(&self) -> Result<bool> {
        Ok(self
            .check_scenarios()?
            .iter()
            .all(|check| check.existing.is_some() && check.finished))
    }

    pub fn run(&self) -> Result<BenefitResults> {
        self.benefit.validate()?;
        let checks = self.check_scenarios()?;
        let pending: Vec<String> = checks
            .iter()
            .filter(|check| !check.finished)
            .map(|check| match &check.existing {
                Some(name) => format!("{} ({name} has not run)", check.role),
                None => format!("{} (no scenario)", check.role),
            })
            .collect();
        if !pending.is_empty() {
            return Err(CatalogError::NotReady {
                kind: ObjectKind::Benefit,
                name: self.benefit.name.clone(),
                reason: format!("required scenarios missing: {}", pending.join(", ")),
            }
            .into());
        }

        let mut metrics = BTreeMap::new();
        for check in &checks {
            if let Some(name) = &check.existing {
                metrics.insert(check.role, self.catalog.impact_metrics(name)?);
            }
        }
        let damage = |role: ScenarioRole| -> Result<f64> {
            metrics
                .get(&role)
                .and_then(|metrics| metrics.metric(DAMAGE_METRIC))
                .ok_or_else(|| {
                    CatalogError::NotReady {
                        kind: ObjectKind::Benefit,
                        name: self.benefit.name.clone(),
                        reason: format!("{role} scenario reports no {DAMAGE_METRIC}"),
                    }
                    .into()
                })
        };
        let benefit_now = damage(ScenarioRole::BaselineNow)? - damage(ScenarioRole::MeasuresNow)?;
        let benefit_future =
            damage(ScenarioRole::BaselineFuture)? - damage(ScenarioRole::MeasuresFuture)?;

        let yearly = yearly_benefits(&self.benefit, benefit_now, benefit_future);
        let present_value_benefits: f64 = yearly.iter().map(|row| row.discounted_benefit).sum();
        let (present_value_costs, net_present_value, benefit_cost_ratio) =
            if self.benefit.has_costs() {
                let costs: f64 = yearly.iter().map(|row| row.discounted_cost).sum();
                let ratio = (costs > 0.0).then_some(present_value_benefits / costs);
                (Some(costs), Some(present_value_benefits - costs), ratio)
            } else {
                (None, None, None)
            };

        let results = BenefitResults {
            schema_version: BENEFIT_RESULTS_SCHEMA_VERSION,
            benefit: self.benefit.name.clone(),
            metric: DAMAGE_METRIC.to_string(),
            current_year: self.benefit.current_situation.year,
            future_year: self.benefit.future_year,
            discount_rate: self.benefit.discount_rate,
            benefit_now,
            benefit_future,
            yearly,
            present_value_benefits,
            present_value_costs,
            net_present_value,
            benefit_cost_ratio,
            per_area: self.per_area_benefits(&metrics),
            generated_at_epoch_ms: fsutil::now_epoch_ms()?,
        };
        let path = self.catalog.paths().benefit_results_path(&self.benefit.name);
        fsutil::write_json(&path, &results)?;
        tracing::info!(
            benefit = %self.benefit.name,
            present_value_benefits,
            net_present_value = ?net_present_value,
            path = %path.display(),
            "benefit analysis complete"
        );
        Ok(results)
    }

    fn per_area_benefits(
        &self,
        metrics: &BTreeMap<ScenarioRole, ImpactMetrics>,
    ) -> BTreeMap<String, BTreeMap<String, f64>> {
        let mut per_area = BTreeMap::new();
        for partition in &self.catalog.site().aggregation_areas {
            let by_role: BTreeMap<ScenarioRole, BTreeMap<String, f64>> = metrics
                .iter()
                .map(|(role, metrics)| (*role, metrics.area_metric(partition, DAMAGE_METRIC)))
                .collect();
            let mut areas: Vec<&String> = by_role.values().flat_map(|values| values.keys()).collect();
            areas.sort();
            areas.dedup();
            let value = |role: ScenarioRole, area: &str| {
                by_role
                    .get(&role)
                    .and_then(|values| values.get(area))
                    .copied()
                    .unwrap_or(0.0)
            };
            let mut partition_values = BTreeMap::new();
            for area in areas {
                let now = value(ScenarioRole::BaselineNow, area) - value(ScenarioRole::MeasuresNow, area);
                let future = value(ScenarioRole::BaselineFuture, area)
                    - value(ScenarioRole::MeasuresFuture, area);
                let total: f64 = yearly_benefits(&self.benefit, now, future)
                    .iter()
                    .map(|row| row.discounted_benefit)
                    .sum();
                partition_values.insert(area.clone(), total);
            }
            per_area.insert(partition.clone(), partition_values);
        }
        per_area
    }
}

/// Yearly benefit linearly interpolated between the two horizons, with
/// costs: implementation in the first year, maintenance every year.
///
/// Empty when the future year precedes the current year.
fn yearly_benefits(benefit: &Benefit, benefit_now: f64, benefit_future: f64) -> Vec<YearlyBenefit> {
    let current = benefit.current_situation.year;
    let future = benefit.future_year;
    let span = f64::from(future.saturating_sub(current).max(1));
    let rate = benefit.discount_rate;
    (current..=future)
        .map(|year| {
            let elapsed = f64::from(year - current);
            let value = benefit_now + (benefit_future - benefit_now) * elapsed / span;
            let discount = (1.0 + rate).powf(elapsed);
            let mut cost = benefit.annual_maint_cost.unwrap_or(0.0);
            if year == current {
                cost += benefit.implementation_cost.unwrap_or(0.0);
            }
            YearlyBenefit {
                year,
                benefit: value,
                discounted_benefit: value / discount,
                cost,
                discounted_cost: cost / discount,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::objects::CurrentSituation;

    fn benefit(current: u32, future: u32, rate: f64) -> Benefit {
        Benefit {
            name: "b".to_string(),
            description: String::new(),
            strategy: "walls".to_string(),
            event_set: "probabilistic".to_string(),
            projection: "future".to_string(),
            future_year: future,
            current_situation: CurrentSituation {
                projection: "current".to_string(),
                year: current,
            },
            baseline_strategy: "no_measures".to_string(),
            discount_rate: rate,
            implementation_cost: Some(1000.0),
            annual_maint_cost: None,
        }
    }

    #[test]
    fn constant_benefit_discounts_geometrically() {
        let yearly = yearly_benefits(&benefit(2025, 2027, 0.1), 100.0, 100.0);
        assert_eq!(yearly.len(), 3);
        assert!((yearly[0].discounted_benefit - 100.0).abs() < 1e-9);
        assert!((yearly[2].discounted_benefit - 100.0 / 1.21).abs() < 1e-9);
        assert!((yearly[0].cost - 1000.0).abs() < 1e-9);
        assert!(yearly[1].cost.abs() < 1e-9);
    }

    #[test]
    fn benefit_interpolates_between_horizons() {
        let yearly = yearly_benefits(&benefit(2020, 2030, 0.0), 10.0, 30.0);
        assert_eq!(yearly.first().map(|row| row.year), Some(2020));
        assert!((yearly[5].benefit - 20.0).abs() < 1e-9);
        assert!((yearly[10].benefit - 30.0).abs() < 1e-9);
    }

    #[test]
    fn reversed_horizons_yield_no_years() {
        assert!(yearly_benefits(&benefit(2025, 2020, 0.0), 10.0, 30.0).is_empty());
        let single = yearly_benefits(&benefit(2025, 2025, 0.0), 10.0, 30.0);
        assert_eq!(single.len(), 1);
        assert!((single[0].benefit - 10.0).abs() < 1e-9);
    }
}
