//! Tipping-point search definitions.
//!
//! A tipping point sweeps sea-level rise over a list of increments and looks
//! for the first increment where an impact metric crosses its threshold.
use super::{require_reference, DomainObject, ObjectKind, Scenario};
use crate::error::CatalogError;
use crate::paths::DatabasePaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TippingPoint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event_set: String,
    /// Base projection; only its sea-level rise is varied.
    pub projection: String,
    pub strategy: String,
    pub sea_level_rise_m: Vec<f64>,
    pub metrics: Vec<MetricCondition>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricCondition {
    pub name: String,
    pub threshold: f64,
    pub operator: Operator,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Greater,
    Less,
}

impl Operator {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Greater => value > threshold,
            Operator::Less => value < threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Greater => f.write_str(">"),
            Operator::Less => f.write_str("<"),
        }
    }
}

impl MetricCondition {
    pub fn is_met(&self, value: f64) -> bool {
        self.operator.holds(value, self.threshold)
    }
}

/// `1.25` -> `1p25`, keeping derived names free of extra dots.
fn increment_label(sea_level_rise_m: f64) -> String {
    format!("{sea_level_rise_m:.2}").replace('.', "p").replace('-', "m")
}

impl TippingPoint {
    /// Increments in the order the search visits them.
    pub fn ordered_increments(&self) -> Vec<f64> {
        let mut increments = self.sea_level_rise_m.clone();
        increments.sort_by(|a, b| a.total_cmp(b));
        increments
    }

    pub fn derived_projection_name(&self, sea_level_rise_m: f64) -> String {
        format!("{}_slr{}", self.name, increment_label(sea_level_rise_m))
    }

    pub fn derived_scenario_name(&self, sea_level_rise_m: f64) -> String {
        format!(
            "{}_{}_{}_slr{}",
            self.name,
            self.event_set,
            self.strategy,
            increment_label(sea_level_rise_m)
        )
    }

    pub fn derived_scenario(&self, sea_level_rise_m: f64) -> Scenario {
        let mut scenario = Scenario::new(
            &self.derived_scenario_name(sea_level_rise_m),
            &self.event_set,
            &self.derived_projection_name(sea_level_rise_m),
            &self.strategy,
        );
        scenario.description = format!(
            "created for tipping point '{}' at {sea_level_rise_m} m sea-level rise",
            self.name
        );
        scenario
    }

    pub fn derives_scenario(&self, scenario: &Scenario) -> bool {
        self.sea_level_rise_m
            .iter()
            .any(|value| self.derived_scenario(*value).key() == scenario.key())
    }
}

impl DomainObject for TippingPoint {
    const KIND: ObjectKind = ObjectKind::TippingPoint;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn set_description(&mut self, description: String) {
        self.description = description;
    }

    fn validate_fields(&self) -> Result<()> {
        let invalid = |message: String| -> anyhow::Error {
            CatalogError::validation(ObjectKind::TippingPoint, &self.name, message).into()
        };
        if self.sea_level_rise_m.is_empty() {
            return Err(invalid("at least one sea-level rise increment is required".to_string()));
        }
        if self.sea_level_rise_m.iter().any(|value| !value.is_finite()) {
            return Err(invalid("sea-level rise increments must be finite".to_string()));
        }
        let ordered = self.ordered_increments();
        if ordered
            .windows(2)
            .any(|pair| increment_label(pair[0]) == increment_label(pair[1]))
        {
            return Err(invalid(
                "sea-level rise increments must differ at centimeter precision".to_string(),
            ));
        }
        if self.metrics.is_empty() {
            return Err(invalid("at least one metric condition is required".to_string()));
        }
        for metric in &self.metrics {
            if metric.name.trim().is_empty() || !metric.threshold.is_finite() {
                return Err(invalid(format!(
                    "metric condition '{}' needs a name and a finite threshold",
                    metric.name
                )));
            }
        }
        Ok(())
    }

    fn validate_references(&self, paths: &DatabasePaths) -> Result<()> {
        let references = [
            (ObjectKind::Event, &self.event_set),
            (ObjectKind::Projection, &self.projection),
            (ObjectKind::Strategy, &self.strategy),
        ];
        for (kind, name) in references {
            require_reference(paths, ObjectKind::TippingPoint, &self.name, kind, name)?;
        }
        Ok(())
    }
}
