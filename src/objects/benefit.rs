//! Cost-benefit analysis definitions.
use super::{require_reference, DomainObject, Event, ObjectKind, Scenario};
use crate::error::CatalogError;
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Benefit {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Strategy whose benefit is evaluated.
    pub strategy: String,
    /// Risk event set every required scenario runs.
    pub event_set: String,
    /// Projection describing the future situation.
    pub projection: String,
    pub future_year: u32,
    pub current_situation: CurrentSituation,
    pub baseline_strategy: String,
    pub discount_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_maint_cost: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CurrentSituation {
    pub projection: String,
    pub year: u32,
}

/// Position of a scenario in the benefit comparison.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioRole {
    BaselineNow,
    MeasuresNow,
    BaselineFuture,
    MeasuresFuture,
}

impl ScenarioRole {
    pub const ALL: [ScenarioRole; 4] = [
        ScenarioRole::BaselineNow,
        ScenarioRole::MeasuresNow,
        ScenarioRole::BaselineFuture,
        ScenarioRole::MeasuresFuture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioRole::BaselineNow => "baseline_now",
            ScenarioRole::MeasuresNow => "measures_now",
            ScenarioRole::BaselineFuture => "baseline_future",
            ScenarioRole::MeasuresFuture => "measures_future",
        }
    }
}

impl fmt::Display for ScenarioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Benefit {
    /// The four (event, projection, strategy) combinations the analysis compares.
    pub fn required_scenarios(&self) -> [(ScenarioRole, Scenario); 4] {
        let build = |projection: &str, strategy: &str| {
            let name = format!("{projection}_{}_{strategy}", self.event_set);
            let mut scenario = Scenario::new(&name, &self.event_set, projection, strategy);
            scenario.description = format!("created for benefit analysis '{}'", self.name);
            scenario
        };
        let now = self.current_situation.projection.as_str();
        let future = self.projection.as_str();
        [
            (
                ScenarioRole::BaselineNow,
                build(now, &self.baseline_strategy),
            ),
            (ScenarioRole::MeasuresNow, build(now, &self.strategy)),
            (
                ScenarioRole::BaselineFuture,
                build(future, &self.baseline_strategy),
            ),
            (ScenarioRole::MeasuresFuture, build(future, &self.strategy)),
        ]
    }

    pub fn has_costs(&self) -> bool {
        self.implementation_cost.is_some() || self.annual_maint_cost.is_some()
    }
}

impl DomainObject for Benefit {
    const KIND: ObjectKind = ObjectKind::Benefit;

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
            CatalogError::validation(ObjectKind::Benefit, &self.name, message).into()
        };
        if self.future_year <= self.current_situation.year {
            return Err(invalid(format!(
                "future year {} must come after current year {}",
                self.future_year, self.current_situation.year
            )));
        }
        if !(0.0..1.0).contains(&self.discount_rate) {
            return Err(invalid(format!(
                "discount rate {} must be within [0, 1)",
                self.discount_rate
            )));
        }
        if self.strategy == self.baseline_strategy {
            return Err(invalid(
                "strategy and baseline strategy must differ".to_string(),
            ));
        }
        for (label, cost) in [
            ("implementation_cost", self.implementation_cost),
            ("annual_maint_cost", self.annual_maint_cost),
        ] {
            if let Some(cost) = cost {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(invalid(format!("{label} must be a non-negative number")));
                }
            }
        }
        Ok(())
    }

    fn validate_references(&self, paths: &DatabasePaths) -> Result<()> {
        let references = [
            (ObjectKind::Strategy, &self.strategy),
            (ObjectKind::Strategy, &self.baseline_strategy),
            (ObjectKind::Event, &self.event_set),
            (ObjectKind::Projection, &self.projection),
            (ObjectKind::Projection, &self.current_situation.projection),
        ];
        for (kind, name) in references {
            require_reference(paths, ObjectKind::Benefit, &self.name, kind, name)?;
        }
        let event_set = store::load_definition::<Event>(paths, &self.event_set)?;
        if !event_set.is_risk() {
            return Err(CatalogError::validation(
                ObjectKind::Benefit,
                &self.name,
                format!("event '{}' is not a risk event set", self.event_set),
            )
            .into());
        }
        Ok(())
    }
}
