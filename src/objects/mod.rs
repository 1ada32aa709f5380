//! Typed catalog objects.
//!
//! Every object is one TOML definition on disk; the `DomainObject` trait ties a
//! Rust type to its directory, its validation, and its place in the reference
//! hierarchy (Measure <- Strategy <- Scenario <- Benefit/TippingPoint).
use crate::error::CatalogError;
use crate::paths::DatabasePaths;
use anyhow::Result;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub mod benefit;
pub mod event;
pub mod floodmap;
pub mod measure;
pub mod projection;
pub mod scenario;
pub mod strategy;
pub mod tipping_point;

pub use benefit::{Benefit, CurrentSituation, ScenarioRole};
pub use event::{
    DischargeForcing, DischargeSource, Event, EventHazardKey, EventMode, Forcings,
    RainfallForcing, SubEvent, TimeWindow, WaterLevelForcing, WindForcing,
};
pub use floodmap::{FloodMap, FloodMapType};
pub use measure::{ImpactSelection, Measure, MeasureKind, MeasureType};
pub use projection::{PhysicalProjection, Projection, SocioEconomicChange};
pub use scenario::{Scenario, ScenarioInputs};
pub use strategy::Strategy;
pub use tipping_point::{MetricCondition, Operator, TippingPoint};

/// Object types stored in the catalog.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Event,
    Projection,
    Measure,
    Strategy,
    Scenario,
    Benefit,
    TippingPoint,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Event,
        ObjectKind::Projection,
        ObjectKind::Measure,
        ObjectKind::Strategy,
        ObjectKind::Scenario,
        ObjectKind::Benefit,
        ObjectKind::TippingPoint,
    ];

    /// Return the stable identifier used in messages and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Event => "event",
            ObjectKind::Projection => "projection",
            ObjectKind::Measure => "measure",
            ObjectKind::Strategy => "strategy",
            ObjectKind::Scenario => "scenario",
            ObjectKind::Benefit => "benefit",
            ObjectKind::TippingPoint => "tipping_point",
        }
    }

    /// Directory name under `input/` holding definitions of this kind.
    pub fn input_dir_name(&self) -> &'static str {
        match self {
            ObjectKind::Event => "events",
            ObjectKind::Projection => "projections",
            ObjectKind::Measure => "measures",
            ObjectKind::Strategy => "strategies",
            ObjectKind::Scenario => "scenarios",
            ObjectKind::Benefit => "benefits",
            ObjectKind::TippingPoint => "tipping_points",
        }
    }

    /// Directory name under `output/` for kinds that produce output.
    pub fn output_dir_name(&self) -> Option<&'static str> {
        match self {
            ObjectKind::Scenario => Some("Scenarios"),
            ObjectKind::Benefit => Some("Benefits"),
            ObjectKind::TippingPoint => Some("TippingPoints"),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<ObjectKind> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ObjectKind::ALL.into_iter().find(|kind| {
            kind.as_str() == normalized || kind.input_dir_name() == normalized
        })
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, TOML-backed catalog object.
pub trait DomainObject: Serialize + DeserializeOwned + Clone + fmt::Debug {
    const KIND: ObjectKind;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn description(&self) -> &str;
    fn set_description(&mut self, description: String);

    /// Type-specific consistency checks on top of name validation.
    fn validate_fields(&self) -> Result<()> {
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_name(Self::KIND, self.name())?;
        self.validate_fields()
    }

    /// Check that every object this one references exists in the catalog.
    fn validate_references(&self, _paths: &DatabasePaths) -> Result<()> {
        Ok(())
    }

    /// Names of higher-level objects referencing `name`; empty when the kind
    /// has no higher level.
    fn higher_level_usage(_paths: &DatabasePaths, _name: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Fail with a validation error naming the first missing reference.
pub(crate) fn require_reference(
    paths: &DatabasePaths,
    owner_kind: ObjectKind,
    owner: &str,
    kind: ObjectKind,
    name: &str,
) -> Result<()> {
    if paths.definition_path(kind, name).is_file() {
        return Ok(());
    }
    Err(CatalogError::validation(
        owner_kind,
        owner,
        format!("referenced {kind} '{name}' does not exist"),
    )
    .into())
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_\-.]*$").expect("valid object name regex")
    })
}

/// Names double as directory and file stems, so they must be filesystem-safe.
pub fn validate_name(kind: ObjectKind, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CatalogError::validation(kind, name, "name must not be empty").into());
    }
    if !name_pattern().is_match(name) {
        return Err(CatalogError::validation(
            kind,
            name,
            "name may only contain letters, digits, '_', '-' and '.', and must not start with '.'",
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_reject_path_separators_and_spaces() {
        assert!(validate_name(ObjectKind::Event, "kings_tide-2021.v2").is_ok());
        for bad in ["", "a b", "../up", "a/b", ".hidden", "tab\tname"] {
            assert!(
                validate_name(ObjectKind::Event, bad).is_err(),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn object_kind_parses_singular_and_directory_names() {
        assert_eq!(ObjectKind::parse("event"), Some(ObjectKind::Event));
        assert_eq!(ObjectKind::parse("strategies"), Some(ObjectKind::Strategy));
        assert_eq!(
            ObjectKind::parse("tipping-point"),
            Some(ObjectKind::TippingPoint)
        );
        assert_eq!(ObjectKind::parse("unknown"), None);
    }
}
