//! Projections of future physical and socio-economic conditions.
use super::scenario::scenarios_referencing;
use super::{Benefit, DomainObject, ObjectKind, TippingPoint};
use crate::error::CatalogError;
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Projection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub physical: PhysicalProjection,
    #[serde(default)]
    pub socio_economic: SocioEconomicChange,
}

/// Hazard-relevant part of a projection: everything the flood simulator sees.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PhysicalProjection {
    #[serde(default)]
    pub sea_level_rise_m: f64,
    #[serde(default)]
    pub subsidence_m: f64,
    /// Percentage increase of rainfall intensity.
    #[serde(default)]
    pub rainfall_increase_pct: f64,
    /// Percentage increase of river discharge.
    #[serde(default)]
    pub discharge_increase_pct: f64,
    /// Percentage increase of storm frequency, only used by risk events.
    #[serde(default)]
    pub storm_frequency_increase_pct: f64,
}

/// Impact-only part of a projection.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SocioEconomicChange {
    #[serde(default)]
    pub population_growth_existing_pct: f64,
    #[serde(default)]
    pub economic_growth_pct: f64,
    #[serde(default)]
    pub population_growth_new_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_development_elevation_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_development_polygon: Option<String>,
}

impl Projection {
    /// Copy of this projection with sea-level rise replaced.
    pub fn with_sea_level_rise(&self, name: String, sea_level_rise_m: f64) -> Projection {
        let mut projection = self.clone();
        projection.name = name;
        projection.physical.sea_level_rise_m = sea_level_rise_m;
        projection
    }
}

impl DomainObject for Projection {
    const KIND: ObjectKind = ObjectKind::Projection;

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
        let physical = &self.physical;
        let values = [
            ("sea_level_rise_m", physical.sea_level_rise_m),
            ("subsidence_m", physical.subsidence_m),
            ("rainfall_increase_pct", physical.rainfall_increase_pct),
            ("discharge_increase_pct", physical.discharge_increase_pct),
            (
                "storm_frequency_increase_pct",
                physical.storm_frequency_increase_pct,
            ),
        ];
        for (field, value) in values {
            if !value.is_finite() {
                return Err(CatalogError::validation(
                    ObjectKind::Projection,
                    &self.name,
                    format!("{field} must be a finite number"),
                )
                .into());
            }
        }
        if physical.rainfall_increase_pct <= -100.0 || physical.discharge_increase_pct <= -100.0 {
            return Err(CatalogError::validation(
                ObjectKind::Projection,
                &self.name,
                "percentage decreases cannot remove all rainfall or discharge",
            )
            .into());
        }
        Ok(())
    }

    fn higher_level_usage(paths: &DatabasePaths, name: &str) -> Result<Vec<String>> {
        let mut users = scenarios_referencing(paths, ObjectKind::Projection, name)?;
        for benefit in store::read_all::<Benefit>(paths)? {
            if benefit.projection == name || benefit.current_situation.projection == name {
                users.push(benefit.name);
            }
        }
        for tipping_point in store::read_all::<TippingPoint>(paths)? {
            if tipping_point.projection == name {
                users.push(tipping_point.name);
            }
        }
        Ok(users)
    }
}
