//! Adaptation measures as a single tagged payload.
//!
//! `type` selects the payload; hazard measures change the flood simulator
//! inputs and impact measures change the damage simulator inputs. Which side a
//! measure lands on is decided by `MeasureType::is_hazard`, never by its name.
use super::{DomainObject, ObjectKind, Strategy};
use crate::error::CatalogError;
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Measure {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: MeasureKind,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasureKind {
    Floodwall {
        elevation_m: f64,
        polygon_file: String,
    },
    Pump {
        discharge_m3_s: f64,
        polygon_file: String,
    },
    GreenInfrastructure {
        volume_m3: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height_m: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent_area: Option<f64>,
        polygon_file: String,
    },
    ElevateProperties {
        elevation_m: f64,
        selection: ImpactSelection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_type: Option<String>,
    },
    BuyoutProperties {
        selection: ImpactSelection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_type: Option<String>,
    },
    FloodproofProperties {
        elevation_m: f64,
        selection: ImpactSelection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_type: Option<String>,
    },
}

/// Which buildings an impact measure applies to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ImpactSelection {
    Polygon { file: String },
    AggregationArea { area_type: String, area_name: String },
    All,
}

/// Discriminator registry for `MeasureKind`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MeasureType {
    Floodwall,
    Pump,
    GreenInfrastructure,
    ElevateProperties,
    BuyoutProperties,
    FloodproofProperties,
}

impl MeasureType {
    pub const ALL: [MeasureType; 6] = [
        MeasureType::Floodwall,
        MeasureType::Pump,
        MeasureType::GreenInfrastructure,
        MeasureType::ElevateProperties,
        MeasureType::BuyoutProperties,
        MeasureType::FloodproofProperties,
    ];

    /// Return the `type` tag used in definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Floodwall => "floodwall",
            MeasureType::Pump => "pump",
            MeasureType::GreenInfrastructure => "green_infrastructure",
            MeasureType::ElevateProperties => "elevate_properties",
            MeasureType::BuyoutProperties => "buyout_properties",
            MeasureType::FloodproofProperties => "floodproof_properties",
        }
    }

    pub fn is_hazard(&self) -> bool {
        match self {
            MeasureType::Floodwall | MeasureType::Pump | MeasureType::GreenInfrastructure => true,
            MeasureType::ElevateProperties
            | MeasureType::BuyoutProperties
            | MeasureType::FloodproofProperties => false,
        }
    }

    /// Construct a starter payload for this type.
    pub fn template(&self) -> MeasureKind {
        match self {
            MeasureType::Floodwall => MeasureKind::Floodwall {
                elevation_m: 1.0,
                polygon_file: "floodwall.geojson".to_string(),
            },
            MeasureType::Pump => MeasureKind::Pump {
                discharge_m3_s: 10.0,
                polygon_file: "pump.geojson".to_string(),
            },
            MeasureType::GreenInfrastructure => MeasureKind::GreenInfrastructure {
                volume_m3: 1000.0,
                height_m: None,
                percent_area: None,
                polygon_file: "green_infrastructure.geojson".to_string(),
            },
            MeasureType::ElevateProperties => MeasureKind::ElevateProperties {
                elevation_m: 1.0,
                selection: ImpactSelection::All,
                property_type: None,
            },
            MeasureType::BuyoutProperties => MeasureKind::BuyoutProperties {
                selection: ImpactSelection::All,
                property_type: None,
            },
            MeasureType::FloodproofProperties => MeasureKind::FloodproofProperties {
                elevation_m: 1.0,
                selection: ImpactSelection::All,
                property_type: None,
            },
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        MeasureType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == value)
            .ok_or_else(|| anyhow!("unknown measure type '{value}'"))
    }
}

impl MeasureKind {
    pub fn measure_type(&self) -> MeasureType {
        match self {
            MeasureKind::Floodwall { .. } => MeasureType::Floodwall,
            MeasureKind::Pump { .. } => MeasureType::Pump,
            MeasureKind::GreenInfrastructure { .. } => MeasureType::GreenInfrastructure,
            MeasureKind::ElevateProperties { .. } => MeasureType::ElevateProperties,
            MeasureKind::BuyoutProperties { .. } => MeasureType::BuyoutProperties,
            MeasureKind::FloodproofProperties { .. } => MeasureType::FloodproofProperties,
        }
    }

    pub fn selection(&self) -> Option<&ImpactSelection> {
        match self {
            MeasureKind::ElevateProperties { selection, .. }
            | MeasureKind::BuyoutProperties { selection, .. }
            | MeasureKind::FloodproofProperties { selection, .. } => Some(selection),
            _ => None,
        }
    }

    /// Geometry file the measure reads from its own directory, if any.
    pub fn geometry_file(&self) -> Option<&str> {
        match self {
            MeasureKind::Floodwall { polygon_file, .. }
            | MeasureKind::Pump { polygon_file, .. }
            | MeasureKind::GreenInfrastructure { polygon_file, .. } => Some(polygon_file),
            _ => match self.selection() {
                Some(ImpactSelection::Polygon { file }) => Some(file),
                _ => None,
            },
        }
    }
}

impl Measure {
    pub fn measure_type(&self) -> MeasureType {
        self.kind.measure_type()
    }

    pub fn is_hazard(&self) -> bool {
        self.measure_type().is_hazard()
    }
}

impl DomainObject for Measure {
    const KIND: ObjectKind = ObjectKind::Measure;

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
        let invalid = |message: &str| -> anyhow::Error {
            CatalogError::validation(ObjectKind::Measure, &self.name, message).into()
        };
        match &self.kind {
            MeasureKind::Floodwall { elevation_m, .. } if *elevation_m <= 0.0 => {
                return Err(invalid("floodwall elevation must be positive"));
            }
            MeasureKind::Pump { discharge_m3_s, .. } if *discharge_m3_s <= 0.0 => {
                return Err(invalid("pump discharge must be positive"));
            }
            MeasureKind::GreenInfrastructure {
                volume_m3,
                percent_area,
                ..
            } => {
                if *volume_m3 <= 0.0 {
                    return Err(invalid("green infrastructure volume must be positive"));
                }
                if let Some(pct) = percent_area {
                    if !(0.0..=100.0).contains(pct) {
                        return Err(invalid("percent_area must be within 0..=100"));
                    }
                }
            }
            MeasureKind::ElevateProperties { elevation_m, .. }
            | MeasureKind::FloodproofProperties { elevation_m, .. }
                if *elevation_m <= 0.0 =>
            {
                return Err(invalid("elevation must be positive"));
            }
            _ => {}
        }
        if let Some(file) = self.kind.geometry_file() {
            if file.is_empty() || file.contains("..") || file.contains('/') {
                return Err(invalid("geometry files must live in the measure directory"));
            }
        }
        if let Some(ImpactSelection::AggregationArea {
            area_type,
            area_name,
        }) = self.kind.selection()
        {
            if area_type.trim().is_empty() || area_name.trim().is_empty() {
                return Err(invalid("aggregation area selection needs a type and a name"));
            }
        }
        Ok(())
    }

    fn higher_level_usage(paths: &DatabasePaths, name: &str) -> Result<Vec<String>> {
        Ok(store::read_all::<Strategy>(paths)?
            .into_iter()
            .filter(|strategy| strategy.measures.iter().any(|measure| measure == name))
            .map(|strategy| strategy.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_type_round_trips_through_its_tag() {
        for ty in MeasureType::ALL {
            let parsed: MeasureType = ty.as_str().parse().expect("parse tag");
            assert_eq!(parsed, ty);
            let measure = Measure {
                name: format!("m_{}", ty.as_str()),
                description: String::new(),
                kind: ty.template(),
            };
            assert_eq!(measure.measure_type(), ty);
            measure.validate().expect("template validates");
            let text = toml::to_string(&measure).expect("serialize measure");
            assert!(text.contains(&format!("type = \"{}\"", ty.as_str())));
            let back: Measure = toml::from_str(&text).expect("parse measure");
            assert_eq!(back, measure);
        }
    }

    #[test]
    fn hazard_split_follows_type_tag() {
        let hazard: Vec<_> = MeasureType::ALL
            .into_iter()
            .filter(MeasureType::is_hazard)
            .collect();
        assert_eq!(
            hazard,
            vec![
                MeasureType::Floodwall,
                MeasureType::Pump,
                MeasureType::GreenInfrastructure
            ]
        );
    }

    #[test]
    fn parses_aggregation_area_selection() {
        let text = r#"
name = "raise_downtown"
type = "elevate_properties"
elevation_m = 1.5
property_type = "residential"
selection = { type = "aggregation_area", area_type = "district", area_name = "downtown" }
"#;
        let measure: Measure = toml::from_str(text).expect("parse measure");
        assert!(!measure.is_hazard());
        assert_eq!(
            measure.kind.selection(),
            Some(&ImpactSelection::AggregationArea {
                area_type: "district".to_string(),
                area_name: "downtown".to_string(),
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("seawall".parse::<MeasureType>().is_err());
        let text = "name = \"x\"\ntype = \"seawall\"\n";
        assert!(toml::from_str::<Measure>(text).is_err());
    }
}
