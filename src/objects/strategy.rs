//! Strategies: ordered bundles of measures.
use super::scenario::scenarios_referencing;
use super::{require_reference, DomainObject, Measure, ObjectKind};
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::{Benefit, ImpactSelection, TippingPoint};
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Strategy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub measures: Vec<String>,
}

impl Strategy {
    /// Load every referenced measure, preserving strategy order.
    pub fn load_measures(&self, paths: &DatabasePaths) -> Result<Vec<Measure>> {
        self.measures
            .iter()
            .map(|name| store::load_definition::<Measure>(paths, name))
            .collect()
    }

    /// Hazard-side payloads with labels removed, each paired with the digest
    /// of its geometry file, in a canonical order.
    ///
    /// Two strategies with equal keys feed the flood simulator identical
    /// inputs, whatever their impact measures are.
    pub fn hazard_key(&self, paths: &DatabasePaths) -> Result<Vec<(String, Option<String>)>> {
        let mut keys = Vec::new();
        for measure in self.load_measures(paths)? {
            if !measure.is_hazard() {
                continue;
            }
            let payload = serde_json::to_string(&measure.kind)?;
            let geometry = match measure.kind.geometry_file() {
                Some(file) => {
                    let measure_dir = paths.object_dir(ObjectKind::Measure, &measure.name);
                    fsutil::file_digest(&measure_dir.join(file))?
                }
                None => None,
            };
            keys.push((payload, geometry));
        }
        keys.sort();
        Ok(keys)
    }
}

impl DomainObject for Strategy {
    const KIND: ObjectKind = ObjectKind::Strategy;

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
        let mut seen = BTreeSet::new();
        for measure in &self.measures {
            if !seen.insert(measure.as_str()) {
                return Err(CatalogError::validation(
                    ObjectKind::Strategy,
                    &self.name,
                    format!("measure '{measure}' is listed more than once"),
                )
                .into());
            }
        }
        Ok(())
    }

    fn validate_references(&self, paths: &DatabasePaths) -> Result<()> {
        for measure in &self.measures {
            require_reference(
                paths,
                ObjectKind::Strategy,
                &self.name,
                ObjectKind::Measure,
                measure,
            )?;
        }
        let mut targeted_areas = BTreeSet::new();
        for measure in self.load_measures(paths)? {
            if let Some(ImpactSelection::AggregationArea {
                area_type,
                area_name,
            }) = measure.kind.selection()
            {
                if !targeted_areas.insert((area_type.clone(), area_name.clone())) {
                    return Err(CatalogError::validation(
                        ObjectKind::Strategy,
                        &self.name,
                        format!(
                            "more than one impact measure targets aggregation area {area_type}/{area_name}"
                        ),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn higher_level_usage(paths: &DatabasePaths, name: &str) -> Result<Vec<String>> {
        let mut users = scenarios_referencing(paths, ObjectKind::Strategy, name)?;
        for benefit in store::read_all::<Benefit>(paths)? {
            if benefit.strategy == name || benefit.baseline_strategy == name {
                users.push(benefit.name);
            }
        }
        for tipping_point in store::read_all::<TippingPoint>(paths)? {
            if tipping_point.strategy == name {
                users.push(tipping_point.name);
            }
        }
        Ok(users)
    }
}
