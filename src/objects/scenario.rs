//! Scenarios: runnable (event, projection, strategy) combinations.
use super::{require_reference, DomainObject, Event, ObjectKind, Projection, Strategy};
use crate::objects::{Benefit, TippingPoint};
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event: String,
    pub projection: String,
    pub strategy: String,
}

/// The name is a label; the referenced tuple is the identity.
impl PartialEq for Scenario {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Scenario {}

impl Scenario {
    pub fn new(name: &str, event: &str, projection: &str, strategy: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            event: event.to_string(),
            projection: projection.to_string(),
            strategy: strategy.to_string(),
        }
    }

    pub fn key(&self) -> (&str, &str, &str) {
        (&self.event, &self.projection, &self.strategy)
    }

    /// Load the referenced definitions from the catalog.
    pub fn load_inputs(&self, paths: &DatabasePaths) -> Result<ScenarioInputs> {
        Ok(ScenarioInputs {
            event: store::load_definition::<Event>(paths, &self.event)?,
            projection: store::load_definition::<Projection>(paths, &self.projection)?,
            strategy: store::load_definition::<Strategy>(paths, &self.strategy)?,
        })
    }

    /// Whether both scenarios feed the hazard simulator identical inputs.
    ///
    /// Events must match outside their labels, the physical projection subset
    /// must match, and the hazard measures of both strategies must match.
    /// Impact measures and socio-economic change are ignored.
    pub fn is_hazard_equivalent(&self, other: &Scenario, paths: &DatabasePaths) -> Result<bool> {
        let mine = self.load_inputs(paths)?;
        let theirs = other.load_inputs(paths)?;
        if mine.event.hazard_key(paths)? != theirs.event.hazard_key(paths)? {
            return Ok(false);
        }
        if mine.projection.physical != theirs.projection.physical {
            return Ok(false);
        }
        Ok(mine.strategy.hazard_key(paths)? == theirs.strategy.hazard_key(paths)?)
    }
}

/// Definitions a scenario references, loaded together for a run.
#[derive(Debug, Clone)]
pub struct ScenarioInputs {
    pub event: Event,
    pub projection: Projection,
    pub strategy: Strategy,
}

impl DomainObject for Scenario {
    const KIND: ObjectKind = ObjectKind::Scenario;

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

    fn validate_references(&self, paths: &DatabasePaths) -> Result<()> {
        let references = [
            (ObjectKind::Event, &self.event),
            (ObjectKind::Projection, &self.projection),
            (ObjectKind::Strategy, &self.strategy),
        ];
        for (kind, name) in references {
            require_reference(paths, ObjectKind::Scenario, &self.name, kind, name)?;
        }
        Ok(())
    }

    fn higher_level_usage(paths: &DatabasePaths, name: &str) -> Result<Vec<String>> {
        let scenario = store::load_definition::<Scenario>(paths, name)?;
        let mut users = Vec::new();
        for benefit in store::read_all::<Benefit>(paths)? {
            if benefit
                .required_scenarios()
                .iter()
                .any(|(_, required)| required.key() == scenario.key())
            {
                users.push(benefit.name);
            }
        }
        for tipping_point in store::read_all::<TippingPoint>(paths)? {
            if tipping_point.derives_scenario(&scenario) {
                users.push(tipping_point.name);
            }
        }
        Ok(users)
    }
}

/// Scenarios referencing an event, projection, or strategy by name.
pub(crate) fn scenarios_referencing(
    paths: &DatabasePaths,
    kind: ObjectKind,
    name: &str,
) -> Result<Vec<String>> {
    Ok(store::read_all::<Scenario>(paths)?
        .into_iter()
        .filter(|scenario| match kind {
            ObjectKind::Event => scenario.event == name,
            ObjectKind::Projection => scenario.projection == name,
            ObjectKind::Strategy => scenario.strategy == name,
            _ => false,
        })
        .map(|scenario| scenario.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_name_and_description() {
        let mut a = Scenario::new("a", "storm", "2050", "walls");
        a.description = "first".to_string();
        let b = Scenario::new("b", "storm", "2050", "walls");
        assert_eq!(a, b);
        let c = Scenario::new("a", "storm", "2050", "no_measures");
        assert_ne!(a, c);
    }
}
