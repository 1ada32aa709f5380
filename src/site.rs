//! Site configuration stored with each database.
//!
//! `static/config/site.toml` names the site, marks its standard objects, and
//! lists the spatial partitions impact results are aggregated over.
use crate::objects::ObjectKind;
use crate::paths::DatabasePaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub standard_objects: StandardObjects,
    /// Partition names such as `neighborhoods` or `census_blocks`.
    #[serde(default)]
    pub aggregation_areas: Vec<String>,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<BenefitDefaults>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct StandardObjects {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub projections: Vec<String>,
    #[serde(default)]
    pub strategies: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    #[serde(default = "default_return_periods")]
    pub return_periods: Vec<u32>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            return_periods: default_return_periods(),
        }
    }
}

fn default_return_periods() -> Vec<u32> {
    vec![1, 2, 5, 10, 25, 50, 100]
}

/// Defaults applied when a benefit analysis is created from the CLI.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BenefitDefaults {
    pub current_year: u32,
    pub current_projection: String,
    pub baseline_strategy: String,
    pub event_set: String,
}

impl SiteConfig {
    /// Standard object names for a kind; kinds without standard objects get none.
    pub fn standard_names(&self, kind: ObjectKind) -> BTreeSet<String> {
        let names = match kind {
            ObjectKind::Event => &self.standard_objects.events,
            ObjectKind::Projection => &self.standard_objects.projections,
            ObjectKind::Strategy => &self.standard_objects.strategies,
            _ => return BTreeSet::new(),
        };
        names.iter().cloned().collect()
    }
}

/// Load `static/config/site.toml` for a database.
pub fn load_site_config(paths: &DatabasePaths) -> Result<SiteConfig> {
    let path = paths.site_config_path();
    let text = fs::read_to_string(&path)
        .with_context(|| format!("read site config {}", path.display()))?;
    let config: SiteConfig =
        toml::from_str(&text).with_context(|| format!("parse site config {}", path.display()))?;
    validate_site_config(&config)?;
    Ok(config)
}

pub fn write_site_config(paths: &DatabasePaths, config: &SiteConfig) -> Result<()> {
    let path = paths.site_config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create static config dir")?;
    }
    let text = toml::to_string_pretty(config).context("serialize site config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_site_config(config: &SiteConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(anyhow!("site name must be non-empty"));
    }
    let mut partitions = BTreeSet::new();
    for partition in &config.aggregation_areas {
        if partition.trim().is_empty() || !partitions.insert(partition.as_str()) {
            return Err(anyhow!(
                "aggregation_areas must be unique and non-empty (got {partition:?})"
            ));
        }
    }
    if config.risk.return_periods.iter().any(|period| *period == 0) {
        return Err(anyhow!("risk.return_periods must be positive"));
    }
    Ok(())
}
