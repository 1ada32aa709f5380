//! Flood map artifact produced by a completed hazard run.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const FLOODMAP_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FloodMapType {
    WaterLevel,
    WaterDepth,
}

/// Manifest written to `Flooding/floodmap.json`.
///
/// Paths are relative to the scenario's `Flooding/` directory so a copied
/// hazard output stays valid under its new scenario.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FloodMap {
    pub schema_version: u32,
    pub scenario: String,
    pub map_type: FloodMapType,
    pub paths: Vec<String>,
    pub generated_at_epoch_ms: u128,
}

impl FloodMap {
    pub fn load(path: &Path) -> Result<FloodMap> {
        let bytes = fs::read(path).with_context(|| format!("read flood map {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse flood map {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("serialize flood map")?;
        fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Absolute map paths given the owning `Flooding/` directory.
    pub fn resolve(&self, flooding_dir: &Path) -> Vec<PathBuf> {
        self.paths.iter().map(|rel| flooding_dir.join(rel)).collect()
    }
}
