//! Object catalog and scenario orchestrator for flood adaptation planning.
//!
//! Definitions (events, projections, measures, strategies, scenarios, benefit
//! analyses, tipping points) are TOML files under a database directory.
//! Scenarios run through an external hazard simulator and an external impact
//! simulator; hazard output is reused between hazard-equivalent scenarios.
pub mod benefit;
pub mod catalog;
pub mod error;
pub mod fsutil;
pub mod objects;
pub mod paths;
pub mod runner;
pub mod settings;
pub mod site;
pub mod store;
pub mod tipping_point;

pub use catalog::{Catalog, CatalogSession};
pub use error::{catalog_error, CatalogError};
