//! Event definitions: forcing conditions over a time window.
//!
//! Single events drive one hazard simulation; risk events (event sets) carry
//! sub-events with annual frequencies and drive one simulation per sub-event.
use super::scenario::scenarios_referencing;
use super::{Benefit, DomainObject, ObjectKind, TippingPoint};
use crate::error::CatalogError;
use crate::fsutil;
use crate::paths::DatabasePaths;
use crate::store;
use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mode: EventMode,
    pub time: TimeWindow,
    #[serde(default)]
    pub forcings: Forcings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_events: Vec<SubEvent>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventMode {
    #[default]
    Single,
    Risk,
}

impl fmt::Display for EventMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventMode::Single => f.write_str("single"),
            EventMode::Risk => f.write_str("risk"),
        }
    }
}

/// Simulation window; timestamps are `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    /// Parse both ends of the window.
    pub fn parse(&self) -> std::result::Result<(NaiveDateTime, NaiveDateTime), String> {
        let parse = |stamp: &str| {
            NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|err| {
                format!("time '{stamp}' is not a valid YYYY-MM-DD HH:MM:SS timestamp ({err})")
            })
        };
        Ok((parse(&self.start)?, parse(&self.end)?))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Forcings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<WaterLevelForcing>,
    #[serde(default)]
    pub rainfall: RainfallForcing,
    #[serde(default)]
    pub wind: WindForcing,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discharge: Vec<DischargeForcing>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum WaterLevelForcing {
    Synthetic {
        peak_m: f64,
        duration_hours: f64,
        #[serde(default)]
        offset_m: f64,
    },
    Csv {
        path: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum RainfallForcing {
    #[default]
    None,
    Constant {
        intensity_mm_hr: f64,
    },
    Synthetic {
        cumulative_mm: f64,
        duration_hours: f64,
    },
    Csv {
        path: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum WindForcing {
    #[default]
    None,
    Constant {
        speed_m_s: f64,
        direction_deg: f64,
    },
    Csv {
        path: String,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DischargeForcing {
    pub river: String,
    pub source: DischargeSource,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DischargeSource {
    Constant { discharge_m3_s: f64 },
    Csv { path: String },
}

/// Member of a risk event set.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubEvent {
    pub name: String,
    /// Annual exceedance frequency.
    pub frequency: f64,
    #[serde(default)]
    pub forcings: Forcings,
}

impl Forcings {
    /// Relative paths of timeseries files the forcings read from the event directory.
    pub fn csv_files(&self) -> Vec<&str> {
        let mut files = Vec::new();
        if let Some(WaterLevelForcing::Csv { path }) = &self.water_level {
            files.push(path.as_str());
        }
        if let RainfallForcing::Csv { path } = &self.rainfall {
            files.push(path.as_str());
        }
        if let WindForcing::Csv { path } = &self.wind {
            files.push(path.as_str());
        }
        for discharge in &self.discharge {
            if let DischargeSource::Csv { path } = &discharge.source {
                files.push(path.as_str());
            }
        }
        files
    }

    fn check(&self) -> std::result::Result<(), String> {
        match &self.water_level {
            Some(WaterLevelForcing::Synthetic { duration_hours, .. }) if *duration_hours <= 0.0 => {
                return Err("synthetic water level duration must be positive".to_string());
            }
            _ => {}
        }
        match &self.rainfall {
            RainfallForcing::Constant { intensity_mm_hr } if *intensity_mm_hr < 0.0 => {
                return Err("rainfall intensity must not be negative".to_string());
            }
            RainfallForcing::Synthetic {
                cumulative_mm,
                duration_hours,
            } if *cumulative_mm < 0.0 || *duration_hours <= 0.0 => {
                return Err("synthetic rainfall needs a non-negative total and positive duration"
                    .to_string());
            }
            _ => {}
        }
        if let WindForcing::Constant { direction_deg, .. } = &self.wind {
            if !(0.0..=360.0).contains(direction_deg) {
                return Err(format!("wind direction {direction_deg} is outside 0..=360"));
            }
        }
        let mut rivers = BTreeSet::new();
        for discharge in &self.discharge {
            if !rivers.insert(discharge.river.as_str()) {
                return Err(format!("duplicate discharge for river '{}'", discharge.river));
            }
        }
        for file in self.csv_files() {
            if file.is_empty() || file.contains("..") || file.starts_with('/') {
                return Err(format!("timeseries path '{file}' must be relative to the event"));
            }
        }
        Ok(())
    }
}

impl Event {
    pub fn is_risk(&self) -> bool {
        self.mode == EventMode::Risk
    }

    /// Every timeseries file referenced by the event or its sub-events.
    pub fn csv_files(&self) -> Vec<&str> {
        let mut files = self.forcings.csv_files();
        for sub_event in &self.sub_events {
            files.extend(sub_event.forcings.csv_files());
        }
        files.sort();
        files.dedup();
        files
    }

    /// Everything the hazard simulator sees of this event: the definition
    /// without its labels, plus the contents of every timeseries file.
    pub fn hazard_key(&self, paths: &DatabasePaths) -> Result<EventHazardKey> {
        let event_dir = paths.object_dir(ObjectKind::Event, &self.name);
        let mut timeseries = BTreeMap::new();
        for file in self.csv_files() {
            timeseries.insert(file.to_string(), fsutil::file_digest(&event_dir.join(file))?);
        }
        Ok(EventHazardKey {
            definition: Event {
                name: String::new(),
                description: String::new(),
                ..self.clone()
            },
            timeseries,
        })
    }
}

/// Comparable hazard identity of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHazardKey {
    definition: Event,
    /// Relative path to content digest; `None` when the file is missing.
    timeseries: BTreeMap<String, Option<String>>,
}

impl DomainObject for Event {
    const KIND: ObjectKind = ObjectKind::Event;

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
            CatalogError::validation(ObjectKind::Event, &self.name, message).into()
        };
        let (start, end) = self.time.parse().map_err(invalid)?;
        if start >= end {
            return Err(invalid("time window start must precede its end".to_string()));
        }
        self.forcings.check().map_err(invalid)?;
        match self.mode {
            EventMode::Single => {
                if !self.sub_events.is_empty() {
                    return Err(invalid("single events cannot carry sub-events".to_string()));
                }
            }
            EventMode::Risk => {
                if self.sub_events.is_empty() {
                    return Err(invalid("risk events need at least one sub-event".to_string()));
                }
                let mut names = BTreeSet::new();
                for sub_event in &self.sub_events {
                    if !names.insert(sub_event.name.as_str()) {
                        return Err(invalid(format!(
                            "duplicate sub-event '{}'",
                            sub_event.name
                        )));
                    }
                    if sub_event.frequency.is_nan() || sub_event.frequency <= 0.0 {
                        return Err(invalid(format!(
                            "sub-event '{}' needs a positive frequency",
                            sub_event.name
                        )));
                    }
                    super::validate_name(ObjectKind::Event, &sub_event.name)?;
                    sub_event.forcings.check().map_err(invalid)?;
                }
            }
        }
        Ok(())
    }

    fn higher_level_usage(paths: &DatabasePaths, name: &str) -> Result<Vec<String>> {
        let mut users = scenarios_referencing(paths, ObjectKind::Event, name)?;
        for benefit in store::read_all::<Benefit>(paths)? {
            if benefit.event_set == name {
                users.push(benefit.name);
            }
        }
        for tipping_point in store::read_all::<TippingPoint>(paths)? {
            if tipping_point.event_set == name {
                users.push(tipping_point.name);
            }
        }
        Ok(users)
    }
}
