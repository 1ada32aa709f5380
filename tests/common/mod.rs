//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use floodcat::objects::{
    Benefit, CurrentSituation, Event, EventMode, Forcings, ImpactSelection, Measure, MeasureKind,
    PhysicalProjection, Projection, Scenario, Strategy, SubEvent, TimeWindow, WaterLevelForcing,
};
use floodcat::paths::DatabasePaths;
use floodcat::runner::hazard::{HAZARD_INPUT_FILE, HAZARD_OUTPUT_FILE};
use floodcat::runner::impact::{SimulatorMetrics, IMPACT_OUTPUT_FILE};
use floodcat::runner::{ProcessOutput, Simulator, SimulatorLauncher};
use floodcat::settings::Settings;
use floodcat::site::{write_site_config, SiteConfig, StandardObjects};
use floodcat::Catalog;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SITE_NAME: &str = "test_site";
pub const PARTITION: &str = "wards";

/// Simulator stand-in that records calls and writes the expected outputs.
///
/// Impact runs report `TotalDamageEvent` and `ExpectedAnnualDamages` equal to
/// the damage configured for the scenario (0 when unset), split 3:1 over the
/// `north` and `south` wards.
#[derive(Clone, Default)]
pub struct FakeSimulator {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<(Simulator, String)>,
    damages: BTreeMap<String, f64>,
    failing_hazard: BTreeSet<String>,
}

impl FakeSimulator {
    pub fn set_damage(&self, scenario: &str, value: f64) {
        let mut state = self.state.lock().expect("fake simulator state");
        state.damages.insert(scenario.to_string(), value);
    }

    pub fn fail_hazard_for(&self, scenario: &str) {
        let mut state = self.state.lock().expect("fake simulator state");
        state.failing_hazard.insert(scenario.to_string());
    }

    /// Scenario names of every call to `simulator`, in call order.
    pub fn calls(&self, simulator: Simulator) -> Vec<String> {
        let state = self.state.lock().expect("fake simulator state");
        state
            .calls
            .iter()
            .filter(|(called, _)| *called == simulator)
            .map(|(_, scenario)| scenario.clone())
            .collect()
    }
}

/// Recover the scenario name from a simulator working directory.
///
/// Hazard: `Scenarios/<s>/Flooding/simulations/<label>`;
/// impact: `Scenarios/<s>/Impacts/simulation`.
fn scenario_of(simulator: Simulator, work_dir: &Path) -> String {
    let depth = match simulator {
        Simulator::Hazard => 3,
        Simulator::Impact => 2,
    };
    work_dir
        .ancestors()
        .nth(depth)
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .expect("scenario directory in work dir")
        .to_string()
}

impl SimulatorLauncher for FakeSimulator {
    fn launch(&self, simulator: Simulator, work_dir: &Path) -> anyhow::Result<ProcessOutput> {
        let scenario = scenario_of(simulator, work_dir);
        let mut state = self.state.lock().expect("fake simulator state");
        state.calls.push((simulator, scenario.clone()));
        match simulator {
            Simulator::Hazard => {
                assert!(work_dir.join(HAZARD_INPUT_FILE).is_file());
                if state.failing_hazard.contains(&scenario) {
                    return Ok(ProcessOutput {
                        success: false,
                        status: "exit status: 1".to_string(),
                        stdout: Vec::new(),
                        stderr: b"solver diverged".to_vec(),
                    });
                }
                std::fs::write(work_dir.join(HAZARD_OUTPUT_FILE), b"fake map")?;
            }
            Simulator::Impact => {
                let damage = state.damages.get(&scenario).copied().unwrap_or(0.0);
                let mut wards = BTreeMap::new();
                for (area, share) in [("north", 0.75), ("south", 0.25)] {
                    wards.insert(
                        area.to_string(),
                        BTreeMap::from([("ExpectedAnnualDamages".to_string(), damage * share)]),
                    );
                }
                let metrics = SimulatorMetrics {
                    metrics: BTreeMap::from([
                        ("TotalDamageEvent".to_string(), damage),
                        ("ExpectedAnnualDamages".to_string(), damage),
                    ]),
                    aggregation_areas: BTreeMap::from([(PARTITION.to_string(), wards)]),
                };
                let text = serde_json::to_string_pretty(&metrics)?;
                std::fs::write(work_dir.join(IMPACT_OUTPUT_FILE), text)?;
            }
        }
        Ok(ProcessOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: b"fake run".to_vec(),
            stderr: Vec::new(),
        })
    }
}

/// Temporary database seeded with a small, consistent set of objects.
///
/// Events: `storm` (single), `probabilistic` (risk, two sub-events).
/// Projections: `current` (standard), `2050`.
/// Measures: `seawall` (hazard), `raise_homes` (impact).
/// Strategies: `no_measures`, `wall`, `wall_raise`, `raise`.
pub struct TestCatalog {
    pub temp: TempDir,
    pub settings: Settings,
    pub simulator: FakeSimulator,
}

impl TestCatalog {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let settings = Settings::new(temp.path(), SITE_NAME);
        let paths = DatabasePaths::new(temp.path(), SITE_NAME);
        let site = SiteConfig {
            name: SITE_NAME.to_string(),
            description: "integration test site".to_string(),
            standard_objects: StandardObjects {
                projections: vec!["current".to_string()],
                ..StandardObjects::default()
            },
            aggregation_areas: vec![PARTITION.to_string()],
            ..SiteConfig::default()
        };
        write_site_config(&paths, &site).expect("write site config");

        let fixture = Self {
            temp,
            settings,
            simulator: FakeSimulator::default(),
        };
        let catalog = fixture.open();
        seed(&catalog);
        catalog.close();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> DatabasePaths {
        DatabasePaths::new(self.temp.path(), SITE_NAME)
    }

    pub fn open(&self) -> Catalog {
        self.open_with(self.settings.clone())
    }

    pub fn open_with(&self, settings: Settings) -> Catalog {
        Catalog::open_with_launcher(settings, Box::new(self.simulator.clone()))
            .expect("open catalog")
    }
}

fn seed(catalog: &Catalog) {
    catalog
        .events
        .save(&single_event("storm", 2.0), false)
        .expect("save storm");
    catalog
        .events
        .save(&risk_event("probabilistic"), false)
        .expect("save probabilistic");
    catalog
        .projections
        .save(&projection("current", 0.0), false)
        .expect("save current");
    catalog
        .projections
        .save(&projection("2050", 0.5), false)
        .expect("save 2050");

    let seawall = Measure {
        name: "seawall".to_string(),
        description: String::new(),
        kind: MeasureKind::Floodwall {
            elevation_m: 3.0,
            polygon_file: "seawall.geojson".to_string(),
        },
    };
    catalog.measures.save(&seawall, false).expect("save seawall");
    let seawall_dir = catalog
        .paths()
        .object_dir(floodcat::objects::ObjectKind::Measure, "seawall");
    std::fs::write(seawall_dir.join("seawall.geojson"), b"{}").expect("write seawall polygon");

    let raise_homes = Measure {
        name: "raise_homes".to_string(),
        description: String::new(),
        kind: MeasureKind::ElevateProperties {
            elevation_m: 1.0,
            selection: ImpactSelection::All,
            property_type: None,
        },
    };
    catalog
        .measures
        .save(&raise_homes, false)
        .expect("save raise_homes");

    for (name, measures) in [
        ("no_measures", vec![]),
        ("wall", vec!["seawall"]),
        ("wall_raise", vec!["seawall", "raise_homes"]),
        ("raise", vec!["raise_homes"]),
    ] {
        let strategy = Strategy {
            name: name.to_string(),
            description: String::new(),
            measures: measures.into_iter().map(String::from).collect(),
        };
        catalog.strategies.save(&strategy, false).expect("save strategy");
    }
}

fn window() -> TimeWindow {
    TimeWindow {
        start: "2024-09-01 00:00:00".to_string(),
        end: "2024-09-03 00:00:00".to_string(),
    }
}

fn surge(peak_m: f64) -> Forcings {
    Forcings {
        water_level: Some(WaterLevelForcing::Synthetic {
            peak_m,
            duration_hours: 12.0,
            offset_m: 0.0,
        }),
        ..Forcings::default()
    }
}

pub fn single_event(name: &str, peak_m: f64) -> Event {
    Event {
        name: name.to_string(),
        description: String::new(),
        mode: EventMode::Single,
        time: window(),
        forcings: surge(peak_m),
        sub_events: Vec::new(),
    }
}

pub fn risk_event(name: &str) -> Event {
    Event {
        name: name.to_string(),
        description: String::new(),
        mode: EventMode::Risk,
        time: window(),
        forcings: Forcings::default(),
        sub_events: vec![
            SubEvent {
                name: "rp10".to_string(),
                frequency: 0.1,
                forcings: surge(1.5),
            },
            SubEvent {
                name: "rp100".to_string(),
                frequency: 0.01,
                forcings: surge(3.0),
            },
        ],
    }
}

pub fn projection(name: &str, sea_level_rise_m: f64) -> Projection {
    Projection {
        name: name.to_string(),
        description: String::new(),
        physical: PhysicalProjection {
            sea_level_rise_m,
            ..PhysicalProjection::default()
        },
        socio_economic: Default::default(),
    }
}

pub fn scenario(name: &str, event: &str, projection: &str, strategy: &str) -> Scenario {
    Scenario::new(name, event, projection, strategy)
}

pub fn benefit(name: &str) -> Benefit {
    Benefit {
        name: name.to_string(),
        description: String::new(),
        strategy: "raise".to_string(),
        event_set: "probabilistic".to_string(),
        projection: "2050".to_string(),
        future_year: 2050,
        current_situation: CurrentSituation {
            projection: "current".to_string(),
            year: 2025,
        },
        baseline_strategy: "no_measures".to_string(),
        discount_rate: 0.0,
        implementation_cost: Some(500.0),
        annual_maint_cost: None,
    }
}
