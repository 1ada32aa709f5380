use super::*;
use crate::error::catalog_error;
use crate::objects::{
    Event, EventMode, Forcings, ImpactSelection, Measure, MeasureKind, Projection, Scenario,
    Strategy, TimeWindow, WaterLevelForcing,
};
use std::path::Path;

fn paths(root: &Path) -> DatabasePaths {
    DatabasePaths::new(root, "test_site")
}

fn event(name: &str) -> Event {
    Event {
        name: name.to_string(),
        description: String::new(),
        mode: EventMode::Single,
        time: TimeWindow {
            start: "2024-01-01 00:00:00".to_string(),
            end: "2024-01-02 00:00:00".to_string(),
        },
        forcings: Forcings {
            water_level: Some(WaterLevelForcing::Synthetic {
                peak_m: 2.0,
                duration_hours: 12.0,
                offset_m: 0.0,
            }),
            ..Forcings::default()
        },
        sub_events: Vec::new(),
    }
}

fn projection(name: &str) -> Projection {
    Projection {
        name: name.to_string(),
        description: String::new(),
        physical: Default::default(),
        socio_economic: Default::default(),
    }
}

fn elevate(name: &str) -> Measure {
    Measure {
        name: name.to_string(),
        description: String::new(),
        kind: MeasureKind::ElevateProperties {
            elevation_m: 1.0,
            selection: ImpactSelection::All,
            property_type: None,
        },
    }
}

fn strategy(name: &str, measures: &[&str]) -> Strategy {
    Strategy {
        name: name.to_string(),
        description: String::new(),
        measures: measures.iter().map(|m| m.to_string()).collect(),
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    paths: DatabasePaths,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().expect("create temp dir");
    let paths = paths(temp.path());
    ObjectStore::<Event>::new(paths.clone(), Vec::new())
        .save(&event("storm"), false)
        .expect("save event");
    ObjectStore::<Projection>::new(paths.clone(), Vec::new())
        .save(&projection("current"), false)
        .expect("save projection");
    ObjectStore::<Measure>::new(paths.clone(), Vec::new())
        .save(&elevate("raise"), false)
        .expect("save measure");
    ObjectStore::<Strategy>::new(paths.clone(), Vec::new())
        .save(&strategy("no_measures", &[]), false)
        .expect("save strategy");
    ObjectStore::<Strategy>::new(paths.clone(), Vec::new())
        .save(&strategy("raise_all", &["raise"]), false)
        .expect("save strategy");
    Fixture { _temp: temp, paths }
}

#[test]
fn save_without_overwrite_rejects_existing_name() {
    let fx = fixture();
    let store = ObjectStore::<Event>::new(fx.paths.clone(), Vec::new());
    let err = store.save(&event("storm"), false).expect_err("duplicate save");
    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::AlreadyExists { .. })
    ));
}

#[test]
fn overwrite_removes_existing_output() {
    let fx = fixture();
    let scenarios = ObjectStore::<Scenario>::new(fx.paths.clone(), Vec::new());
    let scenario = Scenario::new("s1", "storm", "current", "no_measures");
    scenarios.save(&scenario, false).expect("save scenario");
    let marker = fx.paths.scenario_finished_marker("s1");
    fs::create_dir_all(marker.parent().expect("marker parent")).expect("mkdir output");
    fs::write(&marker, b"done").expect("write marker");

    scenarios.save(&scenario, true).expect("overwrite scenario");

    assert!(scenarios.exists("s1"));
    assert!(!fx.paths.scenario_output_dir("s1").exists());
}

#[test]
fn get_missing_object_is_not_found() {
    let fx = fixture();
    let store = ObjectStore::<Projection>::new(fx.paths.clone(), Vec::new());
    let err = store.get("nowhere").expect_err("missing projection");
    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::NotFound { .. })
    ));
}

#[test]
fn delete_reports_every_referencing_scenario() {
    let fx = fixture();
    let scenarios = ObjectStore::<Scenario>::new(fx.paths.clone(), Vec::new());
    scenarios
        .save(&Scenario::new("b_run", "storm", "current", "no_measures"), false)
        .expect("save scenario");
    scenarios
        .save(&Scenario::new("a_run", "storm", "current", "raise_all"), false)
        .expect("save scenario");

    let events = ObjectStore::<Event>::new(fx.paths.clone(), Vec::new());
    let err = events.delete("storm", false).expect_err("event in use");
    let found = catalog_error(&err).expect("catalog error");
    assert!(matches!(found, CatalogError::InUse { .. }));
    assert_eq!(found.used_by(), ["a_run".to_string(), "b_run".to_string()]);
    assert!(err.to_string().contains("a_run"));
    assert!(events.exists("storm"));
}

#[test]
fn edit_of_measure_used_by_strategy_is_blocked() {
    let fx = fixture();
    let measures = ObjectStore::<Measure>::new(fx.paths.clone(), Vec::new());
    let mut measure = measures.get("raise").expect("load measure");
    measure.description = "higher".to_string();
    let err = measures.edit(&measure).expect_err("measure in use");
    let found = catalog_error(&err).expect("catalog error");
    assert_eq!(found.used_by(), ["raise_all".to_string()]);
}

#[test]
fn standard_objects_cannot_be_deleted() {
    let fx = fixture();
    let store = ObjectStore::<Projection>::new(fx.paths.clone(), vec!["current".to_string()]);
    let err = store.delete("current", false).expect_err("standard object");
    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::InUse { .. })
    ));
    assert!(store.exists("current"));
}

#[test]
fn edit_requires_existing_object_and_clears_output() {
    let fx = fixture();
    let scenarios = ObjectStore::<Scenario>::new(fx.paths.clone(), Vec::new());
    let missing = Scenario::new("ghost", "storm", "current", "no_measures");
    let err = scenarios.edit(&missing).expect_err("edit missing");
    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::NotFound { .. })
    ));

    let mut scenario = Scenario::new("s1", "storm", "current", "no_measures");
    scenarios.save(&scenario, false).expect("save scenario");
    let impacts = fx.paths.impacts_dir("s1");
    fs::create_dir_all(&impacts).expect("mkdir impacts");
    scenario.strategy = "raise_all".to_string();
    scenarios.edit(&scenario).expect("edit scenario");

    assert_eq!(scenarios.get("s1").expect("reload").strategy, "raise_all");
    assert!(!fx.paths.scenario_output_dir("s1").exists());
}

#[test]
fn save_rejects_dangling_references() {
    let fx = fixture();
    let scenarios = ObjectStore::<Scenario>::new(fx.paths.clone(), Vec::new());
    let err = scenarios
        .save(&Scenario::new("bad", "storm", "2100", "no_measures"), false)
        .expect_err("missing projection");
    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::Validation { .. })
    ));
    assert!(!scenarios.exists("bad"));
}

#[test]
fn copy_duplicates_auxiliary_files() {
    let fx = fixture();
    let events = ObjectStore::<Event>::new(fx.paths.clone(), Vec::new());
    let event_dir = fx.paths.object_dir(ObjectKind::Event, "storm");
    fs::write(event_dir.join("tide.csv"), b"0,1.0\n").expect("write csv");
    fs::create_dir_all(event_dir.join("extra")).expect("mkdir");
    fs::write(event_dir.join("extra").join("notes.txt"), b"n").expect("write notes");

    let copy = events
        .copy("storm", "storm_copy", "copied storm")
        .expect("copy event");

    let original = events.get("storm").expect("original");
    let reloaded = events.get("storm_copy").expect("copy");
    assert_eq!(copy, reloaded);
    assert_eq!(reloaded.description, "copied storm");
    assert_eq!(
        reloaded.hazard_key(&fx.paths).expect("copy key"),
        original.hazard_key(&fx.paths).expect("original key")
    );
    let new_dir = fx.paths.object_dir(ObjectKind::Event, "storm_copy");
    assert!(new_dir.join("tide.csv").is_file());
    assert!(new_dir.join("extra").join("notes.txt").is_file());
    assert!(!new_dir.join("storm.toml").exists());
}

#[test]
fn list_fails_on_directory_without_definition() {
    let fx = fixture();
    let events = ObjectStore::<Event>::new(fx.paths.clone(), Vec::new());
    let listed = events.list().expect("list events");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "storm");

    fs::create_dir_all(fx.paths.object_dir(ObjectKind::Event, "broken")).expect("mkdir");
    let err = events.list().expect_err("corrupt listing");
    assert!(err.to_string().contains("broken"));
}

#[test]
fn delete_definition_only_keeps_auxiliary_files() {
    let fx = fixture();
    let measures = ObjectStore::<Measure>::new(fx.paths.clone(), Vec::new());
    measures.save(&elevate("spare"), false).expect("save measure");
    let dir = fx.paths.object_dir(ObjectKind::Measure, "spare");
    fs::write(dir.join("area.geojson"), b"{}").expect("write aux");

    measures.delete("spare", true).expect("delete definition");
    assert!(!measures.exists("spare"));
    assert!(dir.join("area.geojson").is_file());

    measures.save(&elevate("spare"), false).expect("save again");
    measures.delete("spare", false).expect("delete all");
    assert!(!dir.exists());
}
