mod common;

use common::{projection, TestCatalog};
use floodcat::objects::{MetricCondition, Operator, TippingPoint};
use floodcat::runner::Simulator;
use floodcat::tipping_point::{SearchStatus, TippingPointSearch};
use floodcat::{catalog_error, CatalogError};

fn sweep(threshold: f64, metric: &str) -> TippingPoint {
    TippingPoint {
        name: "sweep".to_string(),
        description: String::new(),
        event_set: "storm".to_string(),
        projection: "current".to_string(),
        strategy: "no_measures".to_string(),
        sea_level_rise_m: vec![1.5, 0.5, 1.0],
        metrics: vec![MetricCondition {
            name: metric.to_string(),
            threshold,
            operator: Operator::Greater,
        }],
    }
}

fn set_damages(fixture: &TestCatalog) {
    for (label, damage) in [("0p50", 50.0), ("1p00", 150.0), ("1p50", 300.0)] {
        fixture
            .simulator
            .set_damage(&format!("sweep_storm_no_measures_slr{label}"), damage);
    }
}

#[test]
fn search_stops_at_the_first_increment_over_threshold() {
    let fixture = TestCatalog::new();
    set_damages(&fixture);
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "TotalDamageEvent"), false)
        .expect("save tipping point");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    let progress = search.run().expect("run search").clone();

    assert_eq!(progress.status, SearchStatus::Reached);
    assert_eq!(progress.reached_at_m, Some(1.0));
    assert_eq!(progress.increments.len(), 2);
    assert!(!progress.increments[0].reached);
    assert_eq!(progress.increments[1].reached_metrics, ["TotalDamageEvent"]);
    assert_eq!(
        fixture.simulator.calls(Simulator::Hazard),
        [
            "sweep_storm_no_measures_slr0p50",
            "sweep_storm_no_measures_slr1p00"
        ]
    );
    assert!(!catalog.scenarios.exists("sweep_storm_no_measures_slr1p50"));
    assert!(!catalog.projections.exists("sweep_slr1p50"));

    let derived = catalog.projections.get("sweep_slr1p00").expect("derived projection");
    assert_eq!(derived.physical.sea_level_rise_m, 1.0);

    let persisted = TippingPointSearch::load_progress(&catalog, "sweep")
        .expect("load progress")
        .expect("progress file");
    assert_eq!(persisted.status, SearchStatus::Reached);
    assert_eq!(persisted.increments.len(), 2);
}

#[test]
fn search_reports_not_reached_after_every_increment() {
    let fixture = TestCatalog::new();
    set_damages(&fixture);
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(1000.0, "TotalDamageEvent"), false)
        .expect("save tipping point");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    search.run().expect("run search");

    assert_eq!(search.status(), SearchStatus::NotReached);
    assert!(search.status().is_terminal());
    let progress = search.progress();
    assert_eq!(progress.reached_at_m, None);
    let visited: Vec<f64> = progress
        .increments
        .iter()
        .map(|increment| increment.sea_level_rise_m)
        .collect();
    assert_eq!(visited, [0.5, 1.0, 1.5]);
    assert!(progress.increments.iter().all(|increment| increment.run));
}

#[test]
fn rerun_reuses_derived_scenarios_and_their_output() {
    let fixture = TestCatalog::new();
    set_damages(&fixture);
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "TotalDamageEvent"), false)
        .expect("save tipping point");
    TippingPointSearch::new(&catalog, "sweep")
        .expect("search")
        .run()
        .expect("first run");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    let progress = search.run().expect("second run");

    assert!(progress.increments.iter().all(|increment| !increment.created));
    assert_eq!(progress.reached_at_m, Some(1.0));
    assert_eq!(fixture.simulator.calls(Simulator::Impact).len(), 2);
}

#[test]
fn unknown_metric_fails_the_search() {
    let fixture = TestCatalog::new();
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "FloodedRoads"), false)
        .expect("save tipping point");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    let err = search.run().expect_err("metric not reported");

    assert!(matches!(
        catalog_error(&err),
        Some(CatalogError::Validation { .. })
    ));
    let persisted = TippingPointSearch::load_progress(&catalog, "sweep")
        .expect("load progress")
        .expect("progress file");
    assert_eq!(persisted.status, SearchStatus::Running);
    assert!(!persisted.increments[0].run);
}

#[test]
fn derived_scenarios_are_protected_by_the_tipping_point() {
    let fixture = TestCatalog::new();
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(1000.0, "TotalDamageEvent"), false)
        .expect("save tipping point");
    TippingPointSearch::new(&catalog, "sweep")
        .expect("search")
        .run()
        .expect("run search");

    let err = catalog
        .scenarios
        .delete("sweep_storm_no_measures_slr0p50", false)
        .expect_err("scenario in use");
    let used_by = catalog_error(&err).map(CatalogError::used_by).unwrap_or_default();
    assert_eq!(used_by, ["sweep".to_string()]);
}

#[test]
fn status_is_absent_before_the_first_run() {
    let fixture = TestCatalog::new();
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "TotalDamageEvent"), false)
        .expect("save tipping point");

    let search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    assert_eq!(search.status(), SearchStatus::NotStarted);
    assert!(TippingPointSearch::load_progress(&catalog, "sweep")
        .expect("load progress")
        .is_none());
}

#[test]
fn rebased_tipping_point_refreshes_its_derived_projections() {
    let fixture = TestCatalog::new();
    set_damages(&fixture);
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "TotalDamageEvent"), false)
        .expect("save tipping point");
    TippingPointSearch::new(&catalog, "sweep")
        .expect("search")
        .run()
        .expect("first run");

    let mut sunk = projection("sunk", 0.0);
    sunk.physical.subsidence_m = 0.3;
    catalog.projections.save(&sunk, false).expect("save sunk");
    let mut rebased = sweep(100.0, "TotalDamageEvent");
    rebased.projection = "sunk".to_string();
    catalog.tipping_points.edit(&rebased).expect("rebase tipping point");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    let progress = search.run().expect("second run");
    assert_eq!(progress.reached_at_m, Some(1.0));

    let derived = catalog.projections.get("sweep_slr0p50").expect("derived projection");
    assert_eq!(derived.physical.subsidence_m, 0.3);
    assert_eq!(derived.physical.sea_level_rise_m, 0.5);
    assert_eq!(
        fixture.simulator.calls(Simulator::Hazard),
        [
            "sweep_storm_no_measures_slr0p50",
            "sweep_storm_no_measures_slr1p00",
            "sweep_storm_no_measures_slr0p50",
            "sweep_storm_no_measures_slr1p00"
        ]
    );
}

#[test]
fn hand_edited_derived_scenario_is_restored() {
    let fixture = TestCatalog::new();
    set_damages(&fixture);
    let catalog = fixture.open();
    catalog
        .tipping_points
        .save(&sweep(100.0, "TotalDamageEvent"), false)
        .expect("save tipping point");
    TippingPointSearch::new(&catalog, "sweep")
        .expect("search")
        .run()
        .expect("first run");

    let name = "sweep_storm_no_measures_slr0p50";
    let path = fixture
        .paths()
        .definition_path(floodcat::objects::ObjectKind::Scenario, name);
    let text = std::fs::read_to_string(&path).expect("read scenario");
    std::fs::write(&path, text.replace("strategy = \"no_measures\"", "strategy = \"wall\""))
        .expect("rewrite scenario");
    assert_eq!(catalog.scenarios.get(name).expect("edited").strategy, "wall");

    let mut search = TippingPointSearch::new(&catalog, "sweep").expect("search");
    let progress = search.run().expect("second run");

    assert!(progress.increments[0].created);
    assert!(!progress.increments[1].created);
    assert_eq!(
        catalog.scenarios.get(name).expect("restored").strategy,
        "no_measures"
    );
}
