use anyhow::{anyhow, Context, Result};
use clap::Parser;
use floodcat::benefit::BenefitRunner;
use floodcat::catalog::Catalog;
use floodcat::objects::{DomainObject, Measure, MeasureType, ObjectKind};
use floodcat::settings::{Settings, SettingsOverrides};
use floodcat::store::ObjectStore;
use floodcat::tipping_point::TippingPointSearch;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{BenefitCommand, Command, GlobalArgs, RootArgs, TippingPointCommand};

/// Run `$body` with `$store` bound to the catalog store for `$kind`.
macro_rules! with_store {
    ($catalog:expr, $kind:expr, $store:ident => $body:expr) => {
        match $kind {
            ObjectKind::Event => {
                let $store = &$catalog.events;
                $body
            }
            ObjectKind::Projection => {
                let $store = &$catalog.projections;
                $body
            }
            ObjectKind::Measure => {
                let $store = &$catalog.measures;
                $body
            }
            ObjectKind::Strategy => {
                let $store = &$catalog.strategies;
                $body
            }
            ObjectKind::Scenario => {
                let $store = &$catalog.scenarios;
                $body
            }
            ObjectKind::Benefit => {
                let $store = &$catalog.benefits;
                $body
            }
            ObjectKind::TippingPoint => {
                let $store = &$catalog.tipping_points;
                $body
            }
        }
    };
}

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.global.verbose);

    if let Command::Template(template) = &args.command {
        return cmd_template(&template.measure_type, &template.name);
    }

    let catalog = open_catalog(&args.global)?;
    let result = dispatch(&catalog, args.command);
    catalog.close();
    result
}

fn dispatch(catalog: &Catalog, command: Command) -> Result<()> {
    match command {
        Command::List(list) => {
            let kind = parse_kind(&list.kind)?;
            with_store!(catalog, kind, store => cmd_list(store, list.json))
        }
        Command::Show(show) => {
            let kind = parse_kind(&show.kind)?;
            with_store!(catalog, kind, store => cmd_show(store, &show.object))
        }
        Command::Delete(delete) => {
            let kind = parse_kind(&delete.kind)?;
            with_store!(catalog, kind, store => store.delete(&delete.object, delete.definition_only))
        }
        Command::Copy(copy) => {
            let kind = parse_kind(&copy.kind)?;
            with_store!(catalog, kind, store => store
                .copy(&copy.old, &copy.new, &copy.description)
                .map(|_| ()))
        }
        Command::Run(run) => catalog.run_scenarios(run.scenarios.as_slice()),
        Command::Cleanup(cleanup) => {
            let report = catalog.remove_crashed_runs()?;
            if cleanup.json {
                print_json(&report)
            } else {
                for name in &report.orphaned {
                    println!("removed orphaned output {name}");
                }
                for name in &report.unfinished {
                    println!("removed unfinished output {name}");
                }
                for name in &report.failed {
                    println!("could not remove output {name}");
                }
                Ok(())
            }
        }
        Command::Outputs(outputs) => {
            let outputs_list = catalog.list_scenario_outputs()?;
            if outputs.json {
                print_json(&outputs_list)
            } else {
                for output in &outputs_list {
                    println!(
                        "{}\tfinished={}\thazard={}",
                        output.name, output.finished, output.hazard_complete
                    );
                }
                Ok(())
            }
        }
        Command::Benefit(command) => cmd_benefit(catalog, command),
        Command::TippingPoint(command) => cmd_tipping_point(catalog, command),
        Command::Template(template) => cmd_template(&template.measure_type, &template.name),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "floodcat=debug"
    } else {
        "floodcat=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_catalog(global: &GlobalArgs) -> Result<Catalog> {
    let overrides = SettingsOverrides {
        database_root: global.root.clone(),
        database_name: global.name.clone(),
        delete_crashed_runs: global.delete_crashed_runs,
    };
    let settings = Settings::resolve(global.settings.as_deref(), &overrides)?;
    Catalog::open(settings)
}

fn parse_kind(value: &str) -> Result<ObjectKind> {
    ObjectKind::parse(value).ok_or_else(|| {
        let known: Vec<_> = ObjectKind::ALL.iter().map(|kind| kind.as_str()).collect();
        anyhow!("unknown object kind {value:?} (expected one of {})", known.join(", "))
    })
}

#[derive(Serialize)]
struct ListEntry<'a> {
    name: &'a str,
    description: &'a str,
    last_modified_epoch_ms: u128,
    path: String,
}

fn cmd_list<T: DomainObject>(store: &ObjectStore<T>, json: bool) -> Result<()> {
    let infos = store.list()?;
    if json {
        let entries: Vec<_> = infos
            .iter()
            .map(|info| ListEntry {
                name: &info.name,
                description: &info.description,
                last_modified_epoch_ms: info.last_modified_epoch_ms,
                path: info.path.display().to_string(),
            })
            .collect();
        return print_json(&entries);
    }
    for info in &infos {
        let marker = if store.is_standard(&info.name) {
            " (standard)"
        } else {
            ""
        };
        println!("{}{marker}\t{}", info.name, info.description);
    }
    Ok(())
}

fn cmd_show<T: DomainObject>(store: &ObjectStore<T>, name: &str) -> Result<()> {
    let object = store.get(name)?;
    let text = toml::to_string_pretty(&object).context("serialize definition")?;
    print!("{text}");
    Ok(())
}

fn cmd_benefit(catalog: &Catalog, command: BenefitCommand) -> Result<()> {
    match command {
        BenefitCommand::Check(args) => {
            let runner = BenefitRunner::new(catalog, &args.benefit)?;
            let checks = runner.check_scenarios()?;
            if args.json {
                return print_json(&checks);
            }
            for check in &checks {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    check.role,
                    check.event,
                    check.projection,
                    check.strategy,
                    check.existing.as_deref().unwrap_or("-"),
                    if check.finished { "finished" } else { "not run" }
                );
            }
            println!("ready to run: {}", runner.ready_to_run()?);
            Ok(())
        }
        BenefitCommand::Create(args) => {
            let runner = BenefitRunner::new(catalog, &args.benefit)?;
            let created = runner.create_missing_scenarios()?;
            if args.json {
                return print_json(&created);
            }
            for name in &created {
                println!("created scenario {name}");
            }
            Ok(())
        }
        BenefitCommand::Run(args) => {
            let runner = BenefitRunner::new(catalog, &args.benefit)?;
            let results = runner.run()?;
            if args.json {
                return print_json(&results);
            }
            println!("present value of benefits: {:.2}", results.present_value_benefits);
            if let Some(npv) = results.net_present_value {
                println!("net present value: {npv:.2}");
            }
            if let Some(ratio) = results.benefit_cost_ratio {
                println!("benefit-cost ratio: {ratio:.3}");
            }
            Ok(())
        }
    }
}

fn cmd_tipping_point(catalog: &Catalog, command: TippingPointCommand) -> Result<()> {
    match command {
        TippingPointCommand::Run(args) => {
            let mut search = TippingPointSearch::new(catalog, &args.tipping_point)?;
            let progress = search.run()?;
            print_json(progress)
        }
        TippingPointCommand::Status(args) => {
            match TippingPointSearch::load_progress(catalog, &args.tipping_point)? {
                Some(progress) => print_json(&progress),
                None => {
                    println!("{}: not_started", args.tipping_point);
                    Ok(())
                }
            }
        }
    }
}

fn cmd_template(measure_type: &str, name: &str) -> Result<()> {
    let measure_type: MeasureType = measure_type.parse()?;
    let measure = Measure {
        name: name.to_string(),
        description: String::new(),
        kind: measure_type.template(),
    };
    measure.validate()?;
    let text = toml::to_string_pretty(&measure).context("serialize measure template")?;
    print!("{text}");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}
