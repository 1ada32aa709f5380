//! CLI argument parsing for the catalog tool.
//!
//! The CLI stays thin: each command maps onto one library operation.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "floodcat",
    version,
    about = "Scenario catalog and run orchestrator for flood adaptation planning",
    after_help = "Examples:\n  floodcat --root /data --name charleston list scenarios\n  floodcat --root /data --name charleston run kingtide_2050 kingtide_2080\n  floodcat --root /data --name charleston benefit check walls_benefit\n  floodcat --root /data --name charleston tipping-point run slr_sweep",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (defaults to <config dir>/floodcat/settings.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// Directory holding the databases
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Database name under the root
    #[arg(long, value_name = "NAME", global = true)]
    pub name: Option<String>,

    /// Remove orphaned and unfinished scenario output on open
    #[arg(long, global = true)]
    pub delete_crashed_runs: bool,

    /// Log at debug level
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the objects of one kind
    List(ListArgs),
    /// Print one object definition
    Show(ObjectArgs),
    /// Delete an object and its output
    Delete(DeleteArgs),
    /// Copy an object, including its auxiliary files
    Copy(CopyArgs),
    /// Run scenarios (hazard reuse applies)
    Run(RunArgs),
    /// Remove orphaned and unfinished scenario output now, even when crash
    /// cleanup is disabled in the settings
    Cleanup(JsonArgs),
    /// Summarize scenario output directories
    Outputs(JsonArgs),
    /// Cost-benefit analysis commands
    #[command(subcommand)]
    Benefit(BenefitCommand),
    /// Tipping-point search commands
    #[command(subcommand)]
    TippingPoint(TippingPointCommand),
    /// Print a starter measure definition of the given type
    Template(TemplateArgs),
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Object kind (event, projection, measure, strategy, scenario, benefit, tipping_point)
    pub kind: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ObjectArgs {
    pub kind: String,
    pub object: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub kind: String,
    pub object: String,

    /// Keep auxiliary files next to the definition
    #[arg(long)]
    pub definition_only: bool,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    pub kind: String,
    pub old: String,
    pub new: String,

    /// Description of the copy
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario names, run in the given order
    #[arg(required = true)]
    pub scenarios: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum BenefitCommand {
    /// Show which required scenarios exist and have run
    Check(BenefitArgs),
    /// Save the required scenarios that do not exist yet
    Create(BenefitArgs),
    /// Compute benefits once every required scenario has run
    Run(BenefitArgs),
}

#[derive(Args, Debug)]
pub struct BenefitArgs {
    pub benefit: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum TippingPointCommand {
    /// Sweep the configured sea-level rise increments
    Run(TippingPointArgs),
    /// Print the persisted progress of a search
    Status(TippingPointArgs),
}

#[derive(Args, Debug)]
pub struct TippingPointArgs {
    pub tipping_point: String,
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Measure type tag, e.g. floodwall or elevate_properties
    pub measure_type: String,

    /// Name written into the template
    #[arg(long, default_value = "new_measure")]
    pub name: String,
}
