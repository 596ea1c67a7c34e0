use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The mkmap developers",
    version,
    about = "mkmap CLI - Solve steady-state microkinetic models across a grid of descriptor values.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used by the independent pre-pass.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Map steady-state coverages and turnover frequencies over a descriptor grid.
    Run(RunArgs),
    /// Print a summary of a reaction model file.
    Inspect(InspectArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the reaction model definition in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub model: PathBuf,

    /// Path for the CSV map table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to the run configuration file in TOML format (grid, solver, mapper).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Numeric Overrides ---
    /// Solve in double precision instead of arbitrary-precision decimals.
    /// The default tolerance (1e-50) is out of reach for doubles; pair with --tolerance.
    #[arg(long, conflicts_with = "digits")]
    pub double: bool,

    /// Override the number of significant digits of the decimal backend.
    #[arg(long, value_name = "INT")]
    pub digits: Option<u32>,

    /// Override the residual tolerance of the Newton solver.
    #[arg(short, long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    // --- Mapper Overrides ---
    /// Override the maximum number of bisections per failed point.
    #[arg(long, value_name = "INT")]
    pub max_bisections: Option<usize>,

    /// Solve every point from its initial estimate before the warm-started traversal.
    #[arg(long)]
    pub independent: bool,

    // --- Analysis ---
    /// Export the reaction order of every turnover frequency in every gas pressure.
    #[arg(long)]
    pub reaction_orders: bool,

    /// Export the degree of rate control of every step on every turnover frequency.
    #[arg(long)]
    pub rate_control: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S solver.tolerance=1e-40
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the reaction model definition in TOML format.
    #[arg(required = true, value_name = "PATH")]
    pub model: PathBuf,
}
