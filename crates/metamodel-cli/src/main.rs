use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::Result;
use std::path::{Path, PathBuf};

use metamodel_core::{Config, Consumer, ErrorRecord, ModelDescription, OrderOutcome, Report};
use metamodel_emit::{GraphQlConsumer, RenderError, TdgConsumer, BUNDLED_TEMPLATE};
use metamodel_engine::ModelValidator;
use metamodel_parser::{parse_with, CycleDetected};

const DEFAULT_CONFIG: &str = "metamodel.toml";
const CONFIG_ENV: &str = "METAMODEL_CONFIG";
const TEMPLATE_FILE: &str = "relay_schema.js.jinja";

/// Metamodel - validate entity models and generate code from them
#[derive(Parser)]
#[command(name = "metamodel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: $METAMODEL_CONFIG or metamodel.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model and compute its emission order
    Check {
        /// Model description (JSON)
        model: PathBuf,

        /// Write a JSON report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Print the emission order of a model
    Order {
        /// Model description (JSON)
        model: PathBuf,

        /// Print the order as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Generate a GraphQL/Relay schema
    Graphql {
        /// Model description (JSON)
        model: PathBuf,

        /// Schema template (overrides graphql.template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output file for the schema
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate the test data generator import config
    Tdg {
        /// Model description (JSON)
        model: PathBuf,

        /// Output file for the config
        #[arg(short, long)]
        output: PathBuf,

        /// Number of generation iterations (overrides tdg.iterations)
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
    },

    /// Write a default config file and the bundled schema template
    InitConfig {
        /// Config file to create
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = || load_config(cli.config.as_deref(), cli.verbose);

    match &cli.command {
        Commands::Check { model, report } => check_command(&config()?, model, report.as_deref(), cli.verbose),
        Commands::Order { model, json } => order_command(&config()?, model, *json),
        Commands::Graphql { model, template, output } => {
            graphql_command(&config()?, model, template.clone(), output, cli.verbose)
        }
        Commands::Tdg { model, output, iterations } => {
            tdg_command(&config()?, model, output, *iterations, cli.verbose)
        }
        Commands::InitConfig { path } => init_config_command(path, cli.verbose),
    }
}

/// Log to stderr; RUST_LOG wins over the verbosity flag
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file to load: explicit flag, then environment, then the default if present
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let default = Path::new(DEFAULT_CONFIG);
    default.exists().then(|| default.to_path_buf())
}

fn load_config(explicit: Option<&Path>, verbose: bool) -> Result<Config> {
    match config_path(explicit) {
        Some(path) => {
            if verbose {
                eprintln!("{} {}", "Using config:".cyan(), path.display());
            }
            let config = Config::from_file(&path)?;
            tracing::debug!(
                path = %path.display(),
                types = config.validation.types.len(),
                flags = config.validation.flags.len(),
                "Loaded config"
            );
            Ok(config)
        }
        None => {
            if verbose {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            tracing::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn load_model(path: &Path, verbose: bool) -> Result<ModelDescription> {
    if verbose {
        eprintln!("{} {}", "Loading model from:".cyan(), path.display());
    }
    let model = ModelDescription::from_file(path)?;
    tracing::info!(path = %path.display(), entities = model.len(), "Loaded model");
    Ok(model)
}

/// Validate the model, check its reference targets and order it
fn check_model(config: &Config, model: &ModelDescription) -> Result<Report> {
    let mut validator = ModelValidator::new(config.validation.clone());
    parse_with(model, &mut validator)?;

    let unknown = validator.check_targets();
    if unknown > 0 {
        tracing::debug!(unknown, "References to undefined objects");
    }

    let outcome = match validator.emission_order() {
        Ok(order) => OrderOutcome::Ordered { order },
        Err(CycleDetected { resolved, unresolved }) => OrderOutcome::Cyclic { resolved, unresolved },
    };
    Ok(Report::new(model, validator.errors().clone()).with_order(outcome))
}

/// Check command - validate the model and order its entities
fn check_command(config: &Config, model_path: &Path, report_path: Option<&Path>, verbose: bool) -> Result<()> {
    let model = load_model(model_path, verbose)?;
    let report = check_model(config, &model)?;

    print_report_summary(&report);

    if let Some(path) = report_path {
        create_parent_dir(path)?;
        report.save_to_file(path)?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Order command - print the numbered emission order
fn order_command(config: &Config, model_path: &Path, json: bool) -> Result<()> {
    let model = load_model(model_path, false)?;

    let mut validator = ModelValidator::new(config.validation.clone());
    parse_with(&model, &mut validator)?;

    if !validator.is_valid() {
        eprintln!(
            "{} the model has {} validation errors",
            "Warning:".yellow().bold(),
            validator.errors().len()
        );
    }

    match validator.emission_order() {
        Ok(order) if json => println!("{}", serde_json::to_string_pretty(&order)?),
        Ok(order) => {
            for (index, entity) in order.iter().enumerate() {
                println!("{:>3}. {}", index + 1, entity);
            }
        }
        Err(cycle) => {
            print_cycle(&cycle);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// GraphQL command - render the Relay schema
fn graphql_command(
    config: &Config,
    model_path: &Path,
    template: Option<PathBuf>,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let model = load_model(model_path, verbose)?;

    let mut options = config.graphql.clone();
    if template.is_some() {
        options.template = template;
    }

    let mut consumer = GraphQlConsumer::new(config.validation.clone(), &options)?;
    if verbose {
        eprintln!("{} {}", "Using template:".cyan(), consumer.template().display());
    }
    parse_with(&model, &mut consumer)?;

    finish_output(consumer.write(output), consumer.errors(), output)
}

/// Tdg command - write the test data generator import config
fn tdg_command(
    config: &Config,
    model_path: &Path,
    output: &Path,
    iterations: Option<u32>,
    verbose: bool,
) -> Result<()> {
    let model = load_model(model_path, verbose)?;

    let mut options = config.tdg.clone();
    if let Some(iterations) = iterations {
        options.iterations = iterations;
    }

    let mut consumer = TdgConsumer::new(config.validation.clone(), &options);
    parse_with(&model, &mut consumer)?;

    finish_output(consumer.write(output), consumer.errors(), output)
}

/// Report the result of writing generated output
fn finish_output(result: Result<(), RenderError>, errors: &ErrorRecord, output: &Path) -> Result<()> {
    match result {
        Ok(()) => {
            println!("{} {}", "✓ Written:".green().bold(), output.display());
            Ok(())
        }
        Err(RenderError::InvalidModel(count)) => {
            println!("{} {} validation errors", "✗".red(), count.to_string().red().bold());
            print_errors(errors);
            std::process::exit(1);
        }
        Err(RenderError::Cycle(cycle)) => {
            print_cycle(&cycle);
            std::process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}

/// Init-config command - write the default config and template
fn init_config_command(path: &Path, verbose: bool) -> Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!("Config file already exists at {}", path.display()));
    }
    create_parent_dir(path)?;

    let mut config = Config::default();
    config.graphql.template = Some(PathBuf::from(TEMPLATE_FILE));
    config.save_to_file(path)?;
    println!("{} {}", "✓ Config written:".green().bold(), path.display());

    let template_path = path.parent().unwrap_or_else(|| Path::new("")).join(TEMPLATE_FILE);
    if template_path.exists() {
        if verbose {
            eprintln!("{} {}", "Keeping existing template:".yellow(), template_path.display());
        }
    } else {
        std::fs::write(&template_path, BUNDLED_TEMPLATE)?;
        println!("{} {}", "✓ Template written:".green().bold(), template_path.display());
    }

    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Model Check Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{}", "Summary:".bold());
    println!("  Entities:   {}", report.summary.entities);
    println!("  Attributes: {}", report.summary.attributes);
    println!("  References: {}", report.summary.references);

    if report.summary.errors > 0 {
        println!("  Errors:     {}", report.summary.errors.to_string().red().bold());
    } else {
        println!("  Errors:     {}", report.summary.errors.to_string().green());
    }
    println!();

    if report.errors.is_empty() {
        println!("{}", "✓ No validation errors".green().bold());
    } else {
        print_errors(&report.errors);
    }
    println!();

    match &report.order {
        Some(OrderOutcome::Ordered { order }) => {
            println!("{}", "Emission order:".bold());
            for (index, entity) in order.iter().enumerate() {
                println!("  {:>3}. {}", index + 1, entity);
            }
        }
        Some(OrderOutcome::Cyclic { resolved, unresolved }) => {
            print_cycle(&CycleDetected {
                resolved: resolved.clone(),
                unresolved: unresolved.clone(),
            });
        }
        None => {}
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

fn print_errors(errors: &ErrorRecord) {
    println!("{}", "Errors:".bold());
    for line in errors.to_string().lines() {
        println!("  {}", line.red());
    }
}

fn print_cycle(cycle: &CycleDetected) {
    println!("{}", "Some objects could not be ordered (cycle or unknown target)".red().bold());
    for line in cycle.diagnostic().lines() {
        println!("  {}", line);
    }
}
