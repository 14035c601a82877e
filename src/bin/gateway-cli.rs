use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use api_gateway::config::loader::{load_api_config, ConfigError};
use api_gateway::error::GatewayError;
use api_gateway::filter::Filter;
use api_gateway::gateway::{Components, Generation};
use api_gateway::mapping::OptionRegistry;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Offline tooling for API gateway configs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and compile an API config, reporting every issue
    ///
    /// Only the built-in filters and options are known offline. Names that
    /// the embedding application registers must be declared with
    /// `--filter` / `--option`, or the config is reported as invalid.
    Check {
        file: PathBuf,
        #[command(flatten)]
        extensions: Extensions,
    },
    /// Print the compiled verb/path table
    Routes {
        file: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        extensions: Extensions,
    },
}

/// Application-registered names to accept when compiling offline.
#[derive(Args, Debug, Default)]
struct Extensions {
    /// Filter name registered by the application (repeatable)
    #[arg(long = "filter", value_name = "NAME")]
    filters: Vec<String>,
    /// Option name registered by the application (repeatable)
    #[arg(long = "option", value_name = "NAME")]
    options: Vec<String>,
}

/// Stands in for an application filter; does nothing.
struct PassThrough;

#[async_trait::async_trait]
impl Filter for PassThrough {}

impl Extensions {
    fn components(&self) -> Components {
        let mut components = Components::default();
        for name in &self.filters {
            components.filters.register(name.clone(), PassThrough);
        }
        if !self.options.is_empty() {
            let mut options = OptionRegistry::with_builtins();
            for name in &self.options {
                options.register(name.clone(), |value: Value| -> Result<Value, String> { Ok(value) });
            }
            components.options = Arc::new(options);
        }
        components
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check { file, extensions } => check(&file, &extensions),
        Commands::Routes { file, json, extensions } => routes(&file, json, &extensions),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn compile(file: &Path, extensions: &Extensions) -> Result<Generation, Box<dyn std::error::Error>> {
    let config = match load_api_config(file) {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            for error in errors.iter() {
                eprintln!("error: {}", error);
            }
            return Err(format!("{}: {} issue(s)", file.display(), errors.len()).into());
        }
        Err(e) => return Err(e.into()),
    };

    match Generation::build(0, config, &extensions.components()) {
        Ok(generation) => Ok(generation),
        Err(GatewayError::Configuration(errors)) => {
            for error in errors.iter() {
                eprintln!("error: {}", error);
            }
            Err(format!("{}: {} issue(s)", file.display(), errors.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn check(file: &Path, extensions: &Extensions) -> Result<(), Box<dyn std::error::Error>> {
    let generation = compile(file, extensions)?;
    let index = generation.index();
    let methods: usize = index.routes().iter().map(|route| route.methods.len()).sum();
    println!(
        "{}: OK ({} routes, {} methods, {} definitions)",
        file.display(),
        index.routes().len(),
        methods,
        index.definitions().count()
    );
    Ok(())
}

fn routes(file: &Path, json: bool, extensions: &Extensions) -> Result<(), Box<dyn std::error::Error>> {
    let generation = compile(file, extensions)?;
    let summaries = generation.index().summaries();
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{:<8} {:<6} {:<5} PATH", "VERB", "ON AIR", "MOCK");
    for route in summaries {
        println!(
            "{:<8} {:<6} {:<5} {}",
            route.verb.as_str(),
            if route.on_air { "yes" } else { "no" },
            if route.mock { "yes" } else { "no" },
            route.path
        );
    }
    Ok(())
}
