use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use herogen::cli;

#[derive(Parser)]
#[command(name = "herogen", version)]
#[command(about = "Generate, test and publish small npm packages with an LLM", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose packages for one or more ideas, generate them and publish them
    Generate {
        /// What the package should be about (e.g. "string utilities")
        #[arg(long, conflicts_with = "ideas")]
        prompt: Option<String>,

        /// Number of functions to ask for
        #[arg(long, default_value_t = 3)]
        functions: usize,

        /// Prefix for the package name
        #[arg(long)]
        prefix: Option<String>,

        /// TOML or JSON file with a list of ideas
        #[arg(long)]
        ideas: Option<String>,

        /// Path to config file (defaults to ./herogen.toml or ~/.config/herogen/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Override LLM model (e.g., "gpt-4o")
        #[arg(long)]
        model: Option<String>,

        /// Stop after assembling; leave packages in the staging directory
        #[arg(long)]
        no_publish: bool,

        /// Use mock LLM client for testing
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild index.js, tests.js and the test script of a package
    Assemble {
        /// Package directory
        path: String,
    },

    /// Publish staged packages, resuming any unfinished ones
    Publish {
        /// Package names (defaults to everything staged or pending)
        packages: Vec<String>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Check that a schema file has the expected shape
    Validate {
        /// Path to a schema JSON file
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Generate {
            prompt,
            functions,
            prefix,
            ideas,
            config,
            model,
            no_publish,
            dry_run,
        } => {
            cli::generate::run(
                prompt, functions, prefix, ideas, config, model, no_publish, dry_run,
            )
            .await?;
        }
        Commands::Assemble { path } => cli::assemble::run(&path)?,
        Commands::Publish { packages, config } => cli::publish::run(packages, config)?,
        Commands::Validate { path } => cli::validate::run(&path)?,
    }

    Ok(())
}
