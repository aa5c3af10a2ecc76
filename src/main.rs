// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-link - module linker CLI
//!
//! Loads an entry module with modern, legacy or dynamic-import semantics
//! and prints its exports. With no entry it starts an interactive REPL.

mod repl;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use spacey_modules::{EngineConfig, FsHost, MemoryHost, ModuleEngine};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "spacey-link",
    about = "Module resolution and linking engine powered by Spacey",
    version = spacey_modules::VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Entry module specifier
    entry: Option<String>,

    /// Load modules from a JSON manifest instead of the file system
    #[arg(short = 'm', long)]
    manifest: Option<PathBuf>,

    /// Engine configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Load the entry through require()
    #[arg(short = 'r', long, conflicts_with = "dynamic")]
    require: bool,

    /// Load the entry through import()
    #[arg(short = 'd', long)]
    dynamic: bool,

    /// Print the dependency graph before evaluating
    #[arg(short = 'g', long)]
    graph: bool,

    /// Start interactive REPL
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_modules=debug,spacey_link=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_modules=warn")
            .init();
    }

    let (engine, manifest_entry) = build_engine(&cli)?;
    let entry = cli.entry.clone().or(manifest_entry);

    match entry {
        Some(entry) if !cli.interactive => Ok(run_entry(&engine, &entry, &cli).await),
        _ => {
            let mut repl = repl::Repl::new(engine).context("failed to start REPL")?;
            repl.run().context("REPL error")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the engine over a manifest or the current directory
fn build_engine(cli: &Cli) -> anyhow::Result<(ModuleEngine, Option<String>)> {
    let mut config =
        EngineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(path) = &cli.manifest {
        let (host, entry) = MemoryHost::from_manifest_file(path)
            .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
        tracing::debug!("Loaded manifest {}", path.display());
        return Ok((ModuleEngine::with_config(host, config), entry));
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    if config.base_dir == EngineConfig::default().base_dir {
        config.base_dir = cwd.to_string_lossy().into_owned();
    }
    Ok((ModuleEngine::with_config(FsHost::new(cwd), config), None))
}

async fn run_entry(engine: &ModuleEngine, entry: &str, cli: &Cli) -> ExitCode {
    if cli.graph {
        match engine.graph(entry) {
            Ok(graph) => repl::print_graph(&graph, engine),
            Err(e) => {
                repl::print_error(&e);
                return ExitCode::FAILURE;
            }
        }
    }

    let result = if cli.require {
        engine
            .require_legacy(entry, None)
            .map(|value| repl::format_value(&value))
    } else if cli.dynamic {
        engine
            .import_dynamic(entry, None)
            .await
            .map(|ns| repl::format_namespace(&ns))
    } else {
        engine
            .resolve_and_evaluate(entry)
            .map(|ns| repl::format_namespace(&ns))
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            repl::print_error(&e);
            eprintln!("  {} {}", "while loading".dimmed(), entry.cyan());
            ExitCode::FAILURE
        }
    }
}
