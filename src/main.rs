//! APM - agent primitives compiler and package manager
//!
//! This is the main binary entry point for apm.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apm_core::cli::{Cli, Commands};
use apm_core::commands::{
    CompileOptions, handle_compile_command, handle_deps_command, handle_init_command,
    handle_install_command, handle_run_command,
};

fn main() -> Result<()> {
    let args = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let workspace = resolve_workspace(args.workspace.clone())?;

    match args.command {
        Commands::Init { name, force } => handle_init_command(&workspace, name, force),
        Commands::Compile {
            single_agents,
            dry_run,
            chatmode,
            output,
            no_link_check,
        } => handle_compile_command(
            &workspace,
            CompileOptions {
                single_agents,
                dry_run,
                chatmode,
                output,
                no_link_check,
            },
        ),
        Commands::Install => handle_install_command(&workspace),
        Commands::Deps { json } => handle_deps_command(&workspace, json),
        Commands::Run { name, params } => handle_run_command(&workspace, &name, &params),
    }
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    let path = match workspace {
        Some(path) => path,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    path.canonicalize()
        .with_context(|| format!("workspace directory {} does not exist", path.display()))
}
