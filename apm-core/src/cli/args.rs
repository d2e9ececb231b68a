//! CLI argument parsing and configuration

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Main CLI structure for apm
#[derive(Parser, Debug)]
#[command(
    name = "apm",
    version,
    about = "Agent primitives compiler and package manager\n\nDiscovers markdown primitives (chatmodes, instructions, context, memory),\nresolves versioned primitive packages, and compiles AGENTS.md files placed\nto minimize irrelevant context while guaranteeing full coverage.\n\nQuick Start:\n  apm init my-project\n  apm install\n  apm compile"
)]
pub struct Cli {
    /// Workspace root directory (default: current directory)
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        value_hint = ValueHint::DirPath
    )]
    pub workspace: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a new APM project in the workspace
    Init {
        /// Project name (default: directory name)
        name: Option<String>,

        /// Overwrite existing files
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Compile primitives into AGENTS.md files
    Compile {
        /// Emit one file at the project root instead of optimized placements
        #[arg(long, default_value_t = false)]
        single_agents: bool,

        /// Assemble everything but write nothing
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Chatmode to embed, by name
        #[arg(long, value_name = "NAME")]
        chatmode: Option<String>,

        /// Output file name (default: AGENTS.md, or the manifest setting)
        #[arg(long, value_name = "PATH")]
        output: Option<String>,

        /// Skip markdown link validation
        #[arg(long, default_value_t = false)]
        no_link_check: bool,
    },

    /// Resolve and download APM dependencies into apm_modules/
    Install,

    /// List installed dependencies with per-package primitive counts
    Deps {
        /// Emit the listing as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run a script defined in apm.yml
    Run {
        /// Script name
        name: String,

        /// Workflow parameters as key=value pairs
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}
