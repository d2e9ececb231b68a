//! Compile command implementation - discovery, optimization, emission

use std::path::Path;

use anyhow::Result;
use console::style;

use crate::compilation::{AgentsCompiler, CompilationConfig};
use crate::deps::installed_scopes;
use crate::manifest::{APMPackage, CompilationStrategy};
use crate::primitives::discover_with_dependencies;

/// CLI overrides layered on top of the manifest's compilation settings.
#[derive(Debug, Default)]
pub struct CompileOptions {
    pub single_agents: bool,
    pub dry_run: bool,
    pub chatmode: Option<String>,
    pub output: Option<String>,
    pub no_link_check: bool,
}

/// Handle the compile command - full pipeline from discovery to emission.
pub fn handle_compile_command(base_dir: &Path, options: CompileOptions) -> Result<()> {
    let package = load_manifest(base_dir);
    let mut config = match &package {
        Some(package) => CompilationConfig::from_settings(&package.compilation),
        None => CompilationConfig::default(),
    };
    if options.single_agents {
        config.strategy = CompilationStrategy::SingleFile;
    }
    if let Some(chatmode) = options.chatmode {
        config.chatmode = Some(chatmode);
    }
    if let Some(output) = options.output {
        config.output_path = output;
    }
    if options.no_link_check {
        config.resolve_links = false;
    }
    config.dry_run = options.dry_run;

    let scopes = installed_scopes(base_dir, package.as_ref());
    let (primitives, diagnostics) = discover_with_dependencies(base_dir, &scopes)?;
    for diagnostic in diagnostics.iter().filter(|d| d.is_warning()) {
        println!("{} {}", style("Warning:").yellow().bold(), diagnostic.message);
    }

    println!(
        "{}",
        style(format!(
            "Compiling {} primitives ({} instructions)...",
            primitives.count(),
            primitives.instructions.len()
        ))
        .cyan()
    );

    let compiler = AgentsCompiler::new(base_dir);
    let result = compiler.compile(&config, &primitives)?;

    for warning in &result.warnings {
        println!("{} {warning}", style("Warning:").yellow().bold());
    }

    if config.dry_run {
        println!("{}", style("Dry run - nothing written.").dim());
        println!("{}", result.content);
        return Ok(());
    }

    for path in &result.files_written {
        let shown = pathdiff::diff_paths(path, base_dir).unwrap_or_else(|| path.clone());
        println!("{} {}", style("Wrote").green(), shown.display());
    }
    if let Some(stats) = result.stats {
        println!(
            "{}",
            style(format!(
                "{} agents file(s), {} directories analyzed, {:.0}% average context efficiency",
                stats.total_agents_files,
                stats.directories_analyzed,
                stats.average_context_efficiency * 100.0
            ))
            .dim()
        );
    }

    Ok(())
}

fn load_manifest(base_dir: &Path) -> Option<APMPackage> {
    let manifest_path = base_dir.join("apm.yml");
    if !manifest_path.is_file() {
        return None;
    }
    match APMPackage::from_apm_yml(&manifest_path) {
        Ok(package) => Some(package),
        Err(err) => {
            println!("{} {err:#}", style("Warning:").yellow().bold());
            None
        }
    }
}
