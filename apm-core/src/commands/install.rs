//! Install command implementation - resolve and download dependencies

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::deps::{DependencyResolver, GitDownloader, MODULES_DIR};
use crate::manifest::APMPackage;
use crate::platform::EnvTokenProvider;

/// Handle the install command - materialize the full dependency graph into
/// `apm_modules/`.
pub fn handle_install_command(base_dir: &Path) -> Result<()> {
    let manifest_path = base_dir.join("apm.yml");
    let package = APMPackage::from_apm_yml(&manifest_path)
        .context("an apm.yml manifest is required to install dependencies")?;

    let declared = package.apm_dependencies()?;
    if declared.is_empty() {
        println!("{}", style("No APM dependencies declared.").dim());
        return Ok(());
    }

    println!(
        "{}",
        style(format!("Installing {} dependencies...", declared.len())).cyan()
    );

    let downloader = GitDownloader::new(Box::new(EnvTokenProvider));
    let modules_dir = base_dir.join(MODULES_DIR);
    let resolver = DependencyResolver::new(&downloader, &modules_dir);
    let graph = resolver.resolve(&package)?;

    for warning in &graph.warnings {
        println!("{} {}", style("Warning:").yellow().bold(), warning.message);
    }

    for dependency in graph.iter() {
        let commit = dependency
            .resolved
            .resolved_commit
            .chars()
            .take(10)
            .collect::<String>();
        let reference = dependency
            .resolved
            .ref_name
            .as_deref()
            .unwrap_or("default branch");
        println!(
            "{} {} ({reference} @ {commit})",
            style("Installed").green(),
            dependency.reference.display_name()
        );
    }

    println!(
        "{}",
        style(format!("{} package(s) installed.", graph.len())).dim()
    );
    Ok(())
}
