//! Deps command implementation - list installed dependencies

use std::path::Path;

use anyhow::Result;
use console::style;
use serde::Serialize;

use crate::deps::{MODULES_DIR, installed_package_dirs};
use crate::manifest::APMPackage;
use crate::primitives::find_primitive_files;

#[derive(Debug, Serialize)]
struct InstalledPackage {
    name: String,
    version: String,
    primitives: usize,
    path: String,
}

/// Handle the deps command - tree view of `apm_modules/` with per-package
/// primitive file counts.
pub fn handle_deps_command(base_dir: &Path, json: bool) -> Result<()> {
    let modules_dir = base_dir.join(MODULES_DIR);
    let installed: Vec<InstalledPackage> = installed_package_dirs(&modules_dir)
        .into_iter()
        .map(|install_path| {
            let name = install_path
                .strip_prefix(&modules_dir)
                .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| install_path.to_string_lossy().to_string());
            let version = APMPackage::from_apm_yml(&install_path.join("apm.yml"))
                .map(|package| package.version)
                .unwrap_or_else(|_| "unknown".to_string());
            InstalledPackage {
                name,
                version,
                primitives: find_primitive_files(&install_path).len(),
                path: install_path.to_string_lossy().to_string(),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&installed)?);
        return Ok(());
    }

    if installed.is_empty() {
        println!(
            "{}",
            style("No dependencies installed. Run `apm install` first.").dim()
        );
        return Ok(());
    }

    println!("{}", style(format!("{MODULES_DIR}/")).bold());
    for (index, package) in installed.iter().enumerate() {
        let connector = if index + 1 == installed.len() {
            "└──"
        } else {
            "├──"
        };
        println!(
            "{connector} {} {} {}",
            style(&package.name).green(),
            style(format!("v{}", package.version)).dim(),
            style(format!("({} primitives)", package.primitives)).dim()
        );
    }
    Ok(())
}
