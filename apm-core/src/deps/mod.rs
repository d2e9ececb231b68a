//! Dependency handling: downloading packages and resolving the transitive
//! graph.

pub mod downloader;
pub mod resolver;

use std::fs;
use std::path::Path;

use crate::manifest::APMPackage;
use crate::primitives::Scope;

pub use downloader::{
    DownloadError, DownloadResult, GitDownloader, PackageFetcher, ResolvedReference,
};
pub use resolver::{DependencyResolver, ResolvedDependency, ResolvedGraph};

/// Name of the local dependency store, relative to the project root.
pub const MODULES_DIR: &str = "apm_modules";

/// Discovery scopes for the dependencies already materialized under
/// `apm_modules/`, without touching the network.
///
/// Declared dependencies come first, in manifest order; installed packages
/// that are no longer declared follow in path order so their primitives stay
/// available until an explicit re-install prunes them.
pub fn installed_scopes(base_dir: &Path, package: Option<&APMPackage>) -> Vec<Scope> {
    let modules_dir = base_dir.join(MODULES_DIR);
    let mut scopes = Vec::new();
    let mut seen = Vec::new();

    if let Some(package) = package {
        if let Ok(declared) = package.apm_dependencies() {
            for dependency in declared {
                let install_path = dependency.install_path(&modules_dir);
                if install_path.is_dir() {
                    seen.push(install_path.clone());
                    scopes.push(Scope::dependency(dependency.display_name(), &install_path));
                }
            }
        }
    }

    for install_path in installed_package_dirs(&modules_dir) {
        if !seen.contains(&install_path) {
            let name = display_name_for(&modules_dir, &install_path);
            scopes.push(Scope::dependency(&name, &install_path));
        }
    }

    scopes
}

/// `apm_modules/<owner>/<name>` directories, sorted by path.
pub fn installed_package_dirs(modules_dir: &Path) -> Vec<std::path::PathBuf> {
    let mut dirs = Vec::new();
    let Ok(owners) = fs::read_dir(modules_dir) else {
        return dirs;
    };
    for owner in owners.flatten() {
        if !owner.path().is_dir() {
            continue;
        }
        let Ok(packages) = fs::read_dir(owner.path()) else {
            continue;
        };
        for package in packages.flatten() {
            if package.path().is_dir() {
                dirs.push(package.path());
            }
        }
    }
    dirs.sort();
    dirs
}

fn display_name_for(modules_dir: &Path, install_path: &Path) -> String {
    install_path
        .strip_prefix(modules_dir)
        .map(|relative| relative.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| install_path.to_string_lossy().to_string())
}
