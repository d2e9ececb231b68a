//! Transitive dependency resolution.
//!
//! Walks the dependency graph depth-first in declaration order, fetching
//! each package once. Re-declarations with a different ref and cycles are
//! warnings, never fatal: the first resolved reference wins and back-edges
//! are pruned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::manifest::{APMPackage, DependencyReference};

use super::downloader::{PackageFetcher, ResolvedReference};

/// One resolved node of the graph. Plain data; the graph holds no
/// back-pointers, so cyclic declarations cannot create cyclic structures.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub reference: DependencyReference,
    pub install_path: PathBuf,
    pub package: APMPackage,
    pub resolved: ResolvedReference,
}

/// Pre-order (DFS, declaration order) sequence of resolved dependencies,
/// plus the warnings produced while building it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub dependencies: Vec<ResolvedDependency>,
    pub warnings: Vec<Diagnostic>,
}

impl ResolvedGraph {
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter()
    }
}

/// Resolves a package's transitive APM dependencies into a modules
/// directory.
pub struct DependencyResolver<'a> {
    fetcher: &'a dyn PackageFetcher,
    modules_dir: PathBuf,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(fetcher: &'a dyn PackageFetcher, modules_dir: &Path) -> Self {
        Self {
            fetcher,
            modules_dir: modules_dir.to_path_buf(),
        }
    }

    /// Resolve the full graph seeded from the root package's declarations.
    pub fn resolve(&self, root: &APMPackage) -> Result<ResolvedGraph> {
        let mut graph = ResolvedGraph::default();
        // repo_url -> reference that won the first resolution.
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        let mut in_progress: Vec<String> = Vec::new();

        let declarations = root
            .apm_dependencies()
            .context("invalid dependency declaration in project manifest")?;
        for dependency in declarations {
            self.visit(&dependency, &mut graph, &mut resolved, &mut in_progress)?;
        }
        Ok(graph)
    }

    fn visit(
        &self,
        dependency: &DependencyReference,
        graph: &mut ResolvedGraph,
        resolved: &mut HashMap<String, Option<String>>,
        in_progress: &mut Vec<String>,
    ) -> Result<()> {
        if in_progress.iter().any(|repo| repo == &dependency.repo_url) {
            graph.warnings.push(Diagnostic::warning(format!(
                "Dependency cycle detected: {} (edge pruned)",
                dependency.repo_url
            )));
            return Ok(());
        }

        if let Some(winning_reference) = resolved.get(&dependency.repo_url) {
            if *winning_reference != dependency.reference {
                graph.warnings.push(Diagnostic::warning(format!(
                    "Version conflict for {}: '{}' requested but '{}' already resolved, keeping '{}'",
                    dependency.repo_url,
                    reference_label(&dependency.reference),
                    reference_label(winning_reference),
                    reference_label(winning_reference),
                )));
            }
            return Ok(());
        }

        let destination = dependency.install_path(&self.modules_dir);
        debug!(dependency = %dependency, destination = %destination.display(), "fetching dependency");
        let result = self
            .fetcher
            .fetch(dependency, &destination)
            .with_context(|| format!("Failed to install dependency {dependency}"))?;

        resolved.insert(dependency.repo_url.clone(), dependency.reference.clone());
        in_progress.push(dependency.repo_url.clone());

        let transitive = match result.package.apm_dependencies() {
            Ok(transitive) => transitive,
            Err(err) => {
                graph.warnings.push(Diagnostic::warning(format!(
                    "Ignoring dependencies of {}: {err}",
                    dependency.repo_url
                )));
                Vec::new()
            }
        };

        graph.dependencies.push(ResolvedDependency {
            reference: dependency.clone(),
            install_path: result.install_path,
            package: result.package,
            resolved: result.resolved,
        });

        for child in &transitive {
            self.visit(child, graph, resolved, in_progress)?;
        }

        in_progress.pop();
        Ok(())
    }
}

fn reference_label(reference: &Option<String>) -> &str {
    reference.as_deref().unwrap_or("default branch")
}
