//! Assemble and emit compiled agents files from primitives and the
//! optimizer's placement decisions.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::manifest::{CompilationSettings, CompilationStrategy};
use crate::primitives::{Chatmode, PrimitiveCollection};

use super::constitution::{Constitution, load_constitution, render_constitution_block};
use super::context_optimizer::{ContextOptimizer, OptimizationStats, PlacementMap};
use super::link_resolver::validate_link_targets;
use super::template_builder::{
    assemble_document, build_chatmode_section, build_conditional_sections, build_context_sections,
};

/// Options controlling one compilation pass.
#[derive(Debug, Clone)]
pub struct CompilationConfig {
    /// Output file name, relative to each placement directory.
    pub output_path: String,
    /// Chatmode to embed, by name.
    pub chatmode: Option<String>,
    /// Validate relative markdown links in assembled content.
    pub resolve_links: bool,
    pub strategy: CompilationStrategy,
    /// Assemble everything but write nothing.
    pub dry_run: bool,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            output_path: "AGENTS.md".to_string(),
            chatmode: None,
            resolve_links: true,
            strategy: CompilationStrategy::Optimized,
            dry_run: false,
        }
    }
}

impl CompilationConfig {
    /// Build a config from the manifest's `compilation:` section.
    pub fn from_settings(settings: &CompilationSettings) -> Self {
        Self {
            output_path: settings.output.clone(),
            chatmode: settings.chatmode.clone(),
            resolve_links: settings.resolve_links,
            strategy: settings.strategy,
            dry_run: false,
        }
    }
}

/// Outcome of a compilation pass. Fatal write failures are returned as
/// errors instead; everything here is a successful pass plus warnings.
#[derive(Debug, Default)]
pub struct CompileResult {
    pub success: bool,
    /// Content of the project-root output file.
    pub content: String,
    pub files_written: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub stats: Option<OptimizationStats>,
}

/// The compiler. Borrows the primitive collection read-only and owns
/// nothing but the project root path.
#[derive(Debug)]
pub struct AgentsCompiler {
    base_dir: PathBuf,
}

impl AgentsCompiler {
    pub fn new(base_dir: &Path) -> Self {
        let base_dir = base_dir
            .canonicalize()
            .unwrap_or_else(|_| base_dir.to_path_buf());
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validation problems across the collection, as warnings.
    pub fn validate_primitives(&self, primitives: &PrimitiveCollection) -> Vec<String> {
        let mut warnings = Vec::new();
        for primitive in primitives.all_primitives() {
            for problem in primitive.validate() {
                warnings.push(format!(
                    "{} '{}': {problem}",
                    primitive.kind(),
                    primitive.name()
                ));
            }
        }
        warnings
    }

    /// Run a full compilation pass. Returns an error only for fatal
    /// conditions (write failures); per-primitive problems become warnings.
    pub fn compile(
        &self,
        config: &CompilationConfig,
        primitives: &PrimitiveCollection,
    ) -> Result<CompileResult> {
        let mut warnings = self.validate_primitives(primitives);
        let constitution = load_constitution(&self.base_dir)?;
        let chatmode = self.select_chatmode(config, primitives, &mut warnings);

        let mut outputs: Vec<(PathBuf, String)> = Vec::new();
        let mut stats = None;

        match config.strategy {
            CompilationStrategy::SingleFile => {
                let instructions: Vec<_> = primitives.instructions.iter().collect();
                let contexts: Vec<_> = primitives.contexts.iter().collect();
                let content = self.assemble(
                    constitution.as_ref(),
                    chatmode,
                    &instructions,
                    &contexts,
                );
                if !content_is_empty(&content) {
                    outputs.push((self.base_dir.join(&config.output_path), content));
                }
            }
            CompilationStrategy::Optimized => {
                let mut optimizer = ContextOptimizer::new(&self.base_dir);
                let placement: PlacementMap<'_> =
                    optimizer.optimize_instruction_placement(&primitives.instructions);
                stats = Some(optimizer.optimization_stats(&placement));

                let root = optimizer.base_dir().to_path_buf();
                for (directory, placed) in &placement {
                    let is_root = *directory == root;
                    let contexts: Vec<_> = if is_root {
                        primitives.contexts.iter().collect()
                    } else {
                        Vec::new()
                    };
                    let content = self.assemble(
                        constitution.as_ref(),
                        if is_root { chatmode } else { None },
                        placed,
                        &contexts,
                    );
                    outputs.push((directory.join(&config.output_path), content));
                }

                // The root file carries the constitution, chatmode, and
                // context material even when no instruction lands there.
                let root_output = root.join(&config.output_path);
                if !outputs.iter().any(|(path, _)| *path == root_output) {
                    let contexts: Vec<_> = primitives.contexts.iter().collect();
                    let content =
                        self.assemble(constitution.as_ref(), chatmode, &[], &contexts);
                    if !content_is_empty(&content) {
                        outputs.push((root_output, content));
                    }
                }
            }
        }

        if config.resolve_links {
            for (path, content) in &outputs {
                for problem in validate_link_targets(content, &self.base_dir) {
                    warnings.push(format!("{}: {problem}", path.display()));
                }
            }
        }

        outputs.sort_by(|(a, _), (b, _)| a.cmp(b));

        let root_output = self.base_dir.join(&config.output_path);
        let content = outputs
            .iter()
            .find(|(path, _)| *path == root_output)
            .or_else(|| outputs.first())
            .map(|(_, content)| content.clone())
            .unwrap_or_default();

        let mut files_written = Vec::new();
        if !config.dry_run {
            for (path, content) in &outputs {
                atomic_write(path, content)?;
                debug!(path = %path.display(), "wrote compiled agents file");
                files_written.push(path.clone());
            }
        }

        if outputs.is_empty() {
            warnings.push("Nothing to compile: no primitives or constitution found".to_string());
        }

        Ok(CompileResult {
            success: true,
            content,
            files_written,
            warnings,
            stats,
        })
    }

    fn select_chatmode<'a>(
        &self,
        config: &CompilationConfig,
        primitives: &'a PrimitiveCollection,
        warnings: &mut Vec<String>,
    ) -> Option<&'a Chatmode> {
        let name = config.chatmode.as_deref()?;
        match primitives.find_chatmode(name) {
            Some(chatmode) => Some(chatmode),
            None => {
                warnings.push(format!("Chatmode '{name}' not found"));
                None
            }
        }
    }

    fn assemble(
        &self,
        constitution: Option<&Constitution>,
        chatmode: Option<&Chatmode>,
        instructions: &[&crate::primitives::Instruction],
        contexts: &[&crate::primitives::Context],
    ) -> String {
        let mut sections = Vec::new();
        if let Some(constitution) = constitution {
            sections.push(render_constitution_block(constitution));
        }
        if let Some(chatmode) = chatmode {
            sections.push(build_chatmode_section(chatmode));
        }
        sections.push(build_conditional_sections(instructions));
        sections.push(build_context_sections(contexts));
        assemble_document(&sections)
    }
}

fn content_is_empty(content: &str) -> bool {
    content.trim() == super::template_builder::AGENTS_HEADER
}

/// Write through a temporary file in the destination directory, then rename.
/// Readers never observe partial content; on failure nothing is created.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("Failed to write {}: no parent directory", path.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    temp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| anyhow!("Failed to write {}: {}", path.display(), err.error))?;
    Ok(())
}
