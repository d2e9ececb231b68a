//! Placement optimization for instructions.
//!
//! For every instruction the optimizer chooses the directories that will
//! receive a compiled file, trading context pollution against maintenance
//! locality under one hard constraint: every file matching the instruction's
//! `applyTo` pattern must be able to inherit the instruction from some
//! ancestor directory.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::primitives::Instruction;

use super::pattern::PatternSet;

/// Distribution share below which a pattern is considered concentrated
/// enough for a single placement.
pub const LOW_DISTRIBUTION_THRESHOLD: f64 = 0.15;
/// Distribution share above which a pattern is considered widespread and the
/// instruction goes to the project root.
pub const HIGH_DISTRIBUTION_THRESHOLD: f64 = 0.4;

pub const COVERAGE_EFFICIENCY_WEIGHT: f64 = 0.4;
pub const POLLUTION_MINIMIZATION_WEIGHT: f64 = 0.35;
pub const MAINTENANCE_LOCALITY_WEIGHT: f64 = 0.25;
pub const DEPTH_PENALTY_FACTOR: f64 = 0.1;

/// Directories never considered for analysis or placement.
const EXCLUDED_DIRS: [&str; 3] = ["apm_modules", "node_modules", "target"];

/// Snapshot of one directory, built once per optimization pass.
#[derive(Debug, Clone)]
pub struct DirectoryAnalysis {
    pub directory: PathBuf,
    /// Distance from the project root.
    pub depth: usize,
    /// Non-hidden regular files that are direct children.
    pub total_files: usize,
    /// Match counts per analyzed pattern.
    pub pattern_matches: HashMap<String, usize>,
    /// Direct-child file paths relative to the project root.
    files: Vec<String>,
}

impl DirectoryAnalysis {
    fn new(directory: PathBuf, depth: usize) -> Self {
        Self {
            directory,
            depth,
            total_files: 0,
            pattern_matches: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Fraction of direct children matching the pattern.
    pub fn relevance_score(&self, pattern: &str) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let matches = self.pattern_matches.get(pattern).copied().unwrap_or(0);
        matches as f64 / self.total_files as f64
    }
}

/// A scored candidate directory for placing one instruction.
#[derive(Debug, Clone)]
pub struct PlacementCandidate {
    pub directory: PathBuf,
    pub coverage_efficiency: f64,
    pub pollution_score: f64,
    pub maintenance_locality: f64,
    pub total_score: f64,
}

/// Directory path → instructions to emit there, sorted by path.
pub type PlacementMap<'a> = BTreeMap<PathBuf, Vec<&'a Instruction>>;

/// Context loaded by an agent working in a directory, walking its
/// inheritance chain up to the project root.
#[derive(Debug, Clone)]
pub struct InheritanceAnalysis {
    pub working_directory: PathBuf,
    pub inheritance_chain: Vec<PathBuf>,
    pub total_context_load: usize,
    pub relevant_context_load: usize,
}

impl InheritanceAnalysis {
    /// Share of loaded instructions that are relevant to the working
    /// directory. A directory loading nothing is perfectly efficient.
    pub fn efficiency_ratio(&self) -> f64 {
        if self.total_context_load == 0 {
            return 1.0;
        }
        self.relevant_context_load as f64 / self.total_context_load as f64
    }
}

/// Aggregate numbers reported after a compile pass.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationStats {
    pub average_context_efficiency: f64,
    pub total_agents_files: usize,
    pub directories_analyzed: usize,
}

/// The placement engine. Operates on a single filesystem snapshot; directory
/// analyses are cached for the lifetime of the instance and discarded with
/// it.
#[derive(Debug)]
pub struct ContextOptimizer {
    base_dir: PathBuf,
    analyses: BTreeMap<PathBuf, DirectoryAnalysis>,
    analyzed: bool,
}

impl ContextOptimizer {
    pub fn new(base_dir: &Path) -> Self {
        let base_dir = base_dir
            .canonicalize()
            .unwrap_or_else(|_| base_dir.to_path_buf());
        Self {
            base_dir,
            analyses: BTreeMap::new(),
            analyzed: false,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Decide placement directories for every instruction. Every input
    /// instruction appears in the result at least once.
    pub fn optimize_instruction_placement<'a>(
        &mut self,
        instructions: &'a [Instruction],
    ) -> PlacementMap<'a> {
        self.ensure_analyzed();

        let mut placement: PlacementMap<'a> = BTreeMap::new();
        for instruction in instructions {
            for directory in self.place_instruction(instruction) {
                placement.entry(directory).or_default().push(instruction);
            }
        }
        placement
    }

    fn place_instruction(&mut self, instruction: &Instruction) -> Vec<PathBuf> {
        let raw = instruction.apply_to.trim();
        if raw.is_empty() {
            return vec![self.base_dir.clone()];
        }

        let pattern = match PatternSet::new(raw) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(
                    instruction = %instruction.name,
                    pattern = raw,
                    %err,
                    "malformed applyTo pattern, placing at project root"
                );
                return vec![self.base_dir.clone()];
            }
        };

        self.ensure_pattern(&pattern);
        let matching = self.find_matching_directories(raw);
        if matching.is_empty() {
            return vec![self.base_dir.clone()];
        }

        let distribution = self.distribution_score(&matching);
        let mut selected = if distribution > HIGH_DISTRIBUTION_THRESHOLD {
            vec![self.base_dir.clone()]
        } else {
            let candidates = self.generate_candidates(&matching, raw);
            if distribution < LOW_DISTRIBUTION_THRESHOLD {
                self.select_single_point(&candidates)
            } else {
                self.select_multi_placement(&candidates, &matching)
            }
        };

        self.enforce_coverage(&mut selected, &matching);
        selected.sort();
        selected.dedup();
        selected
    }

    /// Share of analyzed directories that contain at least one matching
    /// file.
    pub fn distribution_score(&self, matching: &[PathBuf]) -> f64 {
        if self.analyses.is_empty() {
            return 0.0;
        }
        matching.len() as f64 / self.analyses.len() as f64
    }

    /// Directories with at least one direct child matching the pattern,
    /// sorted by path. The pattern must have been analyzed.
    pub fn find_matching_directories(&self, pattern: &str) -> Vec<PathBuf> {
        self.analyses
            .iter()
            .filter(|(_, analysis)| {
                analysis.pattern_matches.get(pattern).copied().unwrap_or(0) > 0
            })
            .map(|(directory, _)| directory.clone())
            .collect()
    }

    /// Score every matching directory and each of its ancestors up to the
    /// project root.
    pub fn generate_candidates(
        &self,
        matching: &[PathBuf],
        pattern: &str,
    ) -> Vec<PlacementCandidate> {
        let mut directories: BTreeSet<PathBuf> = BTreeSet::new();
        for directory in matching {
            directories.insert(directory.clone());
            let mut cursor = directory.clone();
            while cursor != self.base_dir {
                let Some(parent) = cursor.parent() else {
                    break;
                };
                if !parent.starts_with(&self.base_dir) {
                    break;
                }
                directories.insert(parent.to_path_buf());
                cursor = parent.to_path_buf();
            }
        }

        let cluster = self.densest_matching_directory(pattern);
        let mut candidates = Vec::with_capacity(directories.len());
        for directory in directories {
            let Some(analysis) = self.analyses.get(&directory) else {
                continue;
            };
            let coverage_efficiency = analysis.relevance_score(pattern);
            let pollution_score = self.pollution_score(&directory, pattern);
            let maintenance_locality = match &cluster {
                Some(cluster_dir) => {
                    1.0 / (1.0 + self.path_distance(&directory, cluster_dir) as f64)
                }
                None => 0.0,
            };
            let depth_penalty =
                (analysis.depth as f64 - 3.0).max(0.0) * DEPTH_PENALTY_FACTOR;
            let total_score = coverage_efficiency * COVERAGE_EFFICIENCY_WEIGHT
                + (1.0 - pollution_score) * POLLUTION_MINIMIZATION_WEIGHT
                + maintenance_locality * MAINTENANCE_LOCALITY_WEIGHT
                - depth_penalty;

            candidates.push(PlacementCandidate {
                directory,
                coverage_efficiency,
                pollution_score,
                maintenance_locality,
                total_score,
            });
        }

        candidates.sort_by(Self::compare_candidates);
        candidates
    }

    fn compare_candidates(a: &PlacementCandidate, b: &PlacementCandidate) -> Ordering {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.directory.cmp(&b.directory))
    }

    fn select_single_point(&self, candidates: &[PlacementCandidate]) -> Vec<PathBuf> {
        match candidates.first() {
            Some(best) => vec![best.directory.clone()],
            None => vec![self.base_dir.clone()],
        }
    }

    /// Greedy cover: keep taking the highest-scoring candidate that still
    /// covers an uncovered matching directory.
    fn select_multi_placement(
        &self,
        candidates: &[PlacementCandidate],
        matching: &[PathBuf],
    ) -> Vec<PathBuf> {
        let mut uncovered: BTreeSet<&PathBuf> = matching.iter().collect();
        let mut selected = Vec::new();

        for candidate in candidates {
            if uncovered.is_empty() {
                break;
            }
            let covered: Vec<&PathBuf> = uncovered
                .iter()
                .copied()
                .filter(|directory| directory.starts_with(&candidate.directory))
                .collect();
            if covered.is_empty() {
                continue;
            }
            selected.push(candidate.directory.clone());
            for directory in covered {
                uncovered.remove(directory);
            }
        }

        selected
    }

    /// Mandatory post-pass: every matching directory must have a placement
    /// on its inheritance chain. Coverage gaps are closed by adding the
    /// lowest common ancestor of the uncovered directories, falling back to
    /// the project root.
    fn enforce_coverage(&self, selected: &mut Vec<PathBuf>, matching: &[PathBuf]) {
        let uncovered: Vec<&PathBuf> = matching
            .iter()
            .filter(|directory| {
                !selected
                    .iter()
                    .any(|placement| directory.starts_with(placement))
            })
            .collect();
        if uncovered.is_empty() {
            return;
        }

        let mut ancestor = uncovered[0].clone();
        for directory in &uncovered[1..] {
            ancestor = self.common_ancestor(&ancestor, directory);
        }
        if !ancestor.starts_with(&self.base_dir) {
            ancestor = self.base_dir.clone();
        }
        if !selected.contains(&ancestor) {
            selected.push(ancestor);
        }
    }

    fn common_ancestor(&self, a: &Path, b: &Path) -> PathBuf {
        let mut cursor = a.to_path_buf();
        while !b.starts_with(&cursor) {
            match cursor.parent() {
                Some(parent) if parent.starts_with(&self.base_dir) => {
                    cursor = parent.to_path_buf();
                }
                _ => return self.base_dir.clone(),
            }
        }
        cursor
    }

    fn depth_of(&self, directory: &Path) -> usize {
        directory
            .strip_prefix(&self.base_dir)
            .map(|relative| relative.components().count())
            .unwrap_or(0)
    }

    fn path_distance(&self, a: &Path, b: &Path) -> usize {
        let ancestor = self.common_ancestor(a, b);
        self.depth_of(a) + self.depth_of(b) - 2 * self.depth_of(&ancestor)
    }

    /// Directory with the most matching files; ties break toward the
    /// lexicographically smaller path.
    fn densest_matching_directory(&self, pattern: &str) -> Option<PathBuf> {
        let mut cluster: Option<(&PathBuf, usize)> = None;
        for (directory, analysis) in &self.analyses {
            let count = analysis.pattern_matches.get(pattern).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            match cluster {
                Some((_, best)) if count <= best => {}
                _ => cluster = Some((directory, count)),
            }
        }
        cluster.map(|(directory, _)| directory.clone())
    }

    /// Subtree-weighted share of descendant files that do not match.
    fn pollution_score(&self, directory: &Path, pattern: &str) -> f64 {
        let mut total = 0usize;
        let mut matching = 0usize;
        for (candidate, analysis) in &self.analyses {
            if !candidate.starts_with(directory) {
                continue;
            }
            total += analysis.total_files;
            matching += analysis.pattern_matches.get(pattern).copied().unwrap_or(0);
        }
        if total == 0 {
            0.0
        } else {
            (total - matching) as f64 / total as f64
        }
    }

    /// The chain of directories from `directory` up to the project root,
    /// inclusive.
    pub fn inheritance_chain(&self, directory: &Path) -> Vec<PathBuf> {
        let mut chain = vec![directory.to_path_buf()];
        let mut cursor = directory.to_path_buf();
        while cursor != self.base_dir {
            let Some(parent) = cursor.parent() else {
                break;
            };
            if !parent.starts_with(&self.base_dir) {
                break;
            }
            chain.push(parent.to_path_buf());
            cursor = parent.to_path_buf();
        }
        chain
    }

    /// Whether an instruction applies to any file in the directory's
    /// subtree. Instructions without a pattern are relevant everywhere.
    pub fn is_instruction_relevant(&self, instruction: &Instruction, directory: &Path) -> bool {
        let raw = instruction.apply_to.trim();
        if raw.is_empty() {
            return true;
        }
        let Ok(pattern) = PatternSet::new(raw) else {
            return true;
        };
        self.analyses
            .iter()
            .filter(|(candidate, _)| candidate.starts_with(directory))
            .any(|(_, analysis)| {
                analysis
                    .files
                    .iter()
                    .any(|file| pattern.matches_path(Path::new(file)))
            })
    }

    /// Context load an agent in `working_directory` would see under the
    /// given placement.
    pub fn analyze_context_inheritance(
        &self,
        working_directory: &Path,
        placement: &PlacementMap<'_>,
    ) -> InheritanceAnalysis {
        let inheritance_chain = self.inheritance_chain(working_directory);
        let mut total_context_load = 0;
        let mut relevant_context_load = 0;

        for link in &inheritance_chain {
            if let Some(instructions) = placement.get(link) {
                for instruction in instructions {
                    total_context_load += 1;
                    if self.is_instruction_relevant(instruction, working_directory) {
                        relevant_context_load += 1;
                    }
                }
            }
        }

        InheritanceAnalysis {
            working_directory: working_directory.to_path_buf(),
            inheritance_chain,
            total_context_load,
            relevant_context_load,
        }
    }

    /// Aggregate efficiency numbers for a placement.
    pub fn optimization_stats(&self, placement: &PlacementMap<'_>) -> OptimizationStats {
        let mut total_efficiency = 0.0;
        let mut measured = 0usize;
        for directory in self.analyses.keys() {
            let inheritance = self.analyze_context_inheritance(directory, placement);
            if inheritance.total_context_load > 0 {
                total_efficiency += inheritance.efficiency_ratio();
                measured += 1;
            }
        }

        OptimizationStats {
            average_context_efficiency: if measured == 0 {
                1.0
            } else {
                total_efficiency / measured as f64
            },
            total_agents_files: placement.len(),
            directories_analyzed: self.analyses.len(),
        }
    }

    /// Walk the project once and cache per-directory analyses. Hidden
    /// entries and dependency/build directories are skipped.
    fn ensure_analyzed(&mut self) {
        if self.analyzed {
            return;
        }
        self.analyzed = true;

        self.analyses.insert(
            self.base_dir.clone(),
            DirectoryAnalysis::new(self.base_dir.clone(), 0),
        );

        let walker = WalkDir::new(&self.base_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') {
                    return false;
                }
                !(entry.file_type().is_dir() && EXCLUDED_DIRS.contains(&name.as_ref()))
            });

        for entry in walker {
            let Ok(entry) = entry else {
                continue;
            };
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                self.analyses
                    .insert(path.clone(), DirectoryAnalysis::new(path, entry.depth()));
            } else if entry.file_type().is_file() {
                let Some(parent) = entry.path().parent() else {
                    continue;
                };
                let relative = entry
                    .path()
                    .strip_prefix(&self.base_dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                if let Some(analysis) = self.analyses.get_mut(parent) {
                    analysis.total_files += 1;
                    analysis.files.push(relative);
                }
            }
        }
    }

    /// Compute and cache match counts for a pattern across all analyzed
    /// directories.
    fn ensure_pattern(&mut self, pattern: &PatternSet) {
        let key = pattern.raw().to_string();
        let already_analyzed = self
            .analyses
            .values()
            .next()
            .is_some_and(|analysis| analysis.pattern_matches.contains_key(&key));
        if already_analyzed {
            return;
        }

        let counts: Vec<(PathBuf, usize)> = self
            .analyses
            .iter()
            .map(|(directory, analysis)| {
                let count = analysis
                    .files
                    .iter()
                    .filter(|file| pattern.matches_path(Path::new(file)))
                    .count();
                (directory.clone(), count)
            })
            .collect();

        for (directory, count) in counts {
            if let Some(analysis) = self.analyses.get_mut(&directory) {
                analysis.pattern_matches.insert(key.clone(), count);
            }
        }
    }

    #[cfg(test)]
    fn analyze_for_tests(&mut self, patterns: &[&str]) {
        self.ensure_analyzed();
        for raw in patterns {
            if let Ok(pattern) = PatternSet::new(raw) {
                self.ensure_pattern(&pattern);
            }
        }
    }
}
