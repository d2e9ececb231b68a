//! Compilation pipeline: placement optimization, template assembly, link
//! validation, and atomic emission of agents files.

pub mod agents_compiler;
pub mod constitution;
pub mod context_optimizer;
pub mod link_resolver;
pub mod pattern;
pub mod template_builder;

pub use agents_compiler::{AgentsCompiler, CompilationConfig, CompileResult};
pub use constitution::{
    CONSTITUTION_RELATIVE_PATH, Constitution, compute_constitution_hash, load_constitution,
};
pub use context_optimizer::{
    ContextOptimizer, DirectoryAnalysis, InheritanceAnalysis, OptimizationStats,
    PlacementCandidate, PlacementMap,
};
pub use link_resolver::validate_link_targets;
pub use pattern::PatternSet;
