//! APM Core Library
//!
//! This crate provides the core functionality for the APM agent primitives
//! compiler and package manager: the primitive model and discovery layer,
//! the coverage-constrained context optimizer, the dependency resolver and
//! downloader, and the AGENTS.md compiler.
//!
//! ## Architecture
//!
//! One compile pass flows left to right:
//! `discovery ∪ resolver → PrimitiveCollection → optimizer → PlacementMap →
//! compiler → output files`. The collection owns the primitives; the
//! optimizer and compiler borrow them read-only.

// Public modules
pub mod cli;
pub mod commands;
pub mod compilation;
pub mod deps;
pub mod diagnostics;
pub mod manifest;
pub mod platform;
pub mod primitives;
pub mod scripts;

// Re-exports for convenience
pub use cli::{Cli, Commands};
pub use compilation::{
    AgentsCompiler, CompilationConfig, CompileResult, ContextOptimizer, OptimizationStats,
    PlacementMap, compute_constitution_hash,
};
pub use deps::{
    DependencyResolver, DownloadError, GitDownloader, PackageFetcher, ResolvedGraph,
};
pub use diagnostics::{Diagnostic, Severity};
pub use manifest::{APMPackage, CompilationStrategy, DependencyReference};
pub use platform::{EnvTokenProvider, NoTokenProvider, TokenProvider};
pub use primitives::{
    Chatmode, Context, Instruction, Memory, Primitive, PrimitiveCollection, PrimitiveKind,
    PrimitiveSource, discover_primitives, discover_with_dependencies, parse_primitive_file,
};
pub use scripts::{RuntimeInvocation, ScriptRunner};
