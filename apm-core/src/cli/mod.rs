//! Command-line argument surface.

pub mod args;

pub use args::{Cli, Commands};
