//! The project constitution: a directive document embedded verbatim in every
//! compiled output, fingerprinted by a truncated content hash.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Location of the constitution document relative to the project root.
pub const CONSTITUTION_RELATIVE_PATH: &str = ".specify/memory/constitution.md";

const HASH_LENGTH: usize = 12;

/// A loaded constitution document.
#[derive(Debug, Clone)]
pub struct Constitution {
    pub path: PathBuf,
    pub text: String,
    pub hash: String,
}

/// Truncated hex SHA-256 fingerprint of the constitution text. Stable across
/// runs for identical input; any byte change produces a different value.
pub fn compute_constitution_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(HASH_LENGTH);
    for byte in digest.iter() {
        if hex.len() >= HASH_LENGTH {
            break;
        }
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(HASH_LENGTH);
    hex
}

/// Load the constitution if the project has one.
pub fn load_constitution(base_dir: &Path) -> Result<Option<Constitution>> {
    let path = base_dir.join(CONSTITUTION_RELATIVE_PATH);
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read constitution at {}", path.display()))?;
    let hash = compute_constitution_hash(&text);
    Ok(Some(Constitution { path, text, hash }))
}

/// Render the sentinel-delimited constitution block. The hash appears in
/// both sentinel lines so external tooling can detect drift without parsing
/// the body.
pub fn render_constitution_block(constitution: &Constitution) -> String {
    format!(
        "<!-- apm-constitution-begin hash:{hash} -->\n{text}\n<!-- apm-constitution-end hash:{hash} -->\n",
        hash = constitution.hash,
        text = constitution.text.trim_end_matches('\n'),
    )
}
