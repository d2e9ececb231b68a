//! The `apm.yml` project manifest: package metadata, dependency references,
//! compilation settings, and user-defined scripts.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Deserialize;

/// A reference to a remote primitive package: `owner/name` with an optional
/// `#ref` suffix naming a branch, tag, or commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyReference {
    pub repo_url: String,
    pub reference: Option<String>,
}

impl DependencyReference {
    /// Parse a reference string of the form `owner/name[#ref]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (repo, reference) = match spec.split_once('#') {
            Some((repo, reference)) => (repo.trim(), Some(reference.trim())),
            None => (spec.trim(), None),
        };

        let mut segments = repo.split('/');
        let owner = segments.next().unwrap_or("");
        let name = segments.next().unwrap_or("");
        if owner.is_empty() || name.is_empty() || segments.next().is_some() {
            bail!("invalid dependency reference '{spec}': expected owner/name[#ref]");
        }

        Ok(Self {
            repo_url: repo.to_string(),
            reference: reference.filter(|r| !r.is_empty()).map(str::to_string),
        })
    }

    /// Display name used in source attribution and user output.
    pub fn display_name(&self) -> &str {
        &self.repo_url
    }

    pub fn owner(&self) -> &str {
        self.repo_url.split('/').next().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.repo_url.split('/').nth(1).unwrap_or("")
    }

    /// Local install directory for this dependency under the modules root.
    pub fn install_path(&self, modules_dir: &Path) -> PathBuf {
        modules_dir.join(self.owner()).join(self.name())
    }
}

impl fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}#{}", self.repo_url, reference),
            None => write!(f, "{}", self.repo_url),
        }
    }
}

/// `dependencies:` section. APM entries are resolved by this tool; MCP
/// entries are opaque tool-server identifiers passed through to external
/// adapters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencySection {
    #[serde(default)]
    pub apm: Vec<String>,
    #[serde(default)]
    pub mcp: Vec<String>,
}

/// Output strategy for the compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilationStrategy {
    SingleFile,
    #[default]
    Optimized,
}

fn default_output() -> String {
    "AGENTS.md".to_string()
}

fn default_true() -> bool {
    true
}

/// `compilation:` section of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilationSettings {
    /// Output file name, relative to each placement directory.
    #[serde(default = "default_output")]
    pub output: String,

    /// Chatmode selected for the compiled output, by name.
    #[serde(default)]
    pub chatmode: Option<String>,

    /// Validate relative markdown links in the assembled content.
    #[serde(default = "default_true")]
    pub resolve_links: bool,

    /// Placement strategy.
    #[serde(default)]
    pub strategy: CompilationStrategy,
}

impl Default for CompilationSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            chatmode: None,
            resolve_links: true,
            strategy: CompilationStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    dependencies: DependencySection,
    #[serde(default)]
    compilation: CompilationSettings,
    #[serde(default)]
    scripts: IndexMap<String, String>,
}

/// A parsed `apm.yml` manifest.
#[derive(Debug, Clone)]
pub struct APMPackage {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub dependencies: DependencySection,
    pub compilation: CompilationSettings,
    pub scripts: IndexMap<String, String>,
    /// Where the manifest was read from, when it came from disk.
    pub manifest_path: Option<PathBuf>,
}

impl APMPackage {
    /// Read and parse an `apm.yml` file.
    pub fn from_apm_yml(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest at {}", path.display()))?;
        Self::parse(&text, Some(path.to_path_buf()))
            .with_context(|| format!("Failed to parse manifest at {}", path.display()))
    }

    /// Parse manifest text. `name` and `version` are required.
    pub fn parse(text: &str, manifest_path: Option<PathBuf>) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(text).context("invalid YAML")?;

        let name = match raw.name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => bail!("missing required key 'name'"),
        };
        let version = match raw.version.filter(|v| !v.trim().is_empty()) {
            Some(version) => version,
            None => bail!("missing required key 'version'"),
        };

        Ok(Self {
            name,
            version,
            description: raw.description,
            author: raw.author,
            dependencies: raw.dependencies,
            compilation: raw.compilation,
            scripts: raw.scripts,
            manifest_path,
        })
    }

    /// A synthetic manifest for a fetched repository that ships no `apm.yml`.
    pub fn synthetic(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "0.0.0".to_string(),
            description: None,
            author: None,
            dependencies: DependencySection::default(),
            compilation: CompilationSettings::default(),
            scripts: IndexMap::new(),
            manifest_path: None,
        }
    }

    /// Parsed APM dependency references in declaration order.
    pub fn apm_dependencies(&self) -> Result<Vec<DependencyReference>> {
        self.dependencies
            .apm
            .iter()
            .map(|spec| DependencyReference::parse(spec))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_without_ref() {
        let dep = DependencyReference::parse("acme/compliance-rules").unwrap();
        assert_eq!(dep.repo_url, "acme/compliance-rules");
        assert_eq!(dep.reference, None);
        assert_eq!(dep.owner(), "acme");
        assert_eq!(dep.name(), "compliance-rules");
        assert_eq!(dep.to_string(), "acme/compliance-rules");
    }

    #[test]
    fn parses_reference_with_ref() {
        let dep = DependencyReference::parse("acme/design-guidelines#v1.2.0").unwrap();
        assert_eq!(dep.repo_url, "acme/design-guidelines");
        assert_eq!(dep.reference.as_deref(), Some("v1.2.0"));
        assert_eq!(dep.to_string(), "acme/design-guidelines#v1.2.0");
    }

    #[test]
    fn rejects_malformed_references() {
        assert!(DependencyReference::parse("no-slash").is_err());
        assert!(DependencyReference::parse("/leading").is_err());
        assert!(DependencyReference::parse("a/b/c").is_err());
        assert!(DependencyReference::parse("").is_err());
    }

    #[test]
    fn install_path_nests_owner_and_name() {
        let dep = DependencyReference::parse("acme/rules").unwrap();
        let path = dep.install_path(Path::new("apm_modules"));
        assert_eq!(path, Path::new("apm_modules/acme/rules"));
    }

    #[test]
    fn parses_full_manifest() {
        let text = r#"
name: corporate-website
version: 1.0.0
description: Example project
author: Platform Team
dependencies:
  apm:
    - acme/compliance-rules
    - acme/design-guidelines#main
  mcp:
    - github/github-mcp-server
scripts:
  start: "codex hello-world.prompt.md"
compilation:
  output: AGENTS.md
  resolve_links: false
  strategy: single-file
"#;
        let package = APMPackage::parse(text, None).unwrap();
        assert_eq!(package.name, "corporate-website");
        assert_eq!(package.version, "1.0.0");
        assert_eq!(package.dependencies.apm.len(), 2);
        assert_eq!(package.dependencies.mcp.len(), 1);
        assert!(!package.compilation.resolve_links);
        assert_eq!(package.compilation.strategy, CompilationStrategy::SingleFile);
        assert_eq!(
            package.scripts.get("start").map(String::as_str),
            Some("codex hello-world.prompt.md")
        );

        let deps = package.apm_dependencies().unwrap();
        assert_eq!(deps[0].reference, None);
        assert_eq!(deps[1].reference.as_deref(), Some("main"));
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = APMPackage::parse("version: 1.0.0\n", None).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn defaults_apply_for_compilation_section() {
        let package = APMPackage::parse("name: p\nversion: 0.1.0\n", None).unwrap();
        assert_eq!(package.compilation.output, "AGENTS.md");
        assert!(package.compilation.resolve_links);
        assert_eq!(package.compilation.strategy, CompilationStrategy::Optimized);
    }
}
