//! Thin script runner: turn a script entry from `apm.yml` into a runtime
//! invocation, substituting compiled workflow content for `*.prompt.md`
//! tokens.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::manifest::APMPackage;
use crate::primitives::frontmatter;

/// Directory where compiled workflow bodies are written before execution,
/// relative to the project root.
pub const COMPILED_DIR: &str = ".apm/compiled";

static INPUT_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{input:([A-Za-z0-9_-]+)\}").unwrap_or_else(|err| {
        panic!("invalid input placeholder regex: {err}")
    })
});

/// A fully prepared command line, ready to hand to the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Leading `KEY=VALUE` assignments from the script template.
    pub env: Vec<(String, String)>,
}

/// A prepared script: the invocation plus the compiled workflow file it
/// references, if any.
#[derive(Debug, Clone)]
pub struct PreparedScript {
    pub invocation: RuntimeInvocation,
    pub compiled_prompt: Option<PathBuf>,
}

/// Prepares scripts defined in the project manifest.
pub struct ScriptRunner<'a> {
    base_dir: &'a Path,
    package: &'a APMPackage,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(base_dir: &'a Path, package: &'a APMPackage) -> Self {
        Self { base_dir, package }
    }

    /// Prepare the named script. `params` fill `${input:key}` placeholders
    /// in the referenced workflow body.
    pub fn prepare(&self, name: &str, params: &[(String, String)]) -> Result<PreparedScript> {
        let Some(template) = self.package.scripts.get(name) else {
            let available: Vec<&str> = self.package.scripts.keys().map(String::as_str).collect();
            bail!(
                "script '{name}' not found in apm.yml (available: {})",
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                }
            );
        };

        let tokens = shell_words::split(template)
            .with_context(|| format!("script '{name}' is not a valid command line"))?;

        let mut env = Vec::new();
        let mut rest = tokens.as_slice();
        while let Some((first, remaining)) = rest.split_first() {
            match split_env_assignment(first) {
                Some(assignment) => {
                    env.push(assignment);
                    rest = remaining;
                }
                None => break,
            }
        }

        let Some((program, raw_args)) = rest.split_first() else {
            bail!("script '{name}' names no runtime command");
        };

        let mut compiled_prompt = None;
        let mut args = Vec::with_capacity(raw_args.len());
        for token in raw_args {
            if token.ends_with(".prompt.md") {
                let compiled = self.compile_workflow(token, params)?;
                args.push(compiled.to_string_lossy().to_string());
                compiled_prompt = Some(compiled);
            } else {
                args.push(token.clone());
            }
        }

        Ok(PreparedScript {
            invocation: RuntimeInvocation {
                program: program.clone(),
                args,
                env,
            },
            compiled_prompt,
        })
    }

    /// Strip workflow frontmatter, substitute parameters, and write the body
    /// where the runtime can read it.
    fn compile_workflow(&self, token: &str, params: &[(String, String)]) -> Result<PathBuf> {
        let source = self.base_dir.join(token);
        let text = fs::read_to_string(&source)
            .with_context(|| format!("Failed to read workflow {}", source.display()))?;
        let document = frontmatter::split(&text)
            .map_err(|reason| anyhow::anyhow!("Failed to parse {}: {reason}", source.display()))?;

        let body = substitute_params(&document.body, params)?;

        let compiled_dir = self.base_dir.join(COMPILED_DIR);
        fs::create_dir_all(&compiled_dir)
            .with_context(|| format!("Failed to write {}", compiled_dir.display()))?;
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "workflow.prompt.md".to_string());
        let target = compiled_dir.join(file_name);
        fs::write(&target, body)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(target)
    }
}

fn substitute_params(body: &str, params: &[(String, String)]) -> Result<String> {
    let mut missing = Vec::new();
    let substituted = INPUT_PLACEHOLDER.replace_all(body, |captures: &regex::Captures<'_>| {
        let key = &captures[1];
        match params.iter().find(|(name, _)| name == key) {
            Some((_, value)) => value.clone(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        bail!(
            "missing required parameter(s): {} (pass them with --param key=value)",
            missing.join(", ")
        );
    }
    Ok(substituted.into_owned())
}

fn split_env_assignment(token: &str) -> Option<(String, String)> {
    let (key, value) = token.split_once('=')?;
    let is_identifier = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    is_identifier.then(|| (key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn package_with_script(script: &str) -> APMPackage {
        APMPackage::parse(
            &format!("name: p\nversion: 1.0.0\nscripts:\n  start: \"{script}\"\n"),
            None,
        )
        .unwrap()
    }

    fn write_workflow(dir: &Path, body: &str) {
        fs::write(
            dir.join("hello-world.prompt.md"),
            format!("---\ndescription: Demo workflow\n---\n\n{body}"),
        )
        .unwrap();
    }

    #[test]
    fn substitutes_workflow_file_with_compiled_copy() {
        let tmp = TempDir::new().unwrap();
        write_workflow(tmp.path(), "Say hello.\n");
        let package = package_with_script("codex hello-world.prompt.md");
        let runner = ScriptRunner::new(tmp.path(), &package);

        let prepared = runner.prepare("start", &[]).unwrap();
        assert_eq!(prepared.invocation.program, "codex");
        assert_eq!(prepared.invocation.args.len(), 1);
        let compiled = prepared.compiled_prompt.unwrap();
        assert!(compiled.starts_with(tmp.path().join(COMPILED_DIR)));
        let body = fs::read_to_string(&compiled).unwrap();
        assert_eq!(body, "Say hello.\n");
        // Frontmatter stripped.
        assert!(!body.contains("description"));
    }

    #[test]
    fn keeps_flags_and_env_assignments() {
        let tmp = TempDir::new().unwrap();
        write_workflow(tmp.path(), "Body.\n");
        let package =
            package_with_script("DEBUG=true codex --skip-git-repo-check hello-world.prompt.md");
        let runner = ScriptRunner::new(tmp.path(), &package);

        let prepared = runner.prepare("start", &[]).unwrap();
        assert_eq!(
            prepared.invocation.env,
            vec![("DEBUG".to_string(), "true".to_string())]
        );
        assert_eq!(prepared.invocation.program, "codex");
        assert_eq!(prepared.invocation.args[0], "--skip-git-repo-check");
    }

    #[test]
    fn fills_input_placeholders_from_params() {
        let tmp = TempDir::new().unwrap();
        write_workflow(tmp.path(), "Service: ${input:service}\n");
        let package = package_with_script("llm hello-world.prompt.md");
        let runner = ScriptRunner::new(tmp.path(), &package);

        let prepared = runner
            .prepare(
                "start",
                &[("service".to_string(), "payments".to_string())],
            )
            .unwrap();
        let body = fs::read_to_string(prepared.compiled_prompt.unwrap()).unwrap();
        assert_eq!(body, "Service: payments\n");
    }

    #[test]
    fn missing_param_is_an_error_naming_the_key() {
        let tmp = TempDir::new().unwrap();
        write_workflow(tmp.path(), "Service: ${input:service}\n");
        let package = package_with_script("llm hello-world.prompt.md");
        let runner = ScriptRunner::new(tmp.path(), &package);

        let err = runner.prepare("start", &[]).unwrap_err();
        assert!(err.to_string().contains("service"));
    }

    #[test]
    fn unknown_script_lists_available_names() {
        let tmp = TempDir::new().unwrap();
        let package = package_with_script("codex hello-world.prompt.md");
        let runner = ScriptRunner::new(tmp.path(), &package);

        let err = runner.prepare("deploy", &[]).unwrap_err();
        assert!(err.to_string().contains("deploy"));
        assert!(err.to_string().contains("start"));
    }
}
