//! Materialize dependency references into local directories.
//!
//! The real implementation shells out to the `git` binary with interactive
//! prompts disabled; tests substitute an in-memory [`PackageFetcher`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::manifest::{APMPackage, DependencyReference};
use crate::platform::TokenProvider;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const RETRY_ATTEMPTS: u32 = 2;

/// Failure modes of a package fetch. Network failures may be retried;
/// everything else is fatal.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error fetching {reference}: {message}")]
    Network {
        reference: String,
        message: String,
        retriable: bool,
    },
    #[error("Authentication failed for {reference}: {message}")]
    Auth { reference: String, message: String },
    #[error("Reference '{reference}' not found in {repo}")]
    ReferenceNotFound { repo: String, reference: String },
    #[error("Destination {} is busy or not writable", .path.display())]
    DestinationBusy { path: PathBuf },
}

impl DownloadError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, DownloadError::Network { retriable: true, .. })
    }
}

/// A symbolic reference resolved to an immutable commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// The branch, tag, or commit the user asked for, if any.
    pub ref_name: Option<String>,
    /// The commit the reference resolved to.
    pub resolved_commit: String,
}

/// Result of materializing one dependency.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub install_path: PathBuf,
    pub package: APMPackage,
    pub resolved: ResolvedReference,
}

/// Fetches a dependency's source tree into a destination directory.
pub trait PackageFetcher {
    fn fetch(
        &self,
        dependency: &DependencyReference,
        destination: &Path,
    ) -> Result<DownloadResult, DownloadError>;
}

/// Fetches packages by shallow-cloning with the `git` binary.
///
/// `GIT_TERMINAL_PROMPT=0` makes interactive credential prompts impossible;
/// authentication, if any, is injected from the [`TokenProvider`].
pub struct GitDownloader {
    token_provider: Box<dyn TokenProvider>,
    host: String,
    timeout: Duration,
}

impl GitDownloader {
    pub fn new(token_provider: Box<dyn TokenProvider>) -> Self {
        Self {
            token_provider,
            host: "github.com".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn clone_url(&self, dependency: &DependencyReference) -> String {
        match self.token_provider.token("modules") {
            Some(token) => format!(
                "https://x-access-token:{token}@{}/{}.git",
                self.host, dependency.repo_url
            ),
            None => format!("https://{}/{}.git", self.host, dependency.repo_url),
        }
    }

    fn run_git(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        dependency: &DependencyReference,
    ) -> Result<Output, DownloadError> {
        let mut command = Command::new("git");
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|err| DownloadError::Network {
            reference: dependency.to_string(),
            message: format!("failed to launch git: {err}"),
            retriable: false,
        })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(DownloadError::Network {
                            reference: dependency.to_string(),
                            message: format!(
                                "operation timed out after {}s",
                                self.timeout.as_secs()
                            ),
                            retriable: true,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(err) => {
                    return Err(DownloadError::Network {
                        reference: dependency.to_string(),
                        message: format!("failed to wait for git: {err}"),
                        retriable: false,
                    });
                }
            }
        }

        child
            .wait_with_output()
            .map_err(|err| DownloadError::Network {
                reference: dependency.to_string(),
                message: format!("failed to collect git output: {err}"),
                retriable: false,
            })
    }

    fn classify_failure(
        &self,
        output: &Output,
        dependency: &DependencyReference,
    ) -> DownloadError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = self.redact(&stderr);
        let lowered = stderr.to_lowercase();

        if lowered.contains("authentication failed")
            || lowered.contains("could not read username")
            || lowered.contains("403")
        {
            return DownloadError::Auth {
                reference: dependency.to_string(),
                message: stderr.trim().to_string(),
            };
        }
        if lowered.contains("remote branch") && lowered.contains("not found")
            || lowered.contains("repository not found")
            || lowered.contains("couldn't find remote ref")
        {
            return DownloadError::ReferenceNotFound {
                repo: dependency.repo_url.clone(),
                reference: dependency
                    .reference
                    .clone()
                    .unwrap_or_else(|| "default branch".to_string()),
            };
        }
        DownloadError::Network {
            reference: dependency.to_string(),
            message: stderr.trim().to_string(),
            retriable: lowered.contains("could not resolve host")
                || lowered.contains("unable to access")
                || lowered.contains("timed out"),
        }
    }

    fn redact(&self, text: &str) -> String {
        match self.token_provider.token("modules") {
            Some(token) if !token.is_empty() => text.replace(&token, "***"),
            _ => text.to_string(),
        }
    }

    fn prepare_destination(&self, destination: &Path) -> Result<(), DownloadError> {
        if destination.exists() {
            fs::remove_dir_all(destination).map_err(|_| DownloadError::DestinationBusy {
                path: destination.to_path_buf(),
            })?;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|_| DownloadError::DestinationBusy {
                path: parent.to_path_buf(),
            })?;
        }
        Ok(())
    }

    fn clone_once(
        &self,
        dependency: &DependencyReference,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        self.prepare_destination(destination)?;
        let url = self.clone_url(dependency);
        let destination_text = destination.to_string_lossy().to_string();

        let mut args = vec!["clone", "--depth", "1", "--quiet"];
        if let Some(reference) = &dependency.reference {
            args.extend(["--branch", reference.as_str()]);
        }
        args.push(url.as_str());
        args.push(destination_text.as_str());

        let output = self.run_git(&args, None, dependency)?;
        if output.status.success() {
            return Ok(());
        }

        let failure = self.classify_failure(&output, dependency);

        // `--branch` only accepts branches and tags. A hex-looking ref that
        // was not found is retried as a commit fetch.
        if let (DownloadError::ReferenceNotFound { .. }, Some(reference)) =
            (&failure, &dependency.reference)
        {
            if looks_like_commit(reference) {
                return self.fetch_commit(dependency, destination, reference);
            }
        }
        Err(failure)
    }

    fn fetch_commit(
        &self,
        dependency: &DependencyReference,
        destination: &Path,
        commit: &str,
    ) -> Result<(), DownloadError> {
        self.prepare_destination(destination)?;
        let url = self.clone_url(dependency);
        let destination_text = destination.to_string_lossy().to_string();

        let output = self.run_git(
            &["clone", "--depth", "1", "--quiet", &url, &destination_text],
            None,
            dependency,
        )?;
        if !output.status.success() {
            return Err(self.classify_failure(&output, dependency));
        }

        let fetch = self.run_git(
            &["fetch", "--depth", "1", "origin", commit],
            Some(destination),
            dependency,
        )?;
        if !fetch.status.success() {
            return Err(DownloadError::ReferenceNotFound {
                repo: dependency.repo_url.clone(),
                reference: commit.to_string(),
            });
        }

        let checkout = self.run_git(
            &["checkout", "--quiet", "FETCH_HEAD"],
            Some(destination),
            dependency,
        )?;
        if !checkout.status.success() {
            return Err(DownloadError::ReferenceNotFound {
                repo: dependency.repo_url.clone(),
                reference: commit.to_string(),
            });
        }
        Ok(())
    }

    fn resolved_commit(
        &self,
        dependency: &DependencyReference,
        destination: &Path,
    ) -> Result<String, DownloadError> {
        let output = self.run_git(&["rev-parse", "HEAD"], Some(destination), dependency)?;
        if !output.status.success() {
            return Err(self.classify_failure(&output, dependency));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl PackageFetcher for GitDownloader {
    fn fetch(
        &self,
        dependency: &DependencyReference,
        destination: &Path,
    ) -> Result<DownloadResult, DownloadError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.clone_once(dependency, destination) {
                Ok(()) => break,
                Err(err) if err.is_retriable() && attempt <= RETRY_ATTEMPTS => {
                    debug!(
                        dependency = %dependency,
                        attempt,
                        "retriable fetch failure, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                }
                Err(err) => return Err(err),
            }
        }

        let resolved_commit = self.resolved_commit(dependency, destination)?;
        let package = load_installed_package(dependency, destination);

        Ok(DownloadResult {
            install_path: destination.to_path_buf(),
            package,
            resolved: ResolvedReference {
                ref_name: dependency.reference.clone(),
                resolved_commit,
            },
        })
    }
}

/// Read the fetched package's manifest, falling back to a synthetic one for
/// repositories that ship primitives without an `apm.yml`.
pub fn load_installed_package(
    dependency: &DependencyReference,
    install_path: &Path,
) -> APMPackage {
    let manifest_path = install_path.join("apm.yml");
    if manifest_path.is_file() {
        match APMPackage::from_apm_yml(&manifest_path) {
            Ok(package) => return package,
            Err(err) => {
                debug!(
                    dependency = %dependency,
                    %err,
                    "unreadable manifest in fetched package, using defaults"
                );
            }
        }
    }
    APMPackage::synthetic(dependency.name())
}

fn looks_like_commit(reference: &str) -> bool {
    reference.len() >= 7 && reference.chars().all(|c| c.is_ascii_hexdigit())
}
