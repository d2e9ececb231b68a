//! Adapter seams between the core and the host environment.
//!
//! The core never reads the environment directly; credentials come through
//! [`TokenProvider`], which tests replace with fakes.

/// Supplies opaque bearer credentials for a purpose. Lookup is lazy: nothing
/// is read until a credential is actually needed.
pub trait TokenProvider {
    /// A credential for the given purpose, or `None` when the host has
    /// nothing configured. The only purpose the core asks for today is
    /// `"modules"` (package fetch).
    fn token(&self, purpose: &str) -> Option<String>;
}

/// Environment-backed provider. For module access, `GITHUB_APM_PAT` is
/// consulted first, then `GITHUB_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTokenProvider;

impl TokenProvider for EnvTokenProvider {
    fn token(&self, purpose: &str) -> Option<String> {
        if purpose != "modules" {
            return None;
        }
        read_env("GITHUB_APM_PAT").or_else(|| read_env("GITHUB_TOKEN"))
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// A provider that never yields a credential. Useful in tests and for
/// anonymous access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenProvider;

impl TokenProvider for NoTokenProvider {
    fn token(&self, _purpose: &str) -> Option<String> {
        None
    }
}
