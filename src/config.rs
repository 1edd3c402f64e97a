//! Durable configuration for a [`crate::Repository`].
//!
//! A small typed surface over the handful of settings the original
//! implementation read from environment variables or `git config`. Parsed
//! from an optional `quit.toml` next to the repository; a missing file
//! means all defaults, never an error (same contract as the teacher
//! crate's own `ManifoldConfig::load`).

use std::path::Path;

use serde::Deserialize;

/// Repository-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// The `gc.auto` threshold written when garbage collection is enabled
    /// and the repository has no threshold configured yet.
    pub gc_auto_threshold: u32,

    /// The default remote name used by [`crate::Repository::pull`] and
    /// [`crate::Repository::push`] when the caller doesn't specify one.
    pub default_remote: String,

    /// The default branch name used by [`crate::Repository::pull`].
    pub default_branch: String,

    /// Overrides `~/.ssh` as the directory to look for `id_rsa`/`id_rsa.pub`
    /// in. Mirrors the `QUIT_SSH_KEY_HOME` environment variable; an explicit
    /// config value takes precedence if both are set.
    pub ssh_key_home: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            gc_auto_threshold: 256,
            default_remote: "origin".to_owned(),
            default_branch: "master".to_owned(),
            ssh_key_home: None,
        }
    }
}

impl RepositoryConfig {
    /// Load `quit.toml` from `repo_path`, falling back to defaults if the
    /// file doesn't exist. Returns an error only if the file exists but is
    /// not valid TOML or doesn't match the schema.
    pub fn load(repo_path: &Path) -> Result<Self, crate::QuitGitError> {
        let config_path = repo_path.join("quit.toml");
        let raw = match std::fs::read_to_string(&config_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&raw).map_err(|e| crate::QuitGitError::BackendError {
            message: format!("invalid quit.toml at {}: {e}", config_path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_constants() {
        let cfg = RepositoryConfig::default();
        assert_eq!(cfg.gc_auto_threshold, 256);
        assert_eq!(cfg.default_remote, "origin");
        assert_eq!(cfg.default_branch, "master");
        assert_eq!(cfg.ssh_key_home, None);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RepositoryConfig::load(dir.path()).unwrap();
        assert_eq!(cfg, RepositoryConfig::default());
    }

    #[test]
    fn parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quit.toml"), "default_branch = \"main\"\n").unwrap();
        let cfg = RepositoryConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.default_branch, "main");
        assert_eq!(cfg.gc_auto_threshold, 256);
    }
}
