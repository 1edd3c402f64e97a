//! The Remote Credential Adapter (§4.F): picks an authentication method for
//! outgoing fetch/push traffic and captures asynchronous push-rejection
//! messages so the synchronous caller can re-raise them.
//!
//! `gix` has no high-level authenticated transport yet (the same limitation
//! the teacher crate's own `push_impl` documents for push specifically), so
//! fetch/push/clone are shelled out to the system `git` binary. This adapter
//! decides *how* that subprocess authenticates and prepares its environment
//! accordingly, without ever putting secrets on the command line where they
//! would be visible to `ps`.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use crate::error::QuitGitError;

/// The authentication method selected for one remote operation.
#[derive(Debug, Clone)]
enum CredentialMethod {
    /// Rely on `ssh-agent` via `SSH_AUTH_SOCK`; no extra configuration
    /// needed beyond making sure the child process inherits the env var.
    SshAgent,
    /// Use an explicit keypair found on disk.
    SshKey {
        private_key: PathBuf,
        public_key: PathBuf,
    },
    /// Plaintext username/password from the environment.
    UserPass { username: String, password: String },
}

/// Resolves credentials for remote operations and captures push rejections.
///
/// One adapter is owned per [`crate::Repository`] and reused across calls.
pub struct RemoteCredentialAdapter {
    ssh_key_home: Option<String>,
    /// Set by the push machinery after a push attempt; inspected by the
    /// caller immediately afterward. `Mutex` rather than `RefCell` because
    /// the adapter is conceptually shared with the subprocess callback site;
    /// in practice all access is single-threaded.
    push_error: Mutex<Option<QuitGitError>>,
}

impl RemoteCredentialAdapter {
    /// Create an adapter. `ssh_key_home` overrides `~/.ssh` when locating
    /// `id_rsa`/`id_rsa.pub`; if `None`, `QUIT_SSH_KEY_HOME` is consulted.
    #[must_use]
    pub fn new(ssh_key_home: Option<String>) -> Self {
        Self {
            ssh_key_home,
            push_error: Mutex::new(None),
        }
    }

    fn ssh_key_dir(&self) -> PathBuf {
        if let Some(home) = &self.ssh_key_home {
            return PathBuf::from(home);
        }
        if let Ok(home) = std::env::var("QUIT_SSH_KEY_HOME") {
            return PathBuf::from(home);
        }
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(".ssh")
    }

    /// Resolve the credential method that should be used for an outgoing
    /// transport operation, following the order from §4.F:
    /// agent, then explicit keypair, then plaintext userpass.
    fn resolve(&self) -> Result<CredentialMethod, QuitGitError> {
        if std::env::var_os("SSH_AUTH_SOCK").is_some() {
            return Ok(CredentialMethod::SshAgent);
        }

        let ssh_dir = self.ssh_key_dir();
        let private_key = ssh_dir.join("id_rsa");
        let public_key = ssh_dir.join("id_rsa.pub");
        if private_key.is_file() && public_key.is_file() {
            return Ok(CredentialMethod::SshKey {
                private_key,
                public_key,
            });
        }

        if let (Ok(username), Ok(password)) =
            (std::env::var("GIT_USERNAME"), std::env::var("GIT_PASSWORD"))
        {
            return Ok(CredentialMethod::UserPass { username, password });
        }

        Err(QuitGitError::BackendError {
            message:
                "no usable credentials: no SSH agent, no keypair at the configured ssh key home, \
                 and GIT_USERNAME/GIT_PASSWORD are not both set"
                    .to_owned(),
        })
    }

    /// Configure `cmd` (a `git` subprocess about to fetch, push, or clone)
    /// with the resolved authentication method. Never writes secrets into
    /// argv; userpass credentials go through a short-lived askpass script
    /// referenced by `GIT_ASKPASS`.
    ///
    /// Returns a guard that must be kept alive until `cmd` has finished
    /// running: for the userpass method it owns the askpass script's
    /// temporary file, which is deleted when the guard drops.
    pub(crate) fn prepare_command(&self, cmd: &mut Command) -> Result<CredentialGuard, QuitGitError> {
        match self.resolve()? {
            CredentialMethod::SshAgent => {
                // Nothing to add: the child inherits SSH_AUTH_SOCK from our
                // own environment, and plain `ssh` already knows to use it.
                Ok(CredentialGuard(None))
            }
            CredentialMethod::SshKey {
                private_key,
                public_key,
            } => {
                let _ = public_key; // libgit2/pygit2 require both files to exist; ssh(1) only needs the private half.
                cmd.env(
                    "GIT_SSH_COMMAND",
                    format!(
                        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                        private_key.display()
                    ),
                );
                Ok(CredentialGuard(None))
            }
            CredentialMethod::UserPass { username, password } => {
                let script = write_askpass_script(&username, &password)?;
                cmd.env("GIT_ASKPASS", script.path());
                cmd.env("GIT_TERMINAL_PROMPT", "0");
                Ok(CredentialGuard(Some(script)))
            }
        }
    }

    /// Record a push rejection reported by the remote. Called from the
    /// push-update-reference callback site; the synchronous `push` caller
    /// checks [`Self::take_push_error`] immediately afterward.
    pub(crate) fn record_push_error(&self, ref_name: String, message: String) {
        let mut slot = self.push_error.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(QuitGitError::QuitGitPushError { ref_name, message });
    }

    /// Take the recorded push error, if any, clearing it for the next push.
    pub(crate) fn take_push_error(&self) -> Option<QuitGitError> {
        let mut slot = self.push_error.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.take()
    }
}

/// Keeps any temporary credential material (e.g. the askpass script) alive
/// for the duration of a subprocess call; dropping it cleans up the file.
pub(crate) struct CredentialGuard(Option<tempfile::TempPath>);

/// Write a one-shot askpass script that answers `Username for '...':` and
/// `Password for '...':` prompts without ever putting the password on a
/// command line or in process argv.
fn write_askpass_script(username: &str, password: &str) -> Result<tempfile::TempPath, QuitGitError> {
    use std::io::Write as _;

    let mut file = tempfile::NamedTempFile::new()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let mut perms = file.as_file().metadata()?.permissions();
        perms.set_mode(0o700);
        file.as_file().set_permissions(perms)?;
    }
    writeln!(file, "#!/bin/sh")?;
    writeln!(file, "case \"$1\" in")?;
    writeln!(file, "  Username*) echo {} ;;", shell_quote(username))?;
    writeln!(file, "  Password*) echo {} ;;", shell_quote(password))?;
    writeln!(file, "esac")?;
    file.flush()?;
    Ok(file.into_temp_path())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// `resolve()` reads process-global environment variables (`SSH_AUTH_SOCK`,
    /// `GIT_USERNAME`, `GIT_PASSWORD`); serialize every test that touches them
    /// so they don't interfere with each other under `cargo test`'s default
    /// parallelism.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_credential_env() {
        std::env::remove_var("SSH_AUTH_SOCK");
        std::env::remove_var("GIT_USERNAME");
        std::env::remove_var("GIT_PASSWORD");
    }

    #[test]
    fn ssh_key_dir_respects_explicit_override() {
        let adapter = RemoteCredentialAdapter::new(Some("/tmp/custom-ssh".to_owned()));
        assert_eq!(adapter.ssh_key_dir(), PathBuf::from("/tmp/custom-ssh"));
    }

    #[test]
    fn push_error_roundtrip() {
        let adapter = RemoteCredentialAdapter::new(None);
        assert!(adapter.take_push_error().is_none());
        adapter.record_push_error("refs/heads/main".to_owned(), "rejected".to_owned());
        let err = adapter.take_push_error().expect("error recorded");
        match err {
            QuitGitError::QuitGitPushError { ref_name, message } => {
                assert_eq!(ref_name, "refs/heads/main");
                assert_eq!(message, "rejected");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        assert!(adapter.take_push_error().is_none());
    }

    #[test]
    fn resolve_prefers_ssh_agent_over_everything_else() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_credential_env();

        let empty_dir = tempfile::tempdir().unwrap();
        std::env::set_var("SSH_AUTH_SOCK", "/tmp/agent.sock");
        std::env::set_var("GIT_USERNAME", "someone");
        std::env::set_var("GIT_PASSWORD", "secret");

        let adapter = RemoteCredentialAdapter::new(Some(empty_dir.path().display().to_string()));
        let method = adapter.resolve().unwrap();
        assert!(matches!(method, CredentialMethod::SshAgent));

        clear_credential_env();
    }

    #[test]
    fn resolve_uses_keypair_when_no_agent_and_both_files_exist() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_credential_env();

        let ssh_dir = tempfile::tempdir().unwrap();
        std::fs::write(ssh_dir.path().join("id_rsa"), b"private").unwrap();
        std::fs::write(ssh_dir.path().join("id_rsa.pub"), b"public").unwrap();
        std::env::set_var("GIT_USERNAME", "someone");
        std::env::set_var("GIT_PASSWORD", "secret");

        let adapter = RemoteCredentialAdapter::new(Some(ssh_dir.path().display().to_string()));
        let method = adapter.resolve().unwrap();
        match method {
            CredentialMethod::SshKey { private_key, public_key } => {
                assert_eq!(private_key, ssh_dir.path().join("id_rsa"));
                assert_eq!(public_key, ssh_dir.path().join("id_rsa.pub"));
            }
            other => panic!("expected SshKey, got {other:?}"),
        }

        clear_credential_env();
    }

    #[test]
    fn resolve_falls_back_to_userpass_when_no_agent_or_keypair() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_credential_env();

        let empty_dir = tempfile::tempdir().unwrap();
        std::env::set_var("GIT_USERNAME", "someone");
        std::env::set_var("GIT_PASSWORD", "secret");

        let adapter = RemoteCredentialAdapter::new(Some(empty_dir.path().display().to_string()));
        let method = adapter.resolve().unwrap();
        match method {
            CredentialMethod::UserPass { username, password } => {
                assert_eq!(username, "someone");
                assert_eq!(password, "secret");
            }
            other => panic!("expected UserPass, got {other:?}"),
        }

        clear_credential_env();
    }

    #[test]
    fn resolve_fails_when_nothing_is_configured() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_credential_env();

        let empty_dir = tempfile::tempdir().unwrap();
        let adapter = RemoteCredentialAdapter::new(Some(empty_dir.path().display().to_string()));
        assert!(adapter.resolve().is_err());

        clear_credential_env();
    }
}
