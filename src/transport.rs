//! Fetch/push/clone via the system `git` binary (§4.F "Transport (ambient)").
//!
//! Grounded in the teacher crate's own `push_impl.rs`, whose doc comment
//! states plainly: "Push is the one operation kept as a CLI subprocess
//! because gix does not yet provide a high-level push API." That file left
//! both functions as `todo!()`; this module is the real implementation,
//! extended to fetch and clone for the same reason, and wired to
//! [`crate::credentials::RemoteCredentialAdapter`] for authentication.

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::credentials::RemoteCredentialAdapter;
use crate::error::QuitGitError;

fn run_git(
    repo_path: &Path,
    args: &[&str],
    credentials: &RemoteCredentialAdapter,
) -> Result<std::process::Output, QuitGitError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo_path).args(args);
    let _guard = credentials.prepare_command(&mut cmd)?;
    debug!(?args, "running git subprocess");
    let output = cmd.output()?;
    Ok(output)
}

/// `git fetch <remote>`.
pub(crate) fn fetch(
    repo_path: &Path,
    remote: &str,
    credentials: &RemoteCredentialAdapter,
) -> Result<(), QuitGitError> {
    let output = run_git(repo_path, &["fetch", remote], credentials)?;
    if !output.status.success() {
        return Err(QuitGitError::BackendError {
            message: format!(
                "git fetch {remote} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}

/// `git push <remote> <refspec>`. Records a [`QuitGitError::QuitGitPushError`]
/// on the adapter (and returns it) if the remote rejects the push.
pub(crate) fn push(
    repo_path: &Path,
    remote: &str,
    refspec: &str,
    credentials: &RemoteCredentialAdapter,
) -> Result<(), QuitGitError> {
    let output = run_git(repo_path, &["push", remote, refspec], credentials)?;
    if !output.status.success() {
        let message = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let ref_name = refspec.split(':').next().unwrap_or(refspec).to_owned();
        credentials.record_push_error(ref_name.clone(), message.clone());
        warn!(ref_name, message, "push rejected");
        return Err(QuitGitError::QuitGitPushError { ref_name, message });
    }
    if let Some(err) = credentials.take_push_error() {
        return Err(err);
    }
    Ok(())
}

/// `git clone <origin> <path>` (non-bare).
pub(crate) fn clone(
    origin: &str,
    path: &Path,
    credentials: &RemoteCredentialAdapter,
) -> Result<(), QuitGitError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let target = path.to_string_lossy().into_owned();
    let output = run_git(parent, &["clone", origin, &target], credentials)?;
    if !output.status.success() {
        return Err(QuitGitError::BackendError {
            message: format!(
                "git clone {origin} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}
