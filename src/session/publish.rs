use std::env;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use crate::config::SyncConfig;
use crate::db::RecordStore;
use crate::error::{error_chain, SyncError};
use crate::models::Collection;

/// Variables the credential helper reads. Their values come from the
/// environment variables named in `SyncConfig` and reach git only through the
/// child process environment.
const HELPER_USERNAME_ENV: &str = "MOUSE_RECORDS_GIT_USERNAME";
const HELPER_TOKEN_ENV: &str = "MOUSE_RECORDS_GIT_TOKEN";
const CREDENTIAL_HELPER: &str = "credential.helper=!f() { test \"$1\" = get || exit 0; \
     echo \"username=${MOUSE_RECORDS_GIT_USERNAME}\"; \
     echo \"password=${MOUSE_RECORDS_GIT_TOKEN}\"; }; f";

#[derive(Debug)]
pub enum PublishOutcome {
    Pushed,
    /// Both exports matched the last commit.
    NothingToPublish,
    /// The commit exists locally but the push failed; it is not rolled back.
    CommittedNotPushed(SyncError),
}

#[derive(Debug)]
pub struct PublishReport {
    pub exported: Vec<(Collection, usize)>,
    pub outcome: PublishOutcome,
}

impl PublishReport {
    pub fn summary(&self) -> String {
        let counts = self
            .exported
            .iter()
            .map(|(collection, rows)| format!("{} {rows}", collection.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.outcome {
            PublishOutcome::Pushed => format!("Published snapshots ({counts})."),
            PublishOutcome::NothingToPublish => {
                format!("Nothing to publish; snapshots unchanged ({counts}).")
            }
            PublishOutcome::CommittedNotPushed(err) => format!(
                "Committed snapshots locally ({counts}) but push failed: {}",
                error_chain(err)
            ),
        }
    }
}

/// Export both collections into the publish checkout, commit them, and push.
/// The checkout is created from `remote_url` on first use.
pub fn publish(store: &RecordStore, sync: &SyncConfig) -> Result<PublishReport, SyncError> {
    let repo = sync.repo_dir.as_path();
    let remote = sync.remote_url.trim();
    if remote.is_empty() {
        return Err(SyncError::NoRemote);
    }
    ensure_checkout(repo, remote, sync)?;

    let mut exported = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        let rows = store.export_to_path(collection, &sync.file_path(collection))?;
        exported.push((collection, rows));
    }

    let files: Vec<&str> = Collection::ALL
        .iter()
        .map(|collection| sync.file_name(*collection))
        .collect();
    let mut add_args = vec!["add", "--"];
    add_args.extend(files.iter().copied());
    git(repo, "add", &add_args, &[])?;

    if !has_staged_changes(repo)? {
        tracing::info!(repo = %repo.display(), "snapshots unchanged, nothing to publish");
        return Ok(PublishReport {
            exported,
            outcome: PublishOutcome::NothingToPublish,
        });
    }

    let user_name = format!("user.name={}", sync.author_name);
    let user_email = format!("user.email={}", sync.author_email);
    git(
        repo,
        "commit",
        &[
            "-c",
            user_name.as_str(),
            "-c",
            user_email.as_str(),
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-m",
            sync.commit_message.as_str(),
        ],
        &[],
    )?;
    tracing::info!(repo = %repo.display(), "committed snapshots");

    let outcome = match push(repo, remote, sync) {
        Ok(()) => {
            tracing::info!(repo = %repo.display(), "pushed snapshots");
            PublishOutcome::Pushed
        }
        Err(err) => {
            tracing::error!(error = %error_chain(&err), "push failed; local commit kept");
            PublishOutcome::CommittedNotPushed(err)
        }
    };

    Ok(PublishReport { exported, outcome })
}

/// Make `repo` the root of its own git checkout. A directory that is not one
/// (including one nested inside an unrelated repository) gets a fresh
/// repository on the remote's default branch, with the index reset to the
/// remote history so the next commit fast-forwards it.
fn ensure_checkout(repo: &Path, remote: &str, sync: &SyncConfig) -> Result<(), SyncError> {
    fs::create_dir_all(repo).map_err(|source| SyncError::Io {
        path: repo.to_path_buf(),
        source,
    })?;
    if is_checkout_root(repo)? {
        return Ok(());
    }

    tracing::info!(repo = %repo.display(), remote, "initializing publish checkout");
    git(repo, "init", &["init", "--quiet"], &[])?;

    let (auth, envs) = credentials(sync);
    let mut args = auth.clone();
    args.extend(["ls-remote", "--symref", remote, "HEAD"]);
    let listing = git(repo, "ls-remote", &args, &envs)?;
    let listing = String::from_utf8_lossy(&listing.stdout);

    let mut branch = None;
    let mut has_history = false;
    for line in listing.lines() {
        if let Some(symref) = line.strip_prefix("ref: ") {
            branch = symref.split_whitespace().next().map(str::to_string);
        } else if line.ends_with("\tHEAD") {
            has_history = true;
        }
    }

    if let Some(branch) = &branch {
        git(repo, "symbolic-ref", &["symbolic-ref", "HEAD", branch.as_str()], &[])?;
    }
    if has_history {
        let mut args = auth;
        args.extend(["fetch", "--quiet", remote, branch.as_deref().unwrap_or("HEAD")]);
        git(repo, "fetch", &args, &envs)?;
        git(repo, "reset", &["reset", "--quiet", "FETCH_HEAD"], &[])?;
        tracing::info!(repo = %repo.display(), "checkout attached to remote history");
    }
    Ok(())
}

fn is_checkout_root(repo: &Path) -> Result<bool, SyncError> {
    let output = run(repo, "rev-parse", &["rev-parse", "--show-toplevel"], &[])?;
    if !output.status.success() {
        return Ok(false);
    }
    let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match (fs::canonicalize(&toplevel), fs::canonicalize(repo)) {
        (Ok(toplevel), Ok(repo)) => Ok(toplevel == repo),
        _ => Ok(false),
    }
}

fn push(repo: &Path, remote: &str, sync: &SyncConfig) -> Result<(), SyncError> {
    let (mut args, envs) = credentials(sync);
    args.extend(["push", remote, "HEAD"]);
    git(repo, "push", &args, &envs)?;
    Ok(())
}

/// Leading `-c` arguments and child environment for commands that talk to
/// the remote.
fn credentials<'a>(sync: &SyncConfig) -> (Vec<&'a str>, Vec<(&'static str, String)>) {
    let mut args = Vec::new();
    let mut envs = vec![("GIT_TERMINAL_PROMPT", "0".to_string())];

    let username = env::var(&sync.username_env).ok().filter(|v| !v.is_empty());
    let token = env::var(&sync.token_env).ok().filter(|v| !v.is_empty());
    if let Some(token) = token {
        // An empty helper entry first clears helpers from the user's config.
        args.extend(["-c", "credential.helper=", "-c", CREDENTIAL_HELPER]);
        envs.push((HELPER_USERNAME_ENV, username.unwrap_or_else(|| "git".to_string())));
        envs.push((HELPER_TOKEN_ENV, token));
    } else {
        tracing::debug!(token_env = %sync.token_env, "no token in environment, using ambient credentials");
    }
    (args, envs)
}

/// `git diff --cached --quiet` exits 1 when something is staged.
fn has_staged_changes(repo: &Path) -> Result<bool, SyncError> {
    let output = run(repo, "diff", &["diff", "--cached", "--quiet"], &[])?;
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(SyncError::Git {
            command: "diff".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Run git and turn a non-zero exit into `SyncError::Git`.
fn git(
    repo: &Path,
    label: &str,
    args: &[&str],
    envs: &[(&str, String)],
) -> Result<Output, SyncError> {
    let output = run(repo, label, args, envs)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(SyncError::Git {
            command: label.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn run(
    repo: &Path,
    label: &str,
    args: &[&str],
    envs: &[(&str, String)],
) -> Result<Output, SyncError> {
    Command::new("git")
        .args(args)
        .current_dir(repo)
        .envs(envs.iter().map(|(key, value)| (*key, value.as_str())))
        .output()
        .map_err(|source| SyncError::Spawn {
            command: label.to_string(),
            source,
        })
}
