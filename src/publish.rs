//! Publishing updated catalogs.
//!
//! After a pass that changed at least one catalog the orchestrator hands a
//! one-line summary to a [`Publisher`]. The production publisher commits the
//! project with git and pushes, which is what deploys the website.
//!
//! Git steps run in order and stop at the first failure:
//!
//! 1. `git add .`
//! 2. `git diff --cached --quiet` (skip the commit when nothing is staged,
//!    which is the case when re-pushing a commit whose push failed earlier)
//! 3. `git commit -m "<prefix>: <summary>"`
//! 4. `git push [<remote> [<branch>]]`
//!
//! Every step is bounded by a timeout. A failed publish never touches the
//! catalogs already written.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("cannot run git {step}: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("git {step} failed ({status}): {stderr}")]
    Failed {
        step: &'static str,
        status: String,
        stderr: String,
    },
    #[error("git {step} timed out after {secs}s")]
    Timeout { step: &'static str, secs: u64 },
}

/// Acknowledgement of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// The commit message used, or that would have been used.
    pub message: String,
    /// Whether a new commit was created.
    pub committed: bool,
}

/// Publishes the project after catalogs changed.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, summary: &str) -> Result<Ack, PublishError>;
}

/// Acknowledges without doing anything (publishing disabled, dry runs).
#[derive(Debug, Default, Clone)]
pub struct NoopPublisher {
    pub message_prefix: String,
}

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, summary: &str) -> Result<Ack, PublishError> {
        let message = commit_message(&self.message_prefix, summary);
        debug!(%message, "publishing disabled, skipping");
        Ok(Ack {
            message,
            committed: false,
        })
    }
}

/// Commits and pushes the project repository with the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    pub repo_root: PathBuf,
    pub message_prefix: String,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub timeout: Duration,
}

impl GitPublisher {
    pub fn new(repo_root: PathBuf, message_prefix: impl Into<String>) -> Self {
        Self {
            repo_root,
            message_prefix: message_prefix.into(),
            remote: None,
            branch: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Arguments for `git push`. A branch without a remote pushes to `origin`.
    fn push_args(&self) -> Vec<&str> {
        let mut args = vec!["push"];
        match (&self.remote, &self.branch) {
            (Some(remote), Some(branch)) => args.extend([remote.as_str(), branch.as_str()]),
            (Some(remote), None) => args.push(remote.as_str()),
            (None, Some(branch)) => args.extend(["origin", branch.as_str()]),
            (None, None) => {}
        }
        args
    }

    async fn git(&self, step: &'static str, args: &[&str]) -> Result<Output, PublishError> {
        debug!(step, ?args, "running git");
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, child).await {
            Err(_) => Err(PublishError::Timeout {
                step,
                secs: self.timeout.as_secs(),
            }),
            Ok(Err(source)) => Err(PublishError::Spawn { step, source }),
            Ok(Ok(output)) => Ok(output),
        }
    }

    async fn git_ok(&self, step: &'static str, args: &[&str]) -> Result<Output, PublishError> {
        let output = self.git(step, args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(failed(step, &output))
        }
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, summary: &str) -> Result<Ack, PublishError> {
        let message = commit_message(&self.message_prefix, summary);

        self.git_ok("add", &["add", "."]).await?;

        // Exit status 1 means there are staged changes.
        let diff = self.git("diff", &["diff", "--cached", "--quiet"]).await?;
        let committed = match diff.status.code() {
            Some(0) => {
                info!("nothing new to commit, pushing existing commits");
                false
            }
            Some(1) => {
                self.git_ok("commit", &["commit", "-m", message.as_str()]).await?;
                true
            }
            _ => return Err(failed("diff", &diff)),
        };

        self.git_ok("push", &self.push_args()).await?;
        info!(%message, committed, "published");
        Ok(Ack { message, committed })
    }
}

/// `<prefix>: <summary>`, or just the summary when the prefix is empty.
pub fn commit_message(prefix: &str, summary: &str) -> String {
    if prefix.is_empty() {
        summary.to_string()
    } else {
        format!("{prefix}: {summary}")
    }
}

fn failed(step: &'static str, output: &Output) -> PublishError {
    PublishError::Failed {
        step,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
