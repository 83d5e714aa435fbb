use crate::error::{Result, SubmissionError};
use crate::scanner::SourceScanner;
use agora_types::{ParticipantId, SubmissionId};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

/// Deterministic image tag for `(participant_id, commit_hash)`: rebuilding
/// the same claim always addresses the same image.
pub fn image_tag(participant: &ParticipantId, commit_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"agora:image");
    hasher.update(participant.as_str().as_bytes());
    hasher.update(commit_hash.as_bytes());
    let digest = hasher.finalize();
    format!("agora-analyzer:{}", &hex::encode(digest.as_bytes())[..16])
}

/// Build seam: turns a fetched claim into an addressable image tag. The
/// engine's tests stub this; production uses `GitDockerBuilder`.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(
        &self,
        submission_id: &SubmissionId,
        participant: &ParticipantId,
        repository_url: &str,
        commit_hash: &str,
    ) -> Result<String>;
}

/// Fetches the repository at the exact commit, scans the source tree, and
/// builds the image with `docker build`. This is the only networked
/// component in the engine.
pub struct GitDockerBuilder {
    work_root: PathBuf,
    docker_bin: String,
    git_bin: String,
    clone_timeout: Duration,
    build_timeout: Duration,
    scanner: SourceScanner,
}

impl GitDockerBuilder {
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
            docker_bin: "docker".to_string(),
            git_bin: "git".to_string(),
            clone_timeout: Duration::from_secs(120),
            build_timeout: Duration::from_secs(600),
            scanner: SourceScanner::new(),
        }
    }

    pub fn with_build_timeout(mut self, build_timeout: Duration) -> Self {
        self.build_timeout = build_timeout;
        self
    }

    async fn run_checked(
        mut cmd: Command,
        budget: Duration,
        failure: impl Fn(String) -> SubmissionError,
        timeout_error: SubmissionError,
    ) -> Result<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| failure(e.to_string()))?;
        let output = match timeout(budget, child.wait_with_output()).await {
            Err(_) => return Err(timeout_error),
            Ok(result) => result.map_err(|e| failure(e.to_string()))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.chars().rev().take(1000).collect::<Vec<_>>().into_iter().rev().collect();
            return Err(failure(tail));
        }
        Ok(())
    }

    /// Clone at depth 1 then pin to the exact commit. Shallow clones do not
    /// carry arbitrary history, so the checkout fetches the commit
    /// explicitly first.
    async fn fetch_at_commit(
        &self,
        workspace: &PathBuf,
        repository_url: &str,
        commit_hash: &str,
    ) -> Result<()> {
        if workspace.exists() {
            std::fs::remove_dir_all(workspace)?;
        }
        std::fs::create_dir_all(workspace)?;

        let dest = workspace.display().to_string();
        let mut clone = Command::new(&self.git_bin);
        clone.args(["clone", "--depth", "1", repository_url, dest.as_str()]);
        Self::run_checked(
            clone,
            self.clone_timeout,
            SubmissionError::CloneFailed,
            SubmissionError::CloneFailed("clone timed out".into()),
        )
        .await?;

        let mut fetch = Command::new(&self.git_bin);
        fetch
            .current_dir(workspace)
            .args(["fetch", "--depth", "1", "origin", commit_hash]);
        Self::run_checked(
            fetch,
            self.clone_timeout,
            SubmissionError::CheckoutFailed,
            SubmissionError::CheckoutFailed("fetch timed out".into()),
        )
        .await?;

        let mut checkout = Command::new(&self.git_bin);
        checkout
            .current_dir(workspace)
            .args(["checkout", commit_hash]);
        Self::run_checked(
            checkout,
            Duration::from_secs(30),
            SubmissionError::CheckoutFailed,
            SubmissionError::CheckoutFailed("checkout timed out".into()),
        )
        .await
    }
}

#[async_trait]
impl ImageBuilder for GitDockerBuilder {
    async fn build(
        &self,
        submission_id: &SubmissionId,
        participant: &ParticipantId,
        repository_url: &str,
        commit_hash: &str,
    ) -> Result<String> {
        let workspace = self.work_root.join(submission_id.to_hex());

        self.fetch_at_commit(&workspace, repository_url, commit_hash)
            .await?;
        info!(
            submission_id = %submission_id,
            commit = commit_hash,
            "repository fetched"
        );

        let violations = self.scanner.scan_workspace(&workspace);
        if let Some(first) = violations.first() {
            warn!(
                submission_id = %submission_id,
                category = first.category,
                signature = first.signature,
                total = violations.len(),
                "🚫 source scan rejected submission"
            );
            let reason = format!(
                "{} signature '{}' in {}",
                first.category,
                first.signature,
                first.file.display()
            );
            let _ = std::fs::remove_dir_all(&workspace);
            return Err(SubmissionError::ScanRejected(reason));
        }

        let tag = image_tag(participant, commit_hash);
        let mut build = Command::new(&self.docker_bin);
        build
            .current_dir(&workspace)
            .args(["build", "-t", tag.as_str(), "."]);
        let build_result = Self::run_checked(
            build,
            self.build_timeout,
            SubmissionError::BuildFailed,
            SubmissionError::BuildTimeout(self.build_timeout.as_secs()),
        )
        .await;

        // The workspace is only needed for the build.
        let _ = std::fs::remove_dir_all(&workspace);
        build_result?;

        info!(submission_id = %submission_id, tag = %tag, "🐳 image built");
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_tag_deterministic() {
        let alice = ParticipantId::new("alice");
        let commit = "a".repeat(40);
        assert_eq!(image_tag(&alice, &commit), image_tag(&alice, &commit));
    }

    #[test]
    fn test_image_tag_distinguishes_inputs() {
        let alice = ParticipantId::new("alice");
        let bob = ParticipantId::new("bob");
        let commit = "a".repeat(40);
        assert_ne!(image_tag(&alice, &commit), image_tag(&bob, &commit));
        assert_ne!(
            image_tag(&alice, &commit),
            image_tag(&alice, &"b".repeat(40))
        );
    }

    #[test]
    fn test_image_tag_shape() {
        let tag = image_tag(&ParticipantId::new("alice"), &"a".repeat(40));
        let (repo, version) = tag.split_once(':').unwrap();
        assert_eq!(repo, "agora-analyzer");
        assert_eq!(version.len(), 16);
        assert!(version.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
