use crate::error::{Result, SandboxError};
use crate::seccomp;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

/// Exit code recorded when the host watchdog killed the container.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Docker CLI statuses that mean the container never ran the payload:
/// daemon error, not executable, not found.
const LAUNCH_FAILURE_CODES: [i32; 3] = [125, 126, 127];

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Host-enforced resource limits for one run.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    pub wall_timeout: Duration,
    pub memory_limit_bytes: u64,
    pub cpu_cores: f64,
    pub process_limit: u32,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_timeout: Duration::from_secs(900),
            memory_limit_bytes: 8 * 1024 * 1024 * 1024,
            cpu_cores: 2.0,
            process_limit: 256,
        }
    }
}

/// Outcome of a run that was actually launched. Launch failures surface as
/// `SandboxError::LaunchFailed` instead.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exit_code: i32,
    pub wall_seconds: f64,
    pub timed_out: bool,
    /// Last bytes of combined stdout/stderr. Diagnostics only, never scored.
    pub tail_log: String,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Execution seam for the orchestrator; the engine's integration tests drive
/// a stub implementation, production wires `DockerSandbox`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(
        &self,
        image_tag: &str,
        input_dir: &Path,
        output_dir: &Path,
        limits: &SandboxLimits,
    ) -> Result<RunReport>;
}

/// Runs images under `docker run` with the full isolation policy applied.
pub struct DockerSandbox {
    docker_bin: String,
    scratch_size_mb: u64,
    log_tail_bytes: usize,
}

impl Default for DockerSandbox {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            scratch_size_mb: 256,
            log_tail_bytes: 16 * 1024,
        }
    }
}

impl DockerSandbox {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            ..Self::default()
        }
    }

    fn container_name() -> String {
        let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("agora-run-{}-{}", std::process::id(), seq)
    }

    fn tail_of(&self, stdout: &[u8], stderr: &[u8]) -> String {
        let mut combined = Vec::with_capacity(stdout.len() + stderr.len());
        combined.extend_from_slice(stdout);
        combined.extend_from_slice(stderr);
        let start = combined.len().saturating_sub(self.log_tail_bytes);
        String::from_utf8_lossy(&combined[start..]).into_owned()
    }

    async fn force_remove(&self, name: &str) {
        // Kill then reap. Both are best-effort: the container may already
        // be gone.
        let _ = Command::new(&self.docker_bin)
            .args(["kill", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        let _ = Command::new(&self.docker_bin)
            .args(["rm", "-f", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn run(
        &self,
        image_tag: &str,
        input_dir: &Path,
        output_dir: &Path,
        limits: &SandboxLimits,
    ) -> Result<RunReport> {
        if !input_dir.is_dir() {
            return Err(SandboxError::InputMissing(input_dir.to_path_buf()));
        }
        if !output_dir.is_dir() {
            return Err(SandboxError::OutputMissing(output_dir.to_path_buf()));
        }

        // The filter file lives beside the run directories; if it cannot be
        // written the run never starts.
        let profile_path = output_dir
            .parent()
            .unwrap_or(output_dir)
            .join("seccomp.json");
        seccomp::write_profile(&profile_path)?;

        let name = Self::container_name();
        let mut cmd = Command::new(&self.docker_bin);
        cmd.arg("run")
            .arg("--name")
            .arg(&name)
            // No network reachability of any kind.
            .arg("--network")
            .arg("none")
            // Read-only rootfs; only the two bind mounts and a bounded
            // scratch region are writable.
            .arg("--read-only")
            .arg("--tmpfs")
            .arg(format!("/tmp:rw,noexec,nosuid,size={}m", self.scratch_size_mb))
            .arg("--cap-drop")
            .arg("ALL")
            .arg("--security-opt")
            .arg("no-new-privileges")
            .arg("--security-opt")
            .arg(format!("seccomp={}", profile_path.display()))
            .arg("--pids-limit")
            .arg(limits.process_limit.to_string())
            .arg("--memory")
            .arg(format!("{}b", limits.memory_limit_bytes))
            // Same value for swap: no swap headroom beyond the cap.
            .arg("--memory-swap")
            .arg(format!("{}b", limits.memory_limit_bytes))
            .arg("--cpus")
            .arg(limits.cpu_cores.to_string())
            .arg("-v")
            .arg(format!("{}:/data/input:ro", input_dir.display()))
            .arg("-v")
            .arg(format!("{}:/data/output:rw", output_dir.display()))
            .arg(image_tag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| SandboxError::LaunchFailed(format!("spawn {}: {}", self.docker_bin, e)))?;

        let outcome = timeout(limits.wall_timeout, child.wait_with_output()).await;
        let wall_seconds = started.elapsed().as_secs_f64();

        match outcome {
            Err(_) => {
                // Watchdog fired: kill, reap, report the sentinel.
                warn!(
                    container = %name,
                    image = image_tag,
                    wall_seconds,
                    "⏱️ sandbox timeout, killing container"
                );
                self.force_remove(&name).await;
                Ok(RunReport {
                    exit_code: TIMEOUT_EXIT_CODE,
                    wall_seconds,
                    timed_out: true,
                    tail_log: String::new(),
                })
            }
            Ok(Err(e)) => {
                self.force_remove(&name).await;
                Err(SandboxError::LaunchFailed(format!(
                    "container wait failed: {}",
                    e
                )))
            }
            Ok(Ok(output)) => {
                self.force_remove(&name).await;
                let exit_code = output.status.code().unwrap_or(TIMEOUT_EXIT_CODE);
                let tail_log = self.tail_of(&output.stdout, &output.stderr);

                if LAUNCH_FAILURE_CODES.contains(&exit_code) {
                    return Err(SandboxError::LaunchFailed(format!(
                        "docker run exited {}: {}",
                        exit_code,
                        tail_log.trim()
                    )));
                }

                info!(
                    container = %name,
                    image = image_tag,
                    exit_code,
                    wall_seconds,
                    "📦 sandbox run finished"
                );
                Ok(RunReport {
                    exit_code,
                    wall_seconds,
                    timed_out: false,
                    tail_log,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names_unique() {
        let a = DockerSandbox::container_name();
        let b = DockerSandbox::container_name();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tail_truncates_to_last_bytes() {
        let sandbox = DockerSandbox {
            log_tail_bytes: 8,
            ..Default::default()
        };
        let tail = sandbox.tail_of(b"0123456789", b"abcdef");
        assert_eq!(tail, "89abcdef");

        let short = sandbox.tail_of(b"hi", b"");
        assert_eq!(short, "hi");
    }

    #[test]
    fn test_run_report_success_predicate() {
        let ok = RunReport {
            exit_code: 0,
            wall_seconds: 1.0,
            timed_out: false,
            tail_log: String::new(),
        };
        assert!(ok.succeeded());

        let timed_out = RunReport {
            exit_code: TIMEOUT_EXIT_CODE,
            wall_seconds: 900.0,
            timed_out: true,
            tail_log: String::new(),
        };
        assert!(!timed_out.succeeded());

        let crashed = RunReport {
            exit_code: 2,
            wall_seconds: 1.0,
            timed_out: false,
            tail_log: String::new(),
        };
        assert!(!crashed.succeeded());
    }

    #[tokio::test]
    async fn test_missing_input_dir_is_launch_precondition() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("output");
        std::fs::create_dir_all(&output).unwrap();

        let sandbox = DockerSandbox::default();
        let err = sandbox
            .run(
                "agora-analyzer:test",
                &tmp.path().join("missing"),
                &output,
                &SandboxLimits::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::InputMissing(_)));
    }
}
