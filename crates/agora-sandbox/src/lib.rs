/*!
# Agora Sandbox

Isolated execution of untrusted submission images.

The sandbox policy is the security contract, not a best-effort configuration:
every run gets no network, a read-only root filesystem with exactly two bind
mounts (input ro, output rw) plus a bounded tmpfs scratch, all capabilities
dropped, no-new-privileges, a syscall deny-list, and hard pid/memory/cpu
limits enforced by the host. Any failure to apply the policy is a launch
failure — never a run result.

Wall time is measured externally; payload-supplied timings are untrusted.
*/

pub mod error;
pub mod runner;
pub mod seccomp;

pub use error::SandboxError;
pub use runner::{DockerSandbox, RunReport, Sandbox, SandboxLimits, TIMEOUT_EXIT_CODE};
