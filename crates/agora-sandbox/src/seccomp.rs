use crate::error::{Result, SandboxError};
use serde_json::json;
use std::fs;
use std::path::Path;

/// Syscalls denied to every sandboxed payload, on top of the runtime's
/// default filter. Covers mount manipulation, tracing, kernel/module
/// loading, clock manipulation, namespace escapes, and the BPF/userfaultfd
/// attack surface.
pub const DENIED_SYSCALLS: [&str; 17] = [
    "mount",
    "umount2",
    "ptrace",
    "kexec_load",
    "kexec_file_load",
    "reboot",
    "init_module",
    "finit_module",
    "delete_module",
    "clock_settime",
    "clock_settime64",
    "settimeofday",
    "pivot_root",
    "bpf",
    "userfaultfd",
    "unshare",
    "setns",
];

/// Render the deny-list as a Docker seccomp profile: default-allow with an
/// explicit errno-returning deny action for each listed syscall.
pub fn profile_json() -> serde_json::Value {
    json!({
        "defaultAction": "SCMP_ACT_ALLOW",
        "architectures": [
            "SCMP_ARCH_X86_64",
            "SCMP_ARCH_AARCH64",
        ],
        "syscalls": [
            {
                "names": DENIED_SYSCALLS,
                "action": "SCMP_ACT_ERRNO",
                "errnoRet": 1
            }
        ]
    })
}

/// Write the profile next to the run directory. Failure here aborts the
/// launch: a run without the filter never starts.
pub fn write_profile(path: &Path) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&profile_json())
        .expect("static profile serializes");
    fs::write(path, rendered).map_err(|source| SandboxError::PolicyWrite {
        path: path.to_path_buf(),
        source,
    })
}
