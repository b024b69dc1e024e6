use std::io;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the state root.
pub const ROOT_ENV: &str = "TESTVAULT_ROOT";

/// On-disk layout of a testvault state directory. Constructed once and
/// passed to the services that need it; nothing in this crate reads paths
/// from module-global state.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve the state root: `TESTVAULT_ROOT` if set, otherwise
    /// `.testvault` under the current working directory.
    pub fn resolve() -> Self {
        match std::env::var(ROOT_ENV) {
            Ok(dir) => Paths {
                root: PathBuf::from(dir),
            },
            Err(_) => Paths {
                root: PathBuf::from(".testvault"),
            },
        }
    }

    /// Use an explicit root, bypassing environment resolution.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Paths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registry manifest document.
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join("tests").join(".manifest.json")
    }

    /// Directory holding the write-once test-case artifacts.
    pub fn custom_tests_dir(&self) -> PathBuf {
        self.root.join("tests").join("custom")
    }

    /// Integrity baseline manifest.
    pub fn hashes_file(&self) -> PathBuf {
        self.root.join(".integrity").join("hashes.json")
    }

    /// Default protected tree covered by the integrity baseline.
    pub fn protected_dir(&self) -> PathBuf {
        self.root.join("core")
    }

    /// Date-partitioned audit logs.
    pub fn audit_log_dir(&self) -> PathBuf {
        self.root.join("logs").join("audit")
    }

    /// Whole-file checksum manifest for the audit logs.
    pub fn checksum_manifest_file(&self) -> PathBuf {
        self.root.join("logs").join("checksums").join("manifest.json")
    }

    /// Append-only alert records for critical audit actions.
    pub fn alerts_file(&self) -> PathBuf {
        self.root.join("logs").join("alerts.jsonl")
    }

    /// Create the full state directory tree.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            self.root.join("tests"),
            self.custom_tests_dir(),
            self.root.join(".integrity"),
            self.protected_dir(),
            self.audit_log_dir(),
            self.root.join("logs").join("checksums"),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
