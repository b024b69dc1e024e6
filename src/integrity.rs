use crate::canonical::sha256_file;
use crate::config::Paths;
use crate::types::{
    IntegrityRecord, IntegrityReport, IntegrityStatus, IntegrityViolation, Severity, ViolationKind,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Detects modification or deletion of files under a protected tree by
/// comparing against a persisted digest baseline.
pub struct IntegrityChecker {
    hashes_file: PathBuf,
    protected_root: PathBuf,
}

impl IntegrityChecker {
    /// Checker over the default protected tree (`core/` under the state
    /// root).
    pub fn new(paths: &Paths) -> Self {
        Self::with_protected_root(paths, paths.protected_dir())
    }

    /// Checker over an operator-chosen protected tree.
    pub fn with_protected_root(paths: &Paths, protected_root: PathBuf) -> Self {
        IntegrityChecker {
            hashes_file: paths.hashes_file(),
            protected_root,
        }
    }

    pub fn protected_root(&self) -> &std::path::Path {
        &self.protected_root
    }

    /// Establish trust: digest every file under the protected root and
    /// persist the baseline, replacing any prior one. This is a deliberate
    /// operator action (install time), never run automatically.
    pub fn generate_initial_hashes(&self) -> io::Result<BTreeMap<String, IntegrityRecord>> {
        if !self.protected_root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "protected root not found: {}",
                    self.protected_root.display()
                ),
            ));
        }

        let mut records = BTreeMap::new();
        for entry in WalkDir::new(&self.protected_root).min_depth(1) {
            let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.protected_root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            let key = relative.to_string_lossy().replace('\\', "/");
            let hash = sha256_file(entry.path())?;
            records.insert(
                key,
                IntegrityRecord {
                    hash,
                    timestamp: Utc::now(),
                    protected: true,
                },
            );
        }

        if let Some(parent) = self.hashes_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.hashes_file, serde_json::to_string_pretty(&records)?)?;
        Ok(records)
    }

    /// Recompute every protected file's digest and compare against the
    /// baseline. Missing files and digest mismatches are critical
    /// violations; both set `Compromised`. An absent baseline is an empty
    /// map: zero checked files, trivially verified. Callers needing
    /// failure-closed behavior must check `checked_files > 0` themselves.
    /// Only I/O or parse failures produce `Error`. Idempotent.
    pub fn verify_system_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport {
            timestamp: Utc::now(),
            status: IntegrityStatus::Verified,
            checked_files: 0,
            violations: Vec::new(),
            error: None,
        };

        match self.run_checks() {
            Ok((checked, violations)) => {
                report.checked_files = checked;
                if !violations.is_empty() {
                    report.status = IntegrityStatus::Compromised;
                    report_violations(&violations);
                }
                report.violations = violations;
            }
            Err(e) => {
                report.status = IntegrityStatus::Error;
                report.error = Some(e.to_string());
            }
        }

        report
    }

    fn run_checks(&self) -> io::Result<(u64, Vec<IntegrityViolation>)> {
        let records = self.load_records()?;
        let mut checked = 0u64;
        let mut violations = Vec::new();

        for (relative, record) in &records {
            if !record.protected {
                continue;
            }
            let full = self.protected_root.join(relative);
            if !full.exists() {
                violations.push(IntegrityViolation {
                    file: relative.clone(),
                    kind: ViolationKind::Missing,
                    expected: Some(record.hash.clone()),
                    actual: None,
                    severity: Severity::Critical,
                });
                continue;
            }
            let actual = sha256_file(&full)?;
            if actual != record.hash {
                violations.push(IntegrityViolation {
                    file: relative.clone(),
                    kind: ViolationKind::Modified,
                    expected: Some(record.hash.clone()),
                    actual: Some(actual),
                    severity: Severity::Critical,
                });
            }
            checked += 1;
        }

        Ok((checked, violations))
    }

    /// Baseline record count without a verification pass.
    pub fn baseline_len(&self) -> io::Result<usize> {
        Ok(self.load_records()?.len())
    }

    fn load_records(&self) -> io::Result<BTreeMap<String, IntegrityRecord>> {
        if !self.hashes_file.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.hashes_file)?;
        serde_json::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad integrity manifest: {e}"),
            )
        })
    }
}

fn report_violations(violations: &[IntegrityViolation]) {
    eprintln!("integrity: {} protected file(s) violated", violations.len());
    for v in violations {
        match v.kind {
            ViolationKind::Missing => eprintln!("  {}: missing", v.file),
            ViolationKind::Modified => eprintln!(
                "  {}: modified (recorded {}, found {})",
                v.file,
                short_hash(v.expected.as_deref()),
                short_hash(v.actual.as_deref()),
            ),
        }
    }
}

fn short_hash(hash: Option<&str>) -> &str {
    let h = hash.unwrap_or("?");
    &h[..h.len().min(16)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Paths) {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::at(tmp.path());
        paths.ensure_dirs().unwrap();
        (tmp, paths)
    }

    #[test]
    fn test_absent_baseline_is_trivially_verified() {
        let (_tmp, paths) = setup();
        let checker = IntegrityChecker::new(&paths);
        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Verified);
        assert_eq!(report.checked_files, 0);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_baseline_then_verify_clean() {
        let (_tmp, paths) = setup();
        fs::write(paths.protected_dir().join("a.bin"), b"alpha").unwrap();
        fs::create_dir_all(paths.protected_dir().join("sub")).unwrap();
        fs::write(paths.protected_dir().join("sub/b.bin"), b"beta").unwrap();

        let checker = IntegrityChecker::new(&paths);
        let records = checker.generate_initial_hashes().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key("sub/b.bin"));

        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Verified);
        assert_eq!(report.checked_files, 2);
    }

    #[test]
    fn test_modified_file_is_compromised() {
        let (_tmp, paths) = setup();
        let target = paths.protected_dir().join("a.bin");
        fs::write(&target, b"alpha").unwrap();

        let checker = IntegrityChecker::new(&paths);
        checker.generate_initial_hashes().unwrap();

        fs::write(&target, b"tampered").unwrap();
        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Compromised);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::Modified);
        assert_eq!(report.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn test_missing_file_is_compromised() {
        let (_tmp, paths) = setup();
        let target = paths.protected_dir().join("a.bin");
        fs::write(&target, b"alpha").unwrap();

        let checker = IntegrityChecker::new(&paths);
        checker.generate_initial_hashes().unwrap();

        fs::remove_file(&target).unwrap();
        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Compromised);
        assert_eq!(report.violations[0].kind, ViolationKind::Missing);
        // Missing files are not hash-checked
        assert_eq!(report.checked_files, 0);
    }

    #[test]
    fn test_verify_is_idempotent() {
        let (_tmp, paths) = setup();
        fs::write(paths.protected_dir().join("a.bin"), b"alpha").unwrap();
        let checker = IntegrityChecker::new(&paths);
        checker.generate_initial_hashes().unwrap();

        let first = checker.verify_system_integrity();
        let second = checker.verify_system_integrity();
        assert_eq!(first.status, second.status);
        assert_eq!(first.checked_files, second.checked_files);
        assert_eq!(first.violations.len(), second.violations.len());
    }

    #[test]
    fn test_reinitialization_replaces_baseline() {
        let (_tmp, paths) = setup();
        let target = paths.protected_dir().join("a.bin");
        fs::write(&target, b"alpha").unwrap();

        let checker = IntegrityChecker::new(&paths);
        checker.generate_initial_hashes().unwrap();

        fs::write(&target, b"new contents").unwrap();
        checker.generate_initial_hashes().unwrap();

        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Verified);
    }

    #[test]
    fn test_corrupt_baseline_is_error_status() {
        let (_tmp, paths) = setup();
        fs::write(paths.hashes_file(), b"{not json").unwrap();
        let checker = IntegrityChecker::new(&paths);
        let report = checker.verify_system_integrity();
        assert_eq!(report.status, IntegrityStatus::Error);
        assert!(report.error.is_some());
    }
}
