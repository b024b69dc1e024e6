use crate::canonical::{canonical_json, sha256_hex};
use crate::config::Paths;
use crate::types::{
    AuditAction, AuditLogEntry, LogChecksumRecord, LogVerification, LogViolation, Severity,
};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only, self-checksummed audit log, partitioned by calendar day,
/// with a secondary whole-file checksum manifest.
pub struct AuditLogger {
    log_dir: PathBuf,
    checksum_manifest: PathBuf,
    alerts_file: PathBuf,
    actor: String,
}

impl AuditLogger {
    pub fn new(paths: &Paths) -> Self {
        AuditLogger {
            log_dir: paths.audit_log_dir(),
            checksum_manifest: paths.checksum_manifest_file(),
            alerts_file: paths.alerts_file(),
            actor: std::env::var("USER").unwrap_or_else(|_| "system".to_string()),
        }
    }

    /// Append one event. The entry's checksum covers its canonical JSON
    /// with the checksum field removed; after the append, the whole-file
    /// checksum record is rewritten. Failures propagate — an audit record
    /// that did not persist is itself a security-relevant event.
    pub fn log(&self, action: AuditAction, details: serde_json::Value) -> io::Result<AuditLogEntry> {
        let mut entry = AuditLogEntry {
            timestamp: Utc::now(),
            action,
            details,
            actor: self.actor.clone(),
            process_id: std::process::id(),
            checksum: String::new(),
        };
        entry.checksum = entry_checksum(&entry)?;

        self.append_entry(&entry)?;

        if action.is_critical() {
            self.emit_alert(&entry)?;
        }

        Ok(entry)
    }

    fn append_entry(&self, entry: &AuditLogEntry) -> io::Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let log_file = self.log_file_for(entry.timestamp.date_naive());
        let mut file = OpenOptions::new().create(true).append(true).open(&log_file)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        self.update_checksum_manifest(&log_file)
    }

    fn update_checksum_manifest(&self, log_file: &Path) -> io::Result<()> {
        let mut manifest = self.load_checksum_manifest()?;

        let content = fs::read_to_string(log_file)?;
        let name = log_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        manifest.insert(
            name,
            LogChecksumRecord {
                checksum: sha256_hex(content.as_bytes()),
                last_modified: Utc::now(),
                line_count: content.lines().filter(|l| !l.trim().is_empty()).count() as u64,
            },
        );

        if let Some(parent) = self.checksum_manifest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &self.checksum_manifest,
            serde_json::to_string_pretty(&manifest)?,
        )
    }

    fn load_checksum_manifest(&self) -> io::Result<BTreeMap<String, LogChecksumRecord>> {
        if !self.checksum_manifest.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.checksum_manifest)?;
        serde_json::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad checksum manifest: {e}"),
            )
        })
    }

    /// Verify one day's log (default: today): recompute each entry's
    /// self-checksum and the whole-file checksum against recorded values.
    pub fn verify_logs(&self, date: Option<NaiveDate>) -> io::Result<LogVerification> {
        let target = date.unwrap_or_else(|| Utc::now().date_naive());
        let date_str = target.format("%Y-%m-%d").to_string();
        let log_file = self.log_file_for(target);

        if !log_file.exists() {
            return Ok(LogVerification {
                date: date_str.clone(),
                verified: false,
                total_entries: 0,
                violations: vec![LogViolation::FileMissing {
                    file: format!("{date_str}.log"),
                }],
            });
        }

        let content = fs::read_to_string(&log_file)?;
        let mut violations = Vec::new();
        let mut total = 0u64;

        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            total += 1;
            let line_no = (i + 1) as u64;
            match serde_json::from_str::<AuditLogEntry>(line) {
                Ok(entry) => {
                    let recomputed = entry_checksum(&entry)?;
                    if recomputed != entry.checksum {
                        violations.push(LogViolation::Entry {
                            line: line_no,
                            expected: entry.checksum,
                            actual: recomputed,
                        });
                    }
                }
                Err(e) => violations.push(LogViolation::Malformed {
                    line: line_no,
                    detail: e.to_string(),
                }),
            }
        }

        let manifest = self.load_checksum_manifest()?;
        if let Some(record) = manifest.get(&format!("{date_str}.log")) {
            let actual = sha256_hex(content.as_bytes());
            if actual != record.checksum {
                violations.push(LogViolation::File {
                    expected: record.checksum.clone(),
                    actual,
                });
            }
        }

        Ok(LogVerification {
            date: date_str,
            verified: violations.is_empty(),
            total_entries: total,
            violations,
        })
    }

    /// Most recent entries from today's log, newest first. Lines that no
    /// longer parse are skipped; `verify_logs` is the tool that reports
    /// them.
    pub fn recent_logs(
        &self,
        count: usize,
        action: Option<AuditAction>,
    ) -> io::Result<Vec<AuditLogEntry>> {
        let log_file = self.log_file_for(Utc::now().date_naive());
        if !log_file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&log_file)?;
        let mut entries: Vec<AuditLogEntry> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        if let Some(wanted) = action {
            entries.retain(|e| e.action == wanted);
        }
        let skip = entries.len().saturating_sub(count);
        let mut recent: Vec<AuditLogEntry> = entries.into_iter().skip(skip).collect();
        recent.reverse();
        Ok(recent)
    }

    fn log_file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("{}.log", date.format("%Y-%m-%d")))
    }

    /// Critical actions get a distinct, explicit alert side effect: a
    /// structured record in the alerts file plus a stderr notice.
    fn emit_alert(&self, entry: &AuditLogEntry) -> io::Result<()> {
        eprintln!("ALERT: critical audit event: {}", entry.action);

        if let Some(parent) = self.alerts_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let alert = serde_json::json!({
            "timestamp": entry.timestamp,
            "severity": Severity::Critical,
            "action": entry.action,
            "details": entry.details,
        });
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.alerts_file)?;
        writeln!(file, "{}", serde_json::to_string(&alert)?)
    }
}

/// Digest of an entry with its `checksum` field removed.
pub fn entry_checksum(entry: &AuditLogEntry) -> io::Result<String> {
    let mut value = serde_json::to_value(entry)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("checksum");
    }
    Ok(sha256_hex(canonical_json(&value).as_bytes()))
}
