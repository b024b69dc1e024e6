use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered test case. Flipping between the two
/// variants is the only mutation a registered entry ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Active => write!(f, "active"),
            TestStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// One registered test case. `filename` and `checksum` are fixed at
/// creation; `version` stays 1 because a new version is a new entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseEntry {
    pub id: String,
    pub filename: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub status: TestStatus,
    pub locked: bool,
    pub version: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Registry manifest: the system of record for all registered tests.
/// Mutated only by appending to `tests` and bumping `stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created: DateTime<Utc>,
    pub tests: Vec<TestCaseEntry>,
    pub stats: ManifestStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStats {
    pub total_added: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A test-case submission. Field names mirror the JSON wire form; any
/// top-level key outside this set is rejected before deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_logic: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Read-only filter for listing registered tests.
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    pub status: Option<TestStatus>,
    /// Any-match: an entry passes if it carries at least one of these.
    pub tags: Vec<String>,
    /// Strictly-after cutoff.
    pub after: Option<DateTime<Utc>>,
}

/// Per protected file: the recorded digest from trust establishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub protected: bool,
}

/// Severity scale shared by integrity violations and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Overall outcome of an integrity verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityStatus {
    Verified,
    Compromised,
    Error,
}

/// One protected-file violation found during verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityViolation {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Missing,
    Modified,
}

/// Structured result of `verify_system_integrity`. Ordinary mismatches
/// land in `violations`; only I/O and parse failures set `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub timestamp: DateTime<Utc>,
    pub status: IntegrityStatus,
    pub checked_files: u64,
    pub violations: Vec<IntegrityViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Audit action kinds. The serialized form is the wire/log name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    TestAdded,
    TestAddSuccess,
    TestAddFailed,
    TestMissing,
    TestStatusChanged,
    TamperingDetected,
    IntegrityCheck,
    IntegrityViolation,
    VerifyAllTests,
    UnauthorizedAccess,
    SystemCompromise,
}

impl AuditAction {
    /// Critical actions trigger an immediate alert side effect on top of
    /// the ordinary log append.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            AuditAction::TamperingDetected
                | AuditAction::IntegrityViolation
                | AuditAction::UnauthorizedAccess
                | AuditAction::SystemCompromise
        )
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditAction::TestAdded => "TEST_ADDED",
            AuditAction::TestAddSuccess => "TEST_ADD_SUCCESS",
            AuditAction::TestAddFailed => "TEST_ADD_FAILED",
            AuditAction::TestMissing => "TEST_MISSING",
            AuditAction::TestStatusChanged => "TEST_STATUS_CHANGED",
            AuditAction::TamperingDetected => "TAMPERING_DETECTED",
            AuditAction::IntegrityCheck => "INTEGRITY_CHECK",
            AuditAction::IntegrityViolation => "INTEGRITY_VIOLATION",
            AuditAction::VerifyAllTests => "VERIFY_ALL_TESTS",
            AuditAction::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            AuditAction::SystemCompromise => "SYSTEM_COMPROMISE",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEST_ADDED" => Ok(AuditAction::TestAdded),
            "TEST_ADD_SUCCESS" => Ok(AuditAction::TestAddSuccess),
            "TEST_ADD_FAILED" => Ok(AuditAction::TestAddFailed),
            "TEST_MISSING" => Ok(AuditAction::TestMissing),
            "TEST_STATUS_CHANGED" => Ok(AuditAction::TestStatusChanged),
            "TAMPERING_DETECTED" => Ok(AuditAction::TamperingDetected),
            "INTEGRITY_CHECK" => Ok(AuditAction::IntegrityCheck),
            "INTEGRITY_VIOLATION" => Ok(AuditAction::IntegrityViolation),
            "VERIFY_ALL_TESTS" => Ok(AuditAction::VerifyAllTests),
            "UNAUTHORIZED_ACCESS" => Ok(AuditAction::UnauthorizedAccess),
            "SYSTEM_COMPROMISE" => Ok(AuditAction::SystemCompromise),
            _ => Err(format!("unknown audit action: {s}")),
        }
    }
}

/// One audit log line. `checksum` covers the canonical JSON of the entry
/// with the checksum field removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub actor: String,
    pub process_id: u32,
    pub checksum: String,
}

/// Whole-file digest record for one audit log, kept in the checksum
/// manifest as secondary tamper evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChecksumRecord {
    pub checksum: String,
    pub last_modified: DateTime<Utc>,
    pub line_count: u64,
}

/// A single audit-log verification failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LogViolation {
    /// Per-entry self-checksum mismatch.
    Entry {
        line: u64,
        expected: String,
        actual: String,
    },
    /// Line did not parse as an audit entry.
    Malformed { line: u64, detail: String },
    /// Whole-file checksum disagrees with the checksum manifest.
    File { expected: String, actual: String },
    /// No log file exists for the requested date.
    FileMissing { file: String },
}

impl std::fmt::Display for LogViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogViolation::Entry {
                line,
                expected,
                actual,
            } => write!(
                f,
                "line {line}: entry checksum mismatch: recorded {expected}, recomputed {actual}"
            ),
            LogViolation::Malformed { line, detail } => {
                write!(f, "line {line}: malformed entry: {detail}")
            }
            LogViolation::File { expected, actual } => write!(
                f,
                "file checksum mismatch: recorded {expected}, recomputed {actual}"
            ),
            LogViolation::FileMissing { file } => write!(f, "log file missing: {file}"),
        }
    }
}

/// Result of verifying one day's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogVerification {
    pub date: String,
    pub verified: bool,
    pub total_entries: u64,
    pub violations: Vec<LogViolation>,
}

/// Aggregate result of verifying every registered test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySummary {
    pub total: u64,
    pub verified: u64,
    pub failed: Vec<VerifyFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyFailure {
    pub id: String,
    pub error: String,
}

/// Result of `TestApi::add_test`: failures are data, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddOutcome {
    pub fn failure(error: String) -> Self {
        AddOutcome {
            success: false,
            test_id: None,
            filename: None,
            error: Some(error),
        }
    }
}

/// Result of `TestApi::verify_test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub success: bool,
    pub test_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
