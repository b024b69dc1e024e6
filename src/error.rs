use std::fmt;
use std::io;

/// Error taxonomy for registry operations. Component methods raise these;
/// the API boundary converts them into result data.
#[derive(Debug)]
pub enum VaultError {
    /// Malformed or disallowed test definition.
    Validation(String),
    /// `testLogic` matched a forbidden pattern.
    Security {
        pattern: &'static str,
        evidence: String,
    },
    /// System integrity check failed before a mutating operation.
    Integrity { violations: usize },
    /// Artifact filename collision: an id-generation bug or external
    /// tampering, never silently resolved.
    AlreadyExists { filename: String },
    /// Referenced test id absent from the manifest.
    NotFound { id: String },
    /// Manifest entry exists but its backing file is gone.
    Missing { id: String, filename: String },
    /// Checksum mismatch between manifest record and on-disk content.
    TamperingDetected {
        id: String,
        expected: String,
        actual: String,
    },
    /// Persisted state failed to parse.
    Malformed(String),
    Io(io::Error),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::Validation(msg) => write!(f, "validation error: {msg}"),
            VaultError::Security { pattern, evidence } => write!(
                f,
                "security error: dangerous pattern detected ({pattern}): {evidence}"
            ),
            VaultError::Integrity { violations } => write!(
                f,
                "integrity error: system integrity check failed with {violations} violation(s)"
            ),
            VaultError::AlreadyExists { filename } => {
                write!(f, "test file already exists: {filename}")
            }
            VaultError::NotFound { id } => write!(f, "test case not found: {id}"),
            VaultError::Missing { id, filename } => {
                write!(f, "test file missing for {id}: {filename}")
            }
            VaultError::TamperingDetected { id, .. } => {
                write!(f, "test case tampering detected: {id}")
            }
            VaultError::Malformed(msg) => write!(f, "malformed data: {msg}"),
            VaultError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VaultError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VaultError {
    fn from(e: io::Error) -> Self {
        VaultError::Io(e)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Malformed(e.to_string())
    }
}
