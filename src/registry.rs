use crate::audit::AuditLogger;
use crate::canonical::sha256_hex;
use crate::config::Paths;
use crate::error::VaultError;
use crate::types::{
    AuditAction, Manifest, ManifestStats, TestCaseEntry, TestDefinition, TestFilter, TestStatus,
    VerifyFailure, VerifySummary,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use uuid::Uuid;

const MANIFEST_VERSION: &str = "1.0";

/// Format marker embedded in every generated artifact.
const ARTIFACT_SCHEMA: &str = "testvault/1";

/// System of record for test cases: write-once artifacts plus an
/// append-only manifest. One registry instance per process; mutating
/// methods take `&mut self`, so the type system serializes writers.
pub struct TestRegistry {
    manifest_path: PathBuf,
    custom_dir: PathBuf,
    manifest: Manifest,
}

impl TestRegistry {
    /// Load the manifest, creating an empty one on first run.
    pub fn open(paths: &Paths) -> io::Result<Self> {
        let manifest_path = paths.manifest_file();
        let manifest = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            serde_json::from_str(&content).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("bad manifest: {e}"))
            })?
        } else {
            Manifest {
                version: MANIFEST_VERSION.to_string(),
                created: Utc::now(),
                tests: Vec::new(),
                stats: ManifestStats {
                    total_added: 0,
                    last_modified: None,
                },
            }
        };

        let registry = TestRegistry {
            manifest_path,
            custom_dir: paths.custom_tests_dir(),
            manifest,
        };
        if !registry.manifest_path.exists() {
            registry.save_manifest()?;
        }
        Ok(registry)
    }

    fn save_manifest(&self) -> io::Result<()> {
        if let Some(parent) = self.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &self.manifest_path,
            serde_json::to_string_pretty(&self.manifest)?,
        )
    }

    /// Register a new test case: fresh id, write-once artifact, manifest
    /// entry, `TEST_ADDED` audit event. A filename collision is a hard
    /// error — an existing artifact is never rewritten.
    pub fn add_test_case(
        &mut self,
        definition: &TestDefinition,
        logger: &AuditLogger,
    ) -> Result<TestCaseEntry, VaultError> {
        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let filename = format!("test-{id}-{}.json", now.timestamp_millis());
        let filepath = self.custom_dir.join(&filename);

        let artifact = render_artifact(&id, definition, now)?;
        let checksum = sha256_hex(artifact.as_bytes());

        fs::create_dir_all(&self.custom_dir).map_err(VaultError::Io)?;
        write_once(&filepath, artifact.as_bytes(), &filename)?;

        let entry = TestCaseEntry {
            id: id.clone(),
            filename: filename.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            checksum: checksum.clone(),
            timestamp: now,
            author: definition
                .author
                .clone()
                .unwrap_or_else(|| "system".to_string()),
            status: TestStatus::Active,
            locked: true,
            version: 1,
            tags: definition.tags.clone(),
        };

        self.manifest.tests.push(entry.clone());
        self.manifest.stats.total_added += 1;
        self.manifest.stats.last_modified = Some(now);
        self.save_manifest()?;

        logger.log(
            AuditAction::TestAdded,
            json!({ "id": id, "filename": filename, "checksum": checksum }),
        )?;

        Ok(entry)
    }

    /// Verify one test case against its recorded checksum. Emits
    /// `TEST_MISSING` / `TAMPERING_DETECTED` audit events on the
    /// corresponding failures.
    pub fn verify_test_case(&self, id: &str, logger: &AuditLogger) -> Result<(), VaultError> {
        let entry = self
            .manifest
            .tests
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| VaultError::NotFound { id: id.to_string() })?;

        let filepath = self.custom_dir.join(&entry.filename);
        if !filepath.exists() {
            logger.log(
                AuditAction::TestMissing,
                json!({ "id": id, "filename": entry.filename }),
            )?;
            return Err(VaultError::Missing {
                id: id.to_string(),
                filename: entry.filename.clone(),
            });
        }

        let content = fs::read(&filepath)?;
        let actual = sha256_hex(&content);
        if actual != entry.checksum {
            logger.log(
                AuditAction::TamperingDetected,
                json!({ "id": id, "expected": entry.checksum, "actual": actual }),
            )?;
            return Err(VaultError::TamperingDetected {
                id: id.to_string(),
                expected: entry.checksum.clone(),
                actual,
            });
        }

        Ok(())
    }

    /// Full-registry health check. Never fails; every per-test error is
    /// aggregated into the report.
    pub fn verify_all_tests(&self, logger: &AuditLogger) -> VerifySummary {
        let mut summary = VerifySummary {
            total: self.manifest.tests.len() as u64,
            verified: 0,
            failed: Vec::new(),
        };

        for test in &self.manifest.tests {
            match self.verify_test_case(&test.id, logger) {
                Ok(()) => summary.verified += 1,
                Err(e) => summary.failed.push(VerifyFailure {
                    id: test.id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        summary
    }

    /// Read-only projection over the manifest. Returned entries are
    /// copies; mutating them cannot touch registry state.
    pub fn list_tests(&self, filter: &TestFilter) -> Vec<TestCaseEntry> {
        self.manifest
            .tests
            .iter()
            .filter(|t| match filter.status {
                Some(status) => t.status == status,
                None => true,
            })
            .filter(|t| {
                filter.tags.is_empty() || filter.tags.iter().any(|tag| t.tags.contains(tag))
            })
            .filter(|t| match filter.after {
                Some(after) => t.timestamp > after,
                None => true,
            })
            .cloned()
            .collect()
    }

    /// The single lifecycle mutation: flip a test between active and
    /// inactive. No physical deletion exists in this registry's contract.
    pub fn set_status(
        &mut self,
        id: &str,
        status: TestStatus,
        logger: &AuditLogger,
    ) -> Result<(), VaultError> {
        let entry = self
            .manifest
            .tests
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| VaultError::NotFound { id: id.to_string() })?;
        entry.status = status;
        self.manifest.stats.last_modified = Some(Utc::now());
        self.save_manifest()?;
        logger.log(
            AuditAction::TestStatusChanged,
            json!({ "id": id, "status": status }),
        )?;
        Ok(())
    }

    pub fn test_count(&self) -> usize {
        self.manifest.tests.len()
    }

    pub fn stats(&self) -> &ManifestStats {
        &self.manifest.stats
    }
}

/// Create the artifact file, refusing to touch an existing one. A
/// collision means an id-generation bug or external tampering and is a
/// hard error, never an overwrite.
fn write_once(filepath: &std::path::Path, bytes: &[u8], filename: &str) -> Result<(), VaultError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(filepath)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                VaultError::AlreadyExists {
                    filename: filename.to_string(),
                }
            } else {
                VaultError::Io(e)
            }
        })?;
    file.write_all(bytes).map_err(VaultError::Io)?;
    drop(file);

    // Read-only permission bits are best-effort hardening; the real
    // immutability guarantee is the recorded checksum.
    if let Ok(metadata) = fs::metadata(filepath) {
        let mut perms = metadata.permissions();
        perms.set_readonly(true);
        let _ = fs::set_permissions(filepath, perms);
    }
    Ok(())
}

/// Render the stored artifact: a declarative JSON document. The test
/// logic is opaque text for a downstream interpreter — it is never
/// evaluated here.
fn render_artifact(
    id: &str,
    definition: &TestDefinition,
    created: DateTime<Utc>,
) -> Result<String, VaultError> {
    let doc = json!({
        "schema": ARTIFACT_SCHEMA,
        "id": id,
        "name": definition.name,
        "description": definition.description,
        "type": definition.kind.as_deref().unwrap_or("custom"),
        "created": created.to_rfc3339(),
        "config": definition.config.clone().unwrap_or_else(|| json!({})),
        "testLogic": definition.test_logic,
        "tags": definition.tags,
        "author": definition.author.as_deref().unwrap_or("system"),
    });
    let mut rendered = serde_json::to_string_pretty(&doc)?;
    rendered.push('\n');
    Ok(rendered)
}
