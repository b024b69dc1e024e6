use crate::audit::AuditLogger;
use crate::config::Paths;
use crate::error::VaultError;
use crate::integrity::IntegrityChecker;
use crate::registry::TestRegistry;
use crate::scan::scan_test_logic;
use crate::types::{
    AddOutcome, AuditAction, IntegrityReport, IntegrityStatus, TestCaseEntry, TestDefinition,
    TestFilter, VerifyOutcome, VerifySummary,
};
use serde_json::{json, Value};
use std::io;

/// Top-level keys a submission may carry; anything else is rejected.
const ALLOWED_FIELDS: &[&str] = &[
    "name",
    "description",
    "type",
    "config",
    "testLogic",
    "tags",
    "author",
];

/// Longest accepted test name.
const NAME_MAX: usize = 100;

/// The operation surface for callers (CLI or an automated agent).
/// Owns the registry, the integrity checker, and the audit logger;
/// converts every operational failure into result data, so callers
/// never need to catch errors for ordinary failure handling.
pub struct TestApi {
    registry: TestRegistry,
    checker: IntegrityChecker,
    logger: AuditLogger,
}

impl TestApi {
    /// Open the API over a state directory, wiring the three services
    /// together. This is the only construction path — no process-global
    /// instance exists.
    pub fn open(paths: &Paths) -> io::Result<Self> {
        Ok(TestApi {
            registry: TestRegistry::open(paths)?,
            checker: IntegrityChecker::new(paths),
            logger: AuditLogger::new(paths),
        })
    }

    /// Open with an integrity checker over a non-default protected tree.
    pub fn open_with_checker(paths: &Paths, checker: IntegrityChecker) -> io::Result<Self> {
        Ok(TestApi {
            registry: TestRegistry::open(paths)?,
            checker,
            logger: AuditLogger::new(paths),
        })
    }

    /// The full write path: integrity gate, shape validation, deny-list
    /// scan, registry add. Exactly one `TEST_ADD_SUCCESS` or
    /// `TEST_ADD_FAILED` audit entry records the outcome, whichever way
    /// the call goes.
    pub fn add_test(&mut self, definition: &Value) -> AddOutcome {
        match self.try_add(definition) {
            Ok(entry) => {
                if let Err(e) = self.logger.log(
                    AuditAction::TestAddSuccess,
                    json!({ "testId": entry.id, "name": entry.name }),
                ) {
                    // The artifact exists but its success record does not;
                    // surface that rather than claiming a clean add.
                    return AddOutcome::failure(format!(
                        "test {} was added but the audit record failed to persist: {e}",
                        entry.id
                    ));
                }
                AddOutcome {
                    success: true,
                    test_id: Some(entry.id),
                    filename: Some(entry.filename),
                    error: None,
                }
            }
            Err(err) => {
                let mut message = err.to_string();
                if let Err(log_err) = self.logger.log(
                    AuditAction::TestAddFailed,
                    json!({ "error": message, "definition": definition }),
                ) {
                    message = format!("{message} (audit record failed to persist: {log_err})");
                }
                AddOutcome::failure(message)
            }
        }
    }

    fn try_add(&mut self, definition: &Value) -> Result<TestCaseEntry, VaultError> {
        // 1. No mutation is attempted against a compromised deployment.
        let report = self.checker.verify_system_integrity();
        if report.status != IntegrityStatus::Verified {
            self.logger.log(
                AuditAction::IntegrityViolation,
                json!({
                    "status": report.status,
                    "violations": report.violations,
                    "error": report.error,
                }),
            )?;
            return Err(VaultError::Integrity {
                violations: report.violations.len(),
            });
        }

        // 2. Shape validation: allow-list, required name, typed fields.
        let parsed = validate_definition(definition)?;

        // 3. Deny-list scan over the submitted logic.
        if let Some(logic) = &parsed.test_logic {
            if let Some(finding) = scan_test_logic(logic).into_iter().next() {
                return Err(VaultError::Security {
                    pattern: finding.pattern,
                    evidence: finding.evidence,
                });
            }
        }

        // 4. Registry write (artifact + manifest + TEST_ADDED event).
        self.registry.add_test_case(&parsed, &self.logger)
    }

    /// Verify one test case; failures become result data.
    pub fn verify_test(&self, id: &str) -> VerifyOutcome {
        match self.registry.verify_test_case(id, &self.logger) {
            Ok(()) => VerifyOutcome {
                success: true,
                test_id: id.to_string(),
                error: None,
            },
            Err(e) => VerifyOutcome {
                success: false,
                test_id: id.to_string(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Verify every registered test case and record the sweep.
    pub fn verify_all_tests(&self) -> VerifySummary {
        let summary = self.registry.verify_all_tests(&self.logger);
        if let Err(e) = self.logger.log(
            AuditAction::VerifyAllTests,
            json!({
                "total": summary.total,
                "verified": summary.verified,
                "failed": summary.failed.len(),
            }),
        ) {
            eprintln!("warning: audit record failed to persist: {e}");
        }
        summary
    }

    pub fn list_tests(&self, filter: &TestFilter) -> Vec<TestCaseEntry> {
        self.registry.list_tests(filter)
    }

    /// Run the integrity check on demand and record it.
    pub fn check_integrity(&self) -> IntegrityReport {
        let report = self.checker.verify_system_integrity();
        let action = if report.status == IntegrityStatus::Verified {
            AuditAction::IntegrityCheck
        } else {
            AuditAction::IntegrityViolation
        };
        if let Err(e) = self.logger.log(
            action,
            json!({ "status": report.status, "checkedFiles": report.checked_files }),
        ) {
            eprintln!("warning: audit record failed to persist: {e}");
        }
        report
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn logger(&self) -> &AuditLogger {
        &self.logger
    }
}

/// Validate the raw submission: every top-level key must be on the
/// allow-list, `name` is required and bounded, optional fields must carry
/// the right types. Runs before any side effect.
fn validate_definition(value: &Value) -> Result<TestDefinition, VaultError> {
    let obj = value
        .as_object()
        .ok_or_else(|| VaultError::Validation("test definition must be a JSON object".into()))?;

    for key in obj.keys() {
        if !ALLOWED_FIELDS.contains(&key.as_str()) {
            return Err(VaultError::Validation(format!("field not allowed: {key}")));
        }
    }

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| VaultError::Validation("name is required and must be a string".into()))?;
    if name.is_empty() {
        return Err(VaultError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > NAME_MAX {
        return Err(VaultError::Validation(format!(
            "name must be {NAME_MAX} characters or fewer"
        )));
    }

    if let Some(config) = obj.get("config") {
        if !config.is_object() {
            return Err(VaultError::Validation("config must be an object".into()));
        }
    }
    if let Some(logic) = obj.get("testLogic") {
        if !logic.is_string() {
            return Err(VaultError::Validation("testLogic must be a string".into()));
        }
    }
    for field in ["description", "type", "author"] {
        if let Some(v) = obj.get(field) {
            if !v.is_string() {
                return Err(VaultError::Validation(format!("{field} must be a string")));
            }
        }
    }
    if let Some(tags) = obj.get("tags") {
        let ok = tags
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !ok {
            return Err(VaultError::Validation(
                "tags must be an array of strings".into(),
            ));
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| VaultError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_minimal() {
        let def = validate_definition(&json!({"name": "t1"})).unwrap();
        assert_eq!(def.name, "t1");
        assert!(def.test_logic.is_none());
    }

    #[test]
    fn test_validate_rejects_extra_field() {
        let err = validate_definition(&json!({"name": "t1", "extra": 1})).unwrap_err();
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_validate_requires_name() {
        assert!(validate_definition(&json!({"description": "no name"})).is_err());
        assert!(validate_definition(&json!({"name": 42})).is_err());
        assert!(validate_definition(&json!({"name": ""})).is_err());
    }

    #[test]
    fn test_validate_name_length_boundary() {
        let ok = "x".repeat(100);
        assert!(validate_definition(&json!({ "name": ok })).is_ok());
        let too_long = "x".repeat(101);
        assert!(validate_definition(&json!({ "name": too_long })).is_err());
    }

    #[test]
    fn test_validate_field_types() {
        assert!(validate_definition(&json!({"name": "t", "config": []})).is_err());
        assert!(validate_definition(&json!({"name": "t", "testLogic": 7})).is_err());
        assert!(validate_definition(&json!({"name": "t", "tags": "smoke"})).is_err());
        assert!(validate_definition(&json!({"name": "t", "tags": [1, 2]})).is_err());
        assert!(validate_definition(&json!({"name": "t", "author": {}})).is_err());
        assert!(
            validate_definition(&json!({"name": "t", "tags": ["a"], "config": {"k": 1}})).is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(validate_definition(&json!("just a string")).is_err());
        assert!(validate_definition(&json!(null)).is_err());
    }
}
