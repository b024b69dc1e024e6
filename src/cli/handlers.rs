use crate::api::TestApi;
use crate::audit::AuditLogger;
use crate::config::Paths;
use crate::integrity::IntegrityChecker;
use crate::types::{AuditAction, IntegrityStatus, TestFilter, TestStatus};
use chrono::{DateTime, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

pub fn init(protected: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let paths = Paths::resolve();
    println!("Initializing testvault at {}", paths.root().display());

    paths.ensure_dirs()?;
    println!("  Created state directories");

    // Opening the registry writes the empty manifest on first run.
    let _ = crate::registry::TestRegistry::open(&paths)?;
    println!("  Manifest: {}", paths.manifest_file().display());

    let checker = match protected {
        Some(dir) => IntegrityChecker::with_protected_root(&paths, dir),
        None => IntegrityChecker::new(&paths),
    };
    let records = checker.generate_initial_hashes()?;
    println!(
        "  Integrity baseline: {} file(s) under {}",
        records.len(),
        checker.protected_root().display()
    );

    println!();
    println!("testvault initialized.");
    println!("Registered tests are write-once; re-run `init` only to re-establish trust.");
    Ok(())
}

pub fn add(definition_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(definition_file)
        .map_err(|e| format!("cannot read {}: {e}", definition_file.display()))?;
    let definition: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| format!("invalid definition JSON: {e}"))?;

    let paths = Paths::resolve();
    let mut api = TestApi::open(&paths)?;
    let outcome = api.add_test(&definition);

    if outcome.success {
        println!("Test added:");
        println!("  ID: {}", outcome.test_id.unwrap_or_default());
        println!("  File: {}", outcome.filename.unwrap_or_default());
    } else {
        eprintln!(
            "Add failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
        process::exit(1);
    }
    Ok(())
}

pub fn list(
    status: Option<&str>,
    tags: Vec<String>,
    after: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = status
        .map(|s| match s {
            "active" => Ok(TestStatus::Active),
            "inactive" => Ok(TestStatus::Inactive),
            other => Err(format!("unknown status '{other}'; use active or inactive")),
        })
        .transpose()?;

    let after = after
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| format!("invalid --after timestamp '{s}': {e}"))
        })
        .transpose()?;

    let paths = Paths::resolve();
    let api = TestApi::open(&paths)?;
    let tests = api.list_tests(&TestFilter {
        status,
        tags,
        after,
    });

    if tests.is_empty() {
        println!("No tests match.");
        return Ok(());
    }

    println!("Tests ({}):", tests.len());
    for t in &tests {
        println!(
            "  {} — {} ({}, {})",
            t.id,
            t.name,
            t.status,
            t.timestamp.to_rfc3339()
        );
        if !t.tags.is_empty() {
            println!("    tags: {}", t.tags.join(", "));
        }
    }
    Ok(())
}

pub fn verify(id: Option<&str>, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let paths = Paths::resolve();
    let api = TestApi::open(&paths)?;

    if all {
        let summary = api.verify_all_tests();
        println!("Verified {}/{} tests", summary.verified, summary.total);
        if !summary.failed.is_empty() {
            for f in &summary.failed {
                println!("  FAIL {}: {}", f.id, f.error);
            }
            process::exit(1);
        }
        return Ok(());
    }

    let Some(id) = id else {
        return Err("specify a test id or --all".into());
    };

    let outcome = api.verify_test(id);
    if outcome.success {
        println!("OK: {id}");
    } else {
        eprintln!(
            "FAIL {id}: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
        process::exit(1);
    }
    Ok(())
}

pub fn logs_verify(date: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let date = date
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| format!("invalid --date '{s}' (expected YYYY-MM-DD): {e}"))
        })
        .transpose()?;

    let paths = Paths::resolve();
    let logger = AuditLogger::new(&paths);
    let result = logger.verify_logs(date)?;

    println!(
        "Audit log {}: {} entr{}",
        result.date,
        result.total_entries,
        if result.total_entries == 1 { "y" } else { "ies" }
    );
    if result.verified {
        println!("PASS: log checksums verified.");
    } else {
        for v in &result.violations {
            println!("  {v}");
        }
        println!("FAIL: audit log integrity check failed.");
        process::exit(1);
    }
    Ok(())
}

pub fn logs_recent(count: usize, action: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let action = action
        .map(|s| s.parse::<AuditAction>())
        .transpose()
        .map_err(|e| e.to_string())?;

    let paths = Paths::resolve();
    let logger = AuditLogger::new(&paths);
    let entries = logger.recent_logs(count, action)?;

    if entries.is_empty() {
        println!("No matching audit entries today.");
        return Ok(());
    }

    for e in &entries {
        println!(
            "{} {} [{}:{}] {}",
            e.timestamp.to_rfc3339(),
            e.action,
            e.actor,
            e.process_id,
            e.details
        );
    }
    Ok(())
}

pub fn status() -> Result<(), Box<dyn std::error::Error>> {
    let paths = Paths::resolve();
    if !paths.root().exists() {
        println!("testvault: not initialized");
        println!("Run `testvault init` to set up the state directory.");
        return Ok(());
    }

    let api = TestApi::open(&paths)?;

    println!("testvault: initialized");
    println!("State directory: {}", paths.root().display());
    println!("Registered tests: {}", api.registry().test_count());
    println!("Total ever added: {}", api.registry().stats().total_added);

    let report = api.check_integrity();
    match report.status {
        IntegrityStatus::Verified if report.checked_files == 0 => {
            // Trivially verified: nothing is baselined yet
            println!("Integrity: VERIFIED (0 files checked)");
        }
        IntegrityStatus::Verified => {
            println!("Integrity: VERIFIED ({} files)", report.checked_files);
        }
        IntegrityStatus::Compromised => {
            println!(
                "Integrity: COMPROMISED ({} violation(s))",
                report.violations.len()
            );
        }
        IntegrityStatus::Error => {
            println!(
                "Integrity: ERROR — {}",
                report.error.unwrap_or_else(|| "unknown".to_string())
            );
        }
    }

    let log_check = api.logger().verify_logs(None)?;
    if log_check.verified {
        println!("Audit log ({}): VALID", log_check.date);
    } else {
        println!(
            "Audit log ({}): {} violation(s)",
            log_check.date,
            log_check.violations.len()
        );
    }

    Ok(())
}
