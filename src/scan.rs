//! Deny-list scan over submitted test logic.
//!
//! `testLogic` is carried as opaque text and never evaluated by this crate,
//! but known-dangerous constructs are rejected at admission so the registry
//! never stores them. The pattern set covers direct filesystem access,
//! process spawning, dynamic code evaluation, environment access,
//! directory-introspection tokens, and path traversal.

use regex::Regex;
use std::sync::LazyLock;

/// A named forbidden construct.
struct DenyPattern {
    label: &'static str,
    regex: Regex,
}

static DENY_PATTERNS: LazyLock<Vec<DenyPattern>> = LazyLock::new(|| {
    [
        (
            "filesystem module import",
            r#"require\s*\(\s*['"`]fs['"`]\s*\)"#,
        ),
        (
            "child process invocation",
            r#"require\s*\(\s*['"`]child_process['"`]\s*\)"#,
        ),
        ("dynamic code evaluation", r"\beval\s*\("),
        ("dynamic function construction", r"\bFunction\s*\("),
        ("process termination", r"process\.exit"),
        ("environment variable access", r"process\.env"),
        ("directory introspection", r"__dirname|__filename"),
        ("path traversal", r"\.\./\.\./"),
    ]
    .into_iter()
    .map(|(label, pattern)| DenyPattern {
        label,
        regex: Regex::new(pattern).unwrap(),
    })
    .collect()
});

/// Evidence is capped so a giant submission cannot balloon error output.
const EVIDENCE_MAX: usize = 60;

/// One matched forbidden construct.
#[derive(Debug, Clone)]
pub struct ScanFinding {
    pub pattern: &'static str,
    pub evidence: String,
}

/// Scan test logic against the deny-list. Returns one finding per matched
/// pattern, in table order; empty means clean.
pub fn scan_test_logic(content: &str) -> Vec<ScanFinding> {
    let mut findings = Vec::new();
    for deny in DENY_PATTERNS.iter() {
        if let Some(m) = deny.regex.find(content) {
            findings.push(ScanFinding {
                pattern: deny.label,
                evidence: m.as_str().chars().take(EVIDENCE_MAX).collect(),
            });
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_label(content: &str) -> Option<&'static str> {
        scan_test_logic(content).first().map(|f| f.pattern)
    }

    #[test]
    fn test_clean_logic_passes() {
        assert!(scan_test_logic("const x = widget.count; assert(x === 3);").is_empty());
        assert!(scan_test_logic("").is_empty());
    }

    #[test]
    fn test_fs_import_detected() {
        assert_eq!(
            first_label("require('fs').readFileSync('/etc/passwd')"),
            Some("filesystem module import")
        );
        assert_eq!(
            first_label(r#"require ( "fs" )"#),
            Some("filesystem module import")
        );
    }

    #[test]
    fn test_child_process_detected() {
        assert_eq!(
            first_label("require('child_process').execSync('rm -rf /')"),
            Some("child process invocation")
        );
    }

    #[test]
    fn test_eval_detected() {
        assert_eq!(first_label("eval('2 + 2')"), Some("dynamic code evaluation"));
        // `evaluate(` is a different identifier and must not match
        assert!(scan_test_logic("evaluate(rules)").is_empty());
    }

    #[test]
    fn test_function_constructor_detected() {
        assert_eq!(
            first_label("new Function('return 1')()"),
            Some("dynamic function construction")
        );
    }

    #[test]
    fn test_process_access_detected() {
        assert_eq!(first_label("process.exit(1)"), Some("process termination"));
        assert_eq!(
            first_label("process.env.SECRET_KEY"),
            Some("environment variable access")
        );
    }

    #[test]
    fn test_directory_tokens_detected() {
        assert_eq!(first_label("__dirname + '/x'"), Some("directory introspection"));
        assert_eq!(first_label("log(__filename)"), Some("directory introspection"));
    }

    #[test]
    fn test_path_traversal_detected() {
        assert_eq!(
            first_label("open('../../secrets.txt')"),
            Some("path traversal")
        );
    }

    #[test]
    fn test_multiple_findings_reported() {
        let findings = scan_test_logic("eval(require('fs').readFileSync(process.env.P))");
        let labels: Vec<_> = findings.iter().map(|f| f.pattern).collect();
        assert!(labels.contains(&"filesystem module import"));
        assert!(labels.contains(&"dynamic code evaluation"));
        assert!(labels.contains(&"environment variable access"));
    }

    #[test]
    fn test_evidence_truncated() {
        let long = format!("eval({})", "x".repeat(500));
        let findings = scan_test_logic(&long);
        assert!(findings[0].evidence.chars().count() <= 60);
    }
}
