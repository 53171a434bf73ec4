//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce the core's execution
//! model: every store and queue call is synchronous and run-to-completion.
//! - No sleep() calls in `a2ui/core`
//! - No spawned threads or async runtime in `a2ui/core`
//! - No global mutable singletons in `a2ui/core`
//!
//! The helpers below scan source text; test modules (`#[cfg(test)]` and
//! below) and line comments are ignored.

use std::fs;
use std::path::{Path, PathBuf};

/// Root of the core library sources
#[must_use]
pub fn core_src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../a2ui/core/src")
}

/// One forbidden pattern
pub struct Rule {
    /// Short name shown in reports
    pub name: &'static str,
    /// Substrings that trigger the rule
    pub patterns: &'static [&'static str],
}

/// A rule hit
#[derive(Debug)]
pub struct Violation {
    /// Rule name
    pub rule: &'static str,
    /// File
    pub path: PathBuf,
    /// 1-based line
    pub line_number: usize,
    /// Offending line, trimmed
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{} - {}",
            self.rule,
            self.path.display(),
            self.line_number,
            self.line
        )
    }
}

/// Scan every `.rs` file under `dir`
#[must_use]
pub fn scan_directory(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            scan_file(entry.path(), rules, &mut violations);
        }
    }
    violations
}

/// Number of `.rs` files under `dir`
#[must_use]
pub fn count_sources(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .count()
}

fn scan_file(path: &Path, rules: &[Rule], violations: &mut Vec<Violation>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    for (idx, line) in content.lines().enumerate() {
        // Production code ends where the test module starts
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        for rule in rules {
            if rule.patterns.iter().any(|p| code_part.contains(p)) {
                violations.push(Violation {
                    rule: rule.name,
                    path: path.to_path_buf(),
                    line_number: idx + 1,
                    line: line.trim().to_string(),
                });
            }
        }
    }
}

/// Print violations and panic if there are any
pub fn assert_clean(violations: &[Violation], headline: &str) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n{headline}\n");
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\nFound {} violation(s) in a2ui/core.", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLEEP: Rule = Rule {
        name: "sleep",
        patterns: &["::sleep("],
    };

    #[test]
    fn test_scanner_skips_comments_and_tests() {
        let dir = tempfile_dir();
        fs::write(
            dir.join("sample.rs"),
            "// std::thread::sleep(d)\nfn ok() {}\nfn bad() { std::thread::sleep(d); }\n#[cfg(test)]\nmod tests { fn t() { std::thread::sleep(d); } }\n",
        )
        .unwrap();

        let violations = scan_directory(&dir, &[SLEEP]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line_number, 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("a2ui-arch-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
