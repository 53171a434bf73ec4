//! Integration Test: Sleep Prohibition
//!
//! **Policy**: `a2ui/core` MUST NOT sleep. Cooldowns and expiry compare the
//! injected clock against stored timestamps when a call runs.

use architectural_enforcement::{assert_clean, core_src_dir, count_sources, scan_directory, Rule};

#[test]
fn test_core_sources_found() {
    assert!(
        count_sources(&core_src_dir()) > 0,
        "expected Rust sources under {}",
        core_src_dir().display()
    );
}

#[test]
fn test_no_sleep_in_core() {
    let violations = scan_directory(
        &core_src_dir(),
        &[Rule {
            name: "sleep",
            patterns: &["::sleep(", ".sleep("],
        }],
    );

    assert_clean(
        &violations,
        "Sleep calls found in a2ui/core. Time-based rules must read the Clock instead.",
    );
}
