//! Integration Test: Synchronous Core
//!
//! **Policy**: store, interpreter and queue calls run to completion on the
//! caller's thread. The core spawns nothing, links no async runtime, and
//! keeps no global mutable state (process-wide atomics for id counters are
//! fine).

use architectural_enforcement::{assert_clean, core_src_dir, scan_directory, Rule};

#[test]
fn test_no_threads_or_runtime_in_core() {
    let violations = scan_directory(
        &core_src_dir(),
        &[
            Rule {
                name: "thread",
                patterns: &["thread::spawn", "thread::Builder"],
            },
            Rule {
                name: "async",
                patterns: &["tokio::", "async fn", ".await"],
            },
        ],
    );

    assert_clean(
        &violations,
        "Threads or async code found in a2ui/core. Keep the runtime in a2ui-replay.",
    );
}

#[test]
fn test_no_global_mutable_singletons() {
    let violations: Vec<_> = scan_directory(
        &core_src_dir(),
        &[Rule {
            name: "singleton",
            patterns: &["static mut ", "Mutex<", "RwLock<", "OnceLock<", "LazyLock<", "RefCell<"],
        }],
    )
    .into_iter()
    // Struct fields may hold locks; only statics are singletons
    .filter(|v| {
        ["static ", "pub static ", "pub(crate) static "]
            .iter()
            .any(|prefix| v.line.starts_with(prefix))
    })
    .collect();

    assert_clean(
        &violations,
        "Global mutable state found in a2ui/core. Pass a store instance by reference instead.",
    );
}
