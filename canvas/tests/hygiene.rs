//! Hygiene: source-level rules for the engine crate, checked at test time.
//!
//! Every rule carries a budget (zero everywhere today). A budget only moves
//! down: to add an occurrence, remove one somewhere else first.

use std::fs;
use std::path::{Path, PathBuf};

struct Rule {
    name: &'static str,
    pattern: &'static str,
    budget: usize,
}

const RULES: &[Rule] = &[
    // Panics.
    Rule { name: "unwrap", pattern: ".unwrap()", budget: 0 },
    Rule { name: "expect", pattern: ".expect(", budget: 0 },
    Rule { name: "panic", pattern: "panic!(", budget: 0 },
    Rule { name: "unreachable", pattern: "unreachable!(", budget: 0 },
    Rule { name: "todo", pattern: "todo!(", budget: 0 },
    Rule { name: "unimplemented", pattern: "unimplemented!(", budget: 0 },
    // Silently dropped results.
    Rule { name: "silent discard", pattern: "let _ =", budget: 0 },
    Rule { name: "dot ok", pattern: ".ok()", budget: 0 },
    // Structure.
    Rule { name: "allow dead code", pattern: "#[allow(dead_code)]", budget: 0 },
    Rule { name: "println", pattern: "println!(", budget: 0 },
];

struct SourceFile {
    path: PathBuf,
    content: String,
}

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

fn rs_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            out.extend(rs_files(&path));
        } else if path.extension().is_some_and(|e| e == "rs") {
            out.push(path);
        }
    }
    out.sort();
    out
}

fn is_test_file(path: &Path) -> bool {
    path.file_stem().is_some_and(|s| s.to_string_lossy().ends_with("_test"))
}

/// Production sources only; `*_test.rs` siblings are exempt.
fn production_sources() -> Vec<SourceFile> {
    rs_files(&src_dir())
        .into_iter()
        .filter(|p| !is_test_file(p))
        .filter_map(|path| fs::read_to_string(&path).map(|content| SourceFile { path, content }).ok())
        .collect()
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.display().to_string(), count))
        })
        .collect()
}

// =============================================================
// Budgets
// =============================================================

#[test]
fn pattern_budgets_hold() {
    let files = production_sources();
    assert!(!files.is_empty(), "no sources found under {}", src_dir().display());

    let mut failures = Vec::new();
    for rule in RULES {
        let found = hits(&files, rule.pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        if count > rule.budget {
            let detail: Vec<String> = found.iter().map(|(path, c)| format!("    {path}: {c}")).collect();
            failures.push(format!("  {} ({:?}): found {count}, max {}\n{}", rule.name, rule.pattern, rule.budget, detail.join("\n")));
        }
    }
    assert!(failures.is_empty(), "hygiene budgets exceeded:\n{}", failures.join("\n"));
}

// =============================================================
// Test wiring
// =============================================================

#[test]
fn every_test_sibling_is_wired_into_its_module() {
    let dir = src_dir();
    let mut orphans = Vec::new();
    for test_file in rs_files(&dir).into_iter().filter(|p| is_test_file(p)) {
        let Some(name) = test_file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let module = test_file.with_file_name(name.replace("_test.rs", ".rs"));
        let wired = fs::read_to_string(&module).is_ok_and(|src| src.contains(&format!("#[path = \"{name}\"]")));
        if !wired {
            orphans.push(name);
        }
    }
    assert!(orphans.is_empty(), "test files never compiled: {orphans:?}");
}

#[test]
fn every_module_is_declared_in_lib() {
    let dir = src_dir();
    let lib = fs::read_to_string(dir.join("lib.rs")).unwrap_or_default();
    let missing: Vec<String> = rs_files(&dir)
        .into_iter()
        .filter(|p| !is_test_file(p))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|stem| stem != "lib" && !lib.contains(&format!("pub mod {stem};")))
        .collect();
    assert!(missing.is_empty(), "modules not declared in lib.rs: {missing:?}");
}
