//! Run cache workflow tests
//!
//! Simulates an analyzer wrapper: fingerprint the tree, consult the cache,
//! "run" the analyzer on a miss, record, persist, and repeat.

use auditgate::cache::{
    collect_fingerprints, default_cache_dir, AnalyzerRun, CacheKey, CollectOptions, HashWorkers,
    RunCache,
};
use auditgate::models::Diagnostic;
use std::fs;
use std::path::{Path, PathBuf};

/// Stand-in analyzer: one error per line containing "bad".
fn fake_analyzer(root: &Path, files: &[&str]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for file in files {
        let content = fs::read_to_string(root.join(file)).unwrap_or_default();
        for (i, line) in content.lines().enumerate() {
            if line.contains("bad") {
                diagnostics.push(Diagnostic {
                    path: file.to_string(),
                    line: i as u32 + 1,
                    column: 1,
                    severity: "error".to_string(),
                    rule: Some("no-bad".to_string()),
                    message: "bad found".to_string(),
                });
            }
        }
    }
    // Deliberately reverse so the cache has to canonicalize
    diagnostics.reverse();
    diagnostics
}

fn options<'a>() -> CollectOptions<'a> {
    CollectOptions {
        extensions: vec!["py".to_string()],
        hash_workers: HashWorkers::Sequential,
        ..Default::default()
    }
}

/// Returns (diagnostics, was_hit)
fn audit(root: &Path, cache_dir: &Path) -> (Vec<Diagnostic>, bool) {
    let targets = vec![PathBuf::from("src")];
    let key = CacheKey::new("fake", "strict", ["src"]).with_tool_version(Some("1.0"));
    let current = collect_fingerprints(root, &targets, &options()).fingerprints;

    let mut cache = RunCache::load(cache_dir);
    if let Some(entry) = cache.lookup(&key, &current) {
        return (entry.diagnostics.clone(), true);
    }

    let run = AnalyzerRun {
        command: vec!["fake".to_string(), "src".to_string()],
        exit_code: 1,
        duration_ms: 5,
        diagnostics: fake_analyzer(root, &["src/a.py", "src/b.py"]),
        ..Default::default()
    };
    let diagnostics = cache.record(&key, current, run).diagnostics.clone();
    cache.persist().unwrap();
    (diagnostics, false)
}

fn setup() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/a.py"), "ok\nbad\nbad\n").unwrap();
    fs::write(dir.path().join("src/b.py"), "bad\n").unwrap();
    dir
}

#[test]
fn test_warm_cache_returns_identical_diagnostics() {
    let dir = setup();
    let cache_dir = default_cache_dir(dir.path());

    let (cold, hit) = audit(dir.path(), &cache_dir);
    assert!(!hit);
    assert_eq!(cold.len(), 3);
    assert_eq!(cold[0].path, "src/a.py");
    assert_eq!(cold[0].line, 2);

    let (warm, hit) = audit(dir.path(), &cache_dir);
    assert!(hit);
    assert_eq!(warm, cold);
}

#[test]
fn test_edit_invalidates() {
    let dir = setup();
    let cache_dir = default_cache_dir(dir.path());
    audit(dir.path(), &cache_dir);

    fs::write(dir.path().join("src/b.py"), "fine now, nothing to see\n").unwrap();
    let (diagnostics, hit) = audit(dir.path(), &cache_dir);
    assert!(!hit);
    assert_eq!(diagnostics.len(), 2);

    let (_, hit) = audit(dir.path(), &cache_dir);
    assert!(hit);
}

#[test]
fn test_added_and_deleted_files_invalidate() {
    let dir = setup();
    let cache_dir = default_cache_dir(dir.path());
    audit(dir.path(), &cache_dir);

    fs::write(dir.path().join("src/c.py"), "").unwrap();
    assert!(!audit(dir.path(), &cache_dir).1);

    fs::remove_file(dir.path().join("src/c.py")).unwrap();
    assert!(!audit(dir.path(), &cache_dir).1);
    assert!(audit(dir.path(), &cache_dir).1);
}

#[test]
fn test_non_source_files_do_not_invalidate() {
    let dir = setup();
    let cache_dir = default_cache_dir(dir.path());
    audit(dir.path(), &cache_dir);

    fs::write(dir.path().join("src/notes.txt"), "scratch").unwrap();
    fs::write(dir.path().join("src/.hidden.py"), "bad").unwrap();
    assert!(audit(dir.path(), &cache_dir).1);
}

#[test]
fn test_corrupt_store_behaves_like_cold_cache() {
    let dir = setup();
    let cache_dir = default_cache_dir(dir.path());
    let (cold, _) = audit(dir.path(), &cache_dir);

    fs::write(cache_dir.join("run_cache.json"), b"\x00\x01garbage").unwrap();
    let (after_corruption, hit) = audit(dir.path(), &cache_dir);
    assert!(!hit);
    assert_eq!(after_corruption, cold);
    assert!(audit(dir.path(), &cache_dir).1);
}

#[test]
fn test_baseline_skips_rehashing_unchanged_tree() {
    let dir = setup();
    let targets = vec![PathBuf::from("src")];
    let first = collect_fingerprints(dir.path(), &targets, &options());
    assert_eq!(first.hashed, 2);

    let second = collect_fingerprints(
        dir.path(),
        &targets,
        &CollectOptions {
            baseline: Some(&first.fingerprints),
            ..options()
        },
    );
    assert_eq!(second.hashed, 0);
    assert_eq!(second.reused, 2);
    assert_eq!(second.fingerprints, first.fingerprints);
}
