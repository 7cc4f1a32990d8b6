//! CLI contract tests
//!
//! Runs the built binary against temporary projects and checks exit codes,
//! written files and report shapes.

use std::fs;
use std::path::Path;
use std::process::Command;

fn auditgate_bin() -> String {
    env!("CARGO_BIN_EXE_auditgate").to_string()
}

fn run(project: &Path, args: &[&str]) -> (i32, String, String) {
    run_with_env(project, args, None)
}

/// Run with `AUDITGATE_HASH_WORKERS` set only in the child's environment.
fn run_with_env(project: &Path, args: &[&str], hash_workers: Option<&str>) -> (i32, String, String) {
    let mut command = Command::new(auditgate_bin());
    command
        .arg("--project")
        .arg(project)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("AUDITGATE_HASH_WORKERS");
    if let Some(value) = hash_workers {
        command.env("AUDITGATE_HASH_WORKERS", value);
    }
    let output = command.output().expect("run auditgate");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn write_manifest(project: &Path, name: &str, errors: u64, plugin_arg: &str) {
    let json = format!(
        r#"{{"runs": [{{"tool": "pyright", "mode": "strict",
            "perFile": [{{"path": "src/a.py", "errors": {errors}, "warnings": 1}}],
            "engineOptions": {{"pluginArgs": ["{plugin_arg}"]}}}}]}}"#
    );
    fs::write(project.join(name), json).unwrap();
}

#[test]
fn test_ratchet_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m1.json", 2, "--strict");
    write_manifest(p, "m2.json", 3, "--strict");
    write_manifest(p, "m3.json", 1, "--strict");

    let (code, stdout, stderr) = run(p, &["ratchet", "init", "--manifest", "m1.json"]);
    assert_eq!(code, 0, "init failed: {}", stderr);
    assert!(stdout.contains("Recorded budget"));
    assert!(p.join("ratchet_budget.json").exists());

    // Clean check
    let (code, _, _) = run(p, &["ratchet", "check", "--manifest", "m1.json"]);
    assert_eq!(code, 0);

    // Regression
    let (code, stdout, _) = run(
        p,
        &["ratchet", "check", "--manifest", "m2.json", "--format", "json"],
    );
    assert_eq!(code, 1);
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("json report");
    assert_eq!(report["exitCode"], 1);
    assert_eq!(report["violations"], 1);
    let finding = &report["report"]["runs"][0]["findings"][0];
    assert_eq!(finding["kind"], "violation");
    assert_eq!(finding["path"], "src/a.py");
    assert_eq!(finding["delta"], 1);

    // Update does not loosen; still failing
    let (code, _, _) = run(p, &["ratchet", "update", "--manifest", "m2.json"]);
    assert_eq!(code, 1);

    // Improvement is locked in
    let (code, stdout, _) = run(p, &["ratchet", "update", "--manifest", "m3.json"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("within budget"));
    let budget: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(p.join("ratchet_budget.json")).unwrap()).unwrap();
    assert_eq!(
        budget["runs"]["pyright:strict"]["paths"]["src/a.py"]["severities"]["error"],
        1
    );

    // Old count of 2 is now a violation
    let (code, _, _) = run(p, &["ratchet", "check", "--manifest", "m1.json"]);
    assert_eq!(code, 1);
}

#[test]
fn test_signature_drift_and_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "before.json", 2, "--strict");
    write_manifest(p, "after.json", 2, "--basic");

    run(p, &["ratchet", "init", "--manifest", "before.json"]);

    let (code, stdout, _) = run(p, &["ratchet", "check", "--manifest", "after.json"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("DRIFT"));

    let (code, _, _) = run(
        p,
        &["ratchet", "check", "--manifest", "after.json", "--ignore-signature"],
    );
    assert_eq!(code, 0);

    let (code, _, _) = run(p, &["ratchet", "refresh-signature", "--manifest", "after.json"]);
    assert_eq!(code, 0);
    let (code, _, _) = run(p, &["ratchet", "check", "--manifest", "after.json"]);
    assert_eq!(code, 0);
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m.json", 1, "--strict");

    assert_eq!(run(p, &["ratchet", "init", "--manifest", "m.json"]).0, 0);
    let (code, _, stderr) = run(p, &["ratchet", "init", "--manifest", "m.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("already exists"));
    assert_eq!(
        run(p, &["ratchet", "init", "--manifest", "m.json", "--force"]).0,
        0
    );
}

#[test]
fn test_invalid_severity_and_target_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m.json", 1, "--strict");

    let (code, _, stderr) = run(
        p,
        &["ratchet", "init", "--manifest", "m.json", "--severity", "fatal"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("fatal"));

    let (code, _, stderr) = run(
        p,
        &["ratchet", "init", "--manifest", "m.json", "--target", "error"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid target"));
    assert!(!p.join("ratchet_budget.json").exists());
}

#[test]
fn test_unknown_schema_version_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m.json", 1, "--strict");
    fs::write(
        p.join("ratchet_budget.json"),
        r#"{"schemaVersion": 7, "generatedAt": "2026-01-01T00:00:00Z", "runs": {}}"#,
    )
    .unwrap();

    let (code, _, stderr) = run(p, &["ratchet", "check", "--manifest", "m.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("schema version 7"));
}

#[test]
fn test_budget_path_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m.json", 1, "--strict");
    fs::write(
        p.join("auditgate.toml"),
        "[ratchet]\nbudget = \"ci/budget.json\"\nseverities = [\"error\"]\n",
    )
    .unwrap();

    assert_eq!(run(p, &["ratchet", "init", "--manifest", "m.json"]).0, 0);
    let budget: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(p.join("ci/budget.json")).unwrap()).unwrap();
    assert_eq!(
        budget["runs"]["pyright:strict"]["severities"],
        serde_json::json!(["error"])
    );
}

#[test]
fn test_cache_fingerprint_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    fs::create_dir_all(p.join("src")).unwrap();
    fs::write(p.join("src/a.py"), "x = 1\n").unwrap();
    fs::write(p.join("src/b.py"), "y = 2\n").unwrap();
    fs::write(p.join("src/readme.md"), "docs\n").unwrap();

    let (code, stdout, stderr) = run(
        p,
        &["cache", "fingerprint", "src", "--respect-gitignore", "false"],
    );
    assert_eq!(code, 0, "fingerprint failed: {}", stderr);
    let out: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    let fps = out["fingerprints"].as_object().unwrap();
    assert_eq!(fps.len(), 2);
    assert!(fps.contains_key("src/a.py"));
    assert_eq!(out["truncated"], false);
    assert_eq!(out["hashed"], 2);

    fs::write(p.join("baseline.json"), &stdout).unwrap();
    let (_, stdout, _) = run(
        p,
        &[
            "cache",
            "fingerprint",
            "src",
            "--respect-gitignore",
            "false",
            "--baseline",
            p.join("baseline.json").to_str().unwrap(),
        ],
    );
    let out: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(out["hashed"], 0);
    assert_eq!(out["reused"], 2);

    let (_, stdout, _) = run(
        p,
        &["cache", "fingerprint", "src", "--respect-gitignore", "false", "--max-files", "1"],
    );
    let out: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(out["truncated"], true);

    let (code, stdout, _) = run(p, &["cache", "status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No cached runs"));

    let (code, stdout, _) = run(p, &["cache", "clear"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Cleared 0 cached runs"));
}

#[test]
fn test_unknown_diagnostic_severity_leaves_budget_alone() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    fs::write(
        p.join("m1.json"),
        r#"{"runs": [{"tool": "pyright", "mode": "strict", "perFile": [{"path": "a.py",
            "diagnostics": [{"severity": "error"}, {"severity": "error"}]}]}]}"#,
    )
    .unwrap();
    fs::write(
        p.join("m2.json"),
        r#"{"runs": [{"tool": "pyright", "mode": "strict", "perFile": [{"path": "a.py",
            "diagnostics": [{"severity": "error"}, {"severity": "Eror"}, {"severity": "fatal"}]}]}]}"#,
    )
    .unwrap();

    assert_eq!(run(p, &["ratchet", "init", "--manifest", "m1.json"]).0, 0);
    let before = fs::read_to_string(p.join("ratchet_budget.json")).unwrap();

    let (code, _, stderr) = run(p, &["ratchet", "check", "--manifest", "m2.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Eror"));

    let (code, _, _) = run(p, &["ratchet", "update", "--manifest", "m2.json"]);
    assert_ne!(code, 0);
    assert_eq!(fs::read_to_string(p.join("ratchet_budget.json")).unwrap(), before);
}

#[test]
fn test_invalid_config_value_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    write_manifest(p, "m.json", 1, "--strict");
    fs::write(
        p.join("auditgate.toml"),
        "[cache]\nhash_workers = \"lots\"\n\n[ratchet]\nseverities = [\"error\"]\n\n[ratchet.targets]\nerror = 1\n",
    )
    .unwrap();

    let (code, _, stderr) = run(p, &["ratchet", "init", "--manifest", "m.json"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("auditgate.toml"));
    assert!(stderr.contains("lots"));
    assert!(!p.join("ratchet_budget.json").exists());

    let (code, _, _) = run(p, &["cache", "status"]);
    assert_ne!(code, 0);
}

#[test]
fn test_hash_workers_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    fs::create_dir_all(p.join("src")).unwrap();
    fs::write(p.join("src/a.py"), "x = 1\n").unwrap();
    fs::write(p.join("auditgate.toml"), "[cache]\nhash_workers = 1\n").unwrap();

    let args = [
        "cache",
        "fingerprint",
        "src",
        "--respect-gitignore",
        "false",
        "--log-level",
        "info",
    ];

    let (code, _, stderr) = run_with_env(p, &args, None);
    assert_eq!(code, 0, "fingerprint failed: {}", stderr);
    assert!(stderr.contains("Hash workers: Sequential"));

    // Environment beats the config file
    let (code, _, stderr) = run_with_env(p, &args, Some("auto"));
    assert_eq!(code, 0);
    assert!(stderr.contains("Hash workers: Auto"));

    // Invalid environment value is ignored with a warning
    let (code, _, stderr) = run_with_env(p, &args, Some("lots"));
    assert_eq!(code, 0);
    assert!(stderr.contains("Ignoring AUDITGATE_HASH_WORKERS"));
    assert!(stderr.contains("Hash workers: Sequential"));

    // Flag beats the environment
    let mut with_flag = args.to_vec();
    with_flag.extend(["--hash-workers", "3"]);
    let (code, _, stderr) = run_with_env(p, &with_flag, Some("auto"));
    assert_eq!(code, 0);
    assert!(stderr.contains("Hash workers: Fixed(3)"));
}

#[test]
fn test_config_limits_and_zero_flag_means_unlimited() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    fs::create_dir_all(p.join("src")).unwrap();
    fs::write(p.join("src/a.py"), "x = 1\n").unwrap();
    fs::write(p.join("src/b.py"), "y = 2\n").unwrap();
    fs::write(
        p.join("auditgate.toml"),
        "[cache]\nmax_files = 1\nrespect_gitignore = false\n",
    )
    .unwrap();

    let (code, stdout, _) = run(p, &["cache", "fingerprint", "src"]);
    assert_eq!(code, 0);
    let out: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(out["truncated"], true);
    assert_eq!(out["fingerprints"].as_object().unwrap().len(), 1);

    let (code, stdout, _) = run(p, &["cache", "fingerprint", "src", "--max-files", "0"]);
    assert_eq!(code, 0);
    let out: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(out["truncated"], false);
    assert_eq!(out["fingerprints"].as_object().unwrap().len(), 2);
}
