#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const REGISTRY: &str = r#"metadata:
  version: "1.0.0"
  entityCount: 2
  checksumAlgorithm: sha256
entities:
  tasks:
    validate-story:
      path: tasks/validate-story.md
      type: task
      keywords: [validate, story, draft]
      purpose: Validate story drafts before development starts
      usedBy: [dev]
      checksum: "sha256:0000"
  agents:
    dev:
      path: agents/dev.md
      type: agent
      keywords: [developer, implement, code]
      purpose: Implements approved stories
      checksum: "sha256:0000"
"#;

fn ids(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ids").unwrap();
    cmd.current_dir(dir.path()).env("IDS_ROOT", dir.path());
    cmd
}

fn registry_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join(".ids/entity-registry.yaml")
}

/// Two registered entities whose files exist but whose checksums are stale.
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join(".ids")).unwrap();
    std::fs::create_dir_all(root.join("tasks")).unwrap();
    std::fs::create_dir_all(root.join("agents")).unwrap();
    std::fs::write(root.join("tasks/validate-story.md"), "Validate the story draft.\n").unwrap();
    std::fs::write(root.join("agents/dev.md"), "Developer agent.\n").unwrap();
    std::fs::write(registry_path(&dir), REGISTRY).unwrap();
    dir
}

fn json_of(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// ids init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_empty_registry() {
    let dir = TempDir::new().unwrap();
    ids(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .ids/config.yaml"));
    assert!(dir.path().join(".ids/config.yaml").exists());
    assert!(registry_path(&dir).exists());
    assert!(dir.path().join(".ids/registry-backups").is_dir());

    ids(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .ids/config.yaml"));
}

#[test]
fn init_does_not_overwrite_registry() {
    let dir = fixture();
    ids(&dir).arg("init").assert().success();
    assert_eq!(std::fs::read_to_string(registry_path(&dir)).unwrap(), REGISTRY);
}

// ---------------------------------------------------------------------------
// ids check / impact
// ---------------------------------------------------------------------------

#[test]
fn check_recommends_reuse() {
    let dir = fixture();
    ids(&dir)
        .args(["check", "validate story drafts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Decision: REUSE (confidence high)"))
        .stdout(predicate::str::contains("validate-story"));
}

#[test]
fn check_json_and_type_filter() {
    let dir = fixture();
    let v = json_of(ids(&dir).args(["check", "validate story drafts"]));
    assert_eq!(v["value"]["topDecision"], "REUSE");
    assert_eq!(v["value"]["shouldProceed"], true);

    let v = json_of(ids(&dir).args(["check", "validate story drafts", "--type", "agent"]));
    assert_eq!(v["value"]["topDecision"], "CREATE");
    assert_eq!(v["value"]["matchesFound"], 0);
}

#[test]
fn check_without_registry_degrades_to_create() {
    let dir = TempDir::new().unwrap();
    ids(&dir)
        .args(["check", "anything at all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Decision: CREATE"))
        .stdout(predicate::str::contains("! degraded"));
}

#[test]
fn check_blank_intent_fails() {
    let dir = fixture();
    ids(&dir)
        .args(["check", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("intent must not be empty"));
}

#[test]
fn impact_reports_consumers_and_unknown_ids() {
    let dir = fixture();
    ids(&dir)
        .args(["impact", "validate-story"])
        .assert()
        .success()
        .stdout(predicate::str::contains("risk CRITICAL"))
        .stdout(predicate::str::contains("direct:   dev"));
    ids(&dir)
        .args(["impact", "ghost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'ghost' is not registered"));
}

#[test]
fn json_output_uses_camel_case_throughout() {
    let dir = fixture();
    let v = json_of(ids(&dir).args(["impact", "validate-story"]));
    assert_eq!(v["value"]["entityId"], "validate-story");
    assert_eq!(v["value"]["impact"]["directConsumers"][0], "dev");
    assert_eq!(v["value"]["impact"]["totalAffected"], 1);
    assert!(v["value"]["canAdapt"].is_object());

    let v = json_of(ids(&dir).args(["gate", "dev", "--title", "Story 1.1", "--ref", "dev"]));
    assert_eq!(v["status"], "pass");
    assert!(v["durationMs"].is_u64());
    assert!(v.get("duration_ms").is_none());

    let v = json_of(ids(&dir).arg("stats"));
    assert!(v["value"]["breakers"][0]["consecutiveFailures"].is_u64());
}

// ---------------------------------------------------------------------------
// ids register
// ---------------------------------------------------------------------------

#[test]
fn register_adds_entity_visible_to_check() {
    let dir = fixture();
    std::fs::write(dir.path().join("tasks/release-notes.md"), "Release notes for each release.\n")
        .unwrap();
    ids(&dir)
        .args([
            "register",
            "tasks/release-notes.md",
            "--type",
            "task",
            "--purpose",
            "Collect release notes",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 'release-notes' in tasks"));

    let v = json_of(ids(&dir).arg("stats"));
    assert_eq!(v["value"]["totalEntities"], 3);

    ids(&dir)
        .args(["check", "release notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("release-notes"));
}

#[test]
fn register_missing_file_fails() {
    let dir = fixture();
    ids(&dir)
        .args(["register", "tasks/nope.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

// ---------------------------------------------------------------------------
// ids health / heal / log / backups / rollback
// ---------------------------------------------------------------------------

#[test]
fn health_flags_checksum_mismatch() {
    let dir = fixture();
    ids(&dir)
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("Registry unhealthy"))
        .stdout(predicate::str::contains("checksum-mismatch"));
}

#[test]
fn dry_run_heal_writes_nothing() {
    let dir = fixture();
    ids(&dir)
        .args(["heal", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would heal"));
    assert_eq!(std::fs::read_to_string(registry_path(&dir)).unwrap(), REGISTRY);
    ids(&dir)
        .arg("backups")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups."));
}

#[test]
fn heal_then_rollback_restores_registry() {
    let dir = fixture();
    ids(&dir)
        .arg("heal")
        .assert()
        .success()
        .stdout(predicate::str::contains("Healed"));

    let health = json_of(ids(&dir).arg("health"));
    assert_eq!(health["value"]["report"]["summary"]["healthy"], true);
    assert_eq!(health["value"]["report"]["summary"]["total"], 0);

    let backups = json_of(ids(&dir).arg("backups"));
    let backups = backups.as_array().unwrap();
    assert_eq!(backups.len(), 1);
    let batch = backups[0]["batchId"].as_str().unwrap().to_string();

    let log = json_of(ids(&dir).args(["log", "--batch", &batch]));
    let entries = log.as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["batchId"] == batch.as_str()));

    ids(&dir)
        .args(["rollback", &batch])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored registry"));
    assert_eq!(std::fs::read_to_string(registry_path(&dir)).unwrap(), REGISTRY);

    ids(&dir)
        .args(["log", "--action", "rollback"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rollback"));
}

#[test]
fn rollback_unknown_batch_fails() {
    let dir = fixture();
    ids(&dir)
        .args(["rollback", "heal-20260101T000000000Z-deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rollback of batch"));
}

#[test]
fn log_rejects_unknown_action() {
    let dir = fixture();
    ids(&dir)
        .args(["log", "--action", "explode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown healing action 'explode'"));
}

// ---------------------------------------------------------------------------
// ids gate
// ---------------------------------------------------------------------------

#[test]
fn story_gate_needs_review_but_succeeds() {
    let dir = fixture();
    ids(&dir)
        .args(["gate", "story", "--title", "Validate story drafts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gate story-creation: needs_review"))
        .stdout(predicate::str::contains("candidates: validate-story"));
}

#[test]
fn validation_gate_fails_on_unknown_reference() {
    let dir = fixture();
    ids(&dir)
        .args(["gate", "validate", "--title", "Story 1.1", "--ref", "ghost"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("'ghost' is not registered"))
        .stderr(predicate::str::contains("gate 'story-validation' failed"));

    ids(&dir)
        .args([
            "gate",
            "validate",
            "--title",
            "Story 1.1",
            "--ref",
            "ghost",
            "--override",
            "lands in the same change",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("override accepted (was fail)"));
}

// ---------------------------------------------------------------------------
// ids stats / review / config
// ---------------------------------------------------------------------------

#[test]
fn stats_counts_categories() {
    let dir = fixture();
    let v = json_of(ids(&dir).arg("stats"));
    assert_eq!(v["value"]["totalEntities"], 2);
    assert_eq!(v["value"]["byCategory"]["agents"], 1);
    assert_eq!(v["value"]["breakers"].as_array().unwrap().len(), 3);
}

#[test]
fn review_reports_create_decisions() {
    let dir = fixture();
    ids(&dir)
        .arg("review")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reviewed"));
    ids(&dir)
        .args(["review", "--entity", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("dev: "));
}

#[test]
fn config_validate_flags_errors() {
    let dir = TempDir::new().unwrap();
    ids(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));

    std::fs::create_dir_all(dir.path().join(".ids")).unwrap();
    std::fs::write(dir.path().join(".ids/config.yaml"), "governor:\n  timeout_ms: 0\n").unwrap();
    ids(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("governor.timeout_ms=0"));
}
