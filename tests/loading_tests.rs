// SPDX-License-Identifier: PMPL-1.0-or-later

//! Config and scenario files driving a real engine

use burndevice::audit::{AuditAction, AuditRecord};
use burndevice::config::Config;
use burndevice::scenario::Scenario;
use burndevice::{CancelToken, DestructionEngine, PathMatching, Severity};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn config_file_builds_engine_with_jsonl_audit() {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let audit_path = root.join("audit").join("trail.jsonl");
    let config_path = write(
        &root,
        "burndevice.yaml",
        &format!(
            "log_level: warn\nsecurity:\n  max_severity: HIGH\n  allowed_targets: [\"{}\"]\n  audit_path: \"{}\"\n",
            root.join("work").display(),
            audit_path.display()
        ),
    );
    fs::create_dir(root.join("work")).unwrap();
    let victim = write(&root.join("work"), "old.log", "rotate me");

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.security.path_matching, PathMatching::Segment);
    let engine = DestructionEngine::from_config(&config).unwrap();
    assert_eq!(engine.policy().severity_ceiling, Severity::High);

    let scenario_path = write(
        &root,
        "cleanup.json",
        &format!(
            r#"{{
                "id": "cleanup-1",
                "description": "rotate logs then stress disk",
                "severity": "MEDIUM",
                "steps": [
                    {{"order": 2, "type": "DISK_FILL", "targets": ["{work}"], "risk": "MEDIUM"}},
                    {{"order": 1, "type": "FILE_DELETION", "targets": ["{victim}"], "rationale": "stale"}}
                ],
                "warnings": ["disk fill is simulated"]
            }}"#,
            work = root.join("work").display(),
            victim = victim.display()
        ),
    );
    let scenario = Scenario::load(&scenario_path).unwrap();

    let responses: Vec<_> = scenario
        .requests(true)
        .iter()
        .map(|request| engine.execute(request, &CancelToken::new()))
        .collect();
    assert!(responses.iter().all(|r| r.success));
    assert!(!victim.exists());

    let trail = fs::read_to_string(&audit_path).unwrap();
    let records: Vec<AuditRecord> = trail
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.action == AuditAction::DestructionExecuted
            && r.scenario_reference.as_deref() == Some("cleanup-1")));
    assert_eq!(records[0].targets, vec![victim.to_string_lossy().into_owned()]);
}

#[test]
fn scenario_steps_still_face_the_policy() {
    let dir = TempDir::new().unwrap();
    let scenario_path = write(
        dir.path(),
        "wipe.yaml",
        "id: wipe\nseverity: CRITICAL\nsteps:\n  - order: 1\n    type: BOOT_CORRUPTION\n    targets: [/boot/grub]\n",
    );
    let scenario = Scenario::load(&scenario_path).unwrap();
    let engine = DestructionEngine::from_config(&Config {
        security: burndevice::config::SecurityConfig {
            audit_log: false,
            ..Default::default()
        },
        ..Config::default()
    })
    .unwrap();

    let response = engine.execute(&scenario.requests(true)[0], &CancelToken::new());
    assert!(!response.success);
    assert!(response.message.contains("severity exceeds maximum allowed"));
}

#[test]
fn default_config_blocks_system_paths() {
    let engine = DestructionEngine::from_config(&Config::default()).unwrap();
    let request = burndevice::DestructionRequest::new(
        burndevice::DestructionCategory::FileDeletion,
        ["/usr/bin/env"],
    )
    .confirmed(true);

    let verdict = engine.check(&request);
    assert!(verdict.unwrap_err().to_string().contains("blocked"));
    assert_eq!(engine.registry().count(), 0);
}
