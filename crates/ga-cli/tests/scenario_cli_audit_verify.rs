//! `ga audit verify` over a mirror written by `JsonlAuditSink`.

use assert_cmd::prelude::*;
use chrono::Utc;
use ga_audit::{AuditSink, JsonlAuditSink};
use ga_schemas::{AuditAction, AuditLogEntry, Micros, ProcedureStatus};
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

fn entry(entry_id: i64) -> AuditLogEntry {
    AuditLogEntry {
        entry_id,
        guide_id: Uuid::new_v4(),
        procedure_id: Uuid::new_v4(),
        tariff_code: "10101012".to_string(),
        action: AuditAction::Approve,
        previous_status: ProcedureStatus::Pending,
        new_status: ProcedureStatus::Approved,
        billed_value: Micros::from_units(150),
        approved_value: Some(Micros::from_units(100)),
        rejection_category: None,
        rejection_reason: None,
        actor: "auditor.ana".to_string(),
        ts_utc: Utc::now(),
    }
}

fn write_mirror(path: &std::path::Path, n: i64) {
    let sink = JsonlAuditSink::open(path, true).unwrap();
    for i in 1..=n {
        sink.record(&entry(i)).unwrap();
    }
}

#[test]
fn intact_chain_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decisions.jsonl");
    write_mirror(&path, 3);

    Command::cargo_bin("ga")
        .unwrap()
        .args(["audit", "verify", "--path", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("chain_valid=true lines=3"));
}

#[test]
fn edited_line_breaks_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decisions.jsonl");
    write_mirror(&path, 3);

    let content = std::fs::read_to_string(&path).unwrap();
    let tampered = content.replacen("auditor.ana", "auditor.eve", 1);
    assert_ne!(content, tampered);
    std::fs::write(&path, tampered).unwrap();

    Command::cargo_bin("ga")
        .unwrap()
        .args(["audit", "verify", "--path", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("chain_valid=false line=1"));
}
