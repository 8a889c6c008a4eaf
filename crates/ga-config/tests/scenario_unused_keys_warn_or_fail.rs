use ga_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

/// scenario_unused_keys_warn_or_fail
///
/// Validates:
/// 1) Unused keys are reported under Warn without error.
/// 2) Unused keys fail under Fail.
/// 3) Keys the engine reads are never flagged.
/// 4) Unused pointers come back sorted.

#[test]
fn warn_policy_reports_unused_keys_without_error() {
    let yaml = r#"
reconcile:
  value_tolerance_bps: 500
  legacy_mode: true

unused_section:
  foo: 123
  bar: 456
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn policy must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/reconcile/legacy_mode".to_string(),
            "/unused_section/bar".to_string(),
            "/unused_section/foo".to_string(),
        ]
    );
}

#[test]
fn fail_policy_errors_on_unused_keys() {
    let yaml = r#"
audit:
  jsonl_path: "target/audit.jsonl"
  rotate_daily: true
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .expect_err("fail policy must error on unused keys");
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "got: {msg}");
    assert!(msg.contains("/audit/rotate_daily"), "got: {msg}");
}

#[test]
fn fully_consumed_config_is_clean() {
    let yaml = r#"
reconcile:
  value_tolerance_bps: 300
  duplicate_policy: sequence_window
  duplicate_window: 1
reference:
  tables_path: "config/reference_tables.yaml"
contracts:
  path: "config/contracts.yaml"
audit:
  jsonl_path: "target/audit.jsonl"
  hash_chain: true
database:
  url_env: "GA_DATABASE_URL"
daemon:
  bind_addr: "127.0.0.1:8899"
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .expect("every key is consumed");
    assert!(report.is_clean());
}
