//! Results-tree aggregation on real directories.

use std::fs;
use std::path::Path;

use embodied_eval::results::{combine, combine_to_file, write_combined};
use embodied_eval::Error;
use serde_json::{json, Value};

fn write_summary(root: &Path, model: &str, task: &str, summary: &Value) {
    let dir = root.join(model).join(task).join("results");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("summary.json"), serde_json::to_string_pretty(summary).unwrap()).unwrap();
}

fn two_by_two(root: &Path) {
    write_summary(root, "gpt-4o_baseline", "base", &json!({"success_rate": 0.56, "num_episodes": 50}));
    write_summary(root, "gpt-4o_baseline", "long_horizon", &json!({"success_rate": 0.54, "num_episodes": 50}));
    write_summary(root, "claude-3-5-sonnet", "base", &json!({"success_rate": 0.64, "num_episodes": 50}));
    write_summary(root, "claude-3-5-sonnet", "long_horizon", &json!({"success_rate": 0.52, "num_episodes": 50}));
}

#[test]
fn test_two_models_two_tasks() {
    let tmp = tempfile::tempdir().unwrap();
    two_by_two(tmp.path());
    let out = tmp.path().join("out").join("combined_results.json");

    assert!(combine_to_file(tmp.path().join("missing"), &out).is_err());
    assert!(!out.exists());

    let combined = combine(tmp.path()).unwrap();
    assert_eq!(combined.task_count(), 4);
    write_combined(&combined, &out).unwrap();

    let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({
            "claude-3-5-sonnet": {
                "base": {"success_rate": 0.64, "num_episodes": 50},
                "long_horizon": {"success_rate": 0.52, "num_episodes": 50}
            },
            "gpt-4o_baseline": {
                "base": {"success_rate": 0.56, "num_episodes": 50},
                "long_horizon": {"success_rate": 0.54, "num_episodes": 50}
            }
        })
    );
}

#[test]
fn test_rerun_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("running").join("eb_alfred");
    two_by_two(&root);
    let out = tmp.path().join("combined_results.json");

    combine_to_file(&root, &out).unwrap();
    let first = fs::read(&out).unwrap();
    combine_to_file(&root, &out).unwrap();
    let second = fs::read(&out).unwrap();
    assert_eq!(first, second);
    assert!(String::from_utf8(first).unwrap().starts_with("{\n    \"claude-3-5-sonnet\": {"));
}

#[test]
fn test_missing_summary_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("running");
    two_by_two(&root);
    fs::create_dir_all(root.join("gpt-4o_baseline").join("spatial")).unwrap();
    let out = tmp.path().join("combined_results.json");

    match combine_to_file(&root, &out).unwrap_err() {
        Error::MissingResultFile { path } => {
            assert!(path.ends_with("gpt-4o_baseline/spatial/results/summary.json"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());
}

#[test]
fn test_existing_report_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("running");
    write_summary(&root, "m", "t", &json!({"success_rate": 1.0}));
    let out = tmp.path().join("combined_results.json");
    fs::write(&out, "stale").unwrap();

    combine_to_file(&root, &out).unwrap();
    let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["m"]["t"]["success_rate"], 1.0);
}

#[test]
fn test_success_flags_four_leaves() {
    let tmp = tempfile::tempdir().unwrap();
    for model in ["model_a", "model_b"] {
        write_summary(tmp.path(), model, "task_1", &json!({"success": true}));
        write_summary(tmp.path(), model, "task_2", &json!({"success": false}));
    }
    let combined = combine(tmp.path()).unwrap();
    assert_eq!(combined.task_count(), 4);
    for model in ["model_a", "model_b"] {
        assert_eq!(combined.get(model, "task_1"), Some(&json!({"success": true})));
        assert_eq!(combined.get(model, "task_2"), Some(&json!({"success": false})));
    }
}
