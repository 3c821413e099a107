//! Results aggregation: fold per-task summaries into one report.
//!
//! The results tree is exactly two directory levels deep:
//!
//! ```text
//! <root>/<model>/<task>/results/summary.json
//! ```
//!
//! Every task directory must contain its summary. The whole tree is read and parsed
//! before anything is written, so a bad tree never leaves a partial report behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, ErrorContext};
use crate::Result;

pub const DEFAULT_RESULTS_ROOT: &str = "./running/eb_alfred/";
pub const DEFAULT_OUTPUT_FILE: &str = "./embodiedbench/combined_results.json";

/// Summary location relative to a task directory.
pub const SUMMARY_RELATIVE_PATH: [&str; 2] = ["results", "summary.json"];

/// Model name → task id → that task's summary document.
///
/// Both levels are sorted, which makes the serialized report deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinedResults {
    models: BTreeMap<String, BTreeMap<String, Value>>,
}

impl CombinedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, task: impl Into<String>, summary: Value) {
        self.models
            .entry(model.into())
            .or_default()
            .insert(task.into(), summary);
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn tasks(&self, model: &str) -> Option<&BTreeMap<String, Value>> {
        self.models.get(model)
    }

    pub fn get(&self, model: &str, task: &str) -> Option<&Value> {
        self.models.get(model)?.get(task)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn task_count(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    /// The report as written to disk: pretty JSON with a 4-space indent.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Subdirectories of `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn read_summary(task_dir: &Path) -> Result<Value> {
    let path = SUMMARY_RELATIVE_PATH
        .iter()
        .fold(task_dir.to_path_buf(), |p, part| p.join(part));
    if !path.is_file() {
        return Err(Error::MissingResultFile { path });
    }
    debug!(path = %path.display(), "reading task summary");
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| Error::InvalidResultFile {
        path,
        reason: e.to_string(),
    })
}

/// Read every `<model>/<task>/results/summary.json` under `root`.
///
/// Models without any task directory are left out of the report.
pub fn combine(root: impl AsRef<Path>) -> Result<CombinedResults> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::configuration_with_context(
            format!("results root is not a directory: {}", root.display()),
            ErrorContext::new()
                .with_field_path("results_root")
                .with_source("results"),
        ));
    }

    let mut combined = CombinedResults::new();
    for (model, model_dir) in subdirectories(root)? {
        info!(model = model.as_str(), dir = %model_dir.display(), "combining results");
        for (task, task_dir) in subdirectories(&model_dir)? {
            let summary = read_summary(&task_dir)?;
            combined.insert(model.clone(), task, summary);
        }
    }
    Ok(combined)
}

/// Write `results` to `output` atomically via a temporary file in the same directory.
pub fn write_combined(results: &CombinedResults, output: impl AsRef<Path>) -> Result<()> {
    let output = output.as_ref();
    let json = results.to_json_string()?;

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(|e| Error::Io(e.error))?;

    info!(
        path = %output.display(),
        models = results.model_count(),
        tasks = results.task_count(),
        "saved combined results"
    );
    Ok(())
}

/// [`combine`] then [`write_combined`]. Nothing is written if combining fails.
pub fn combine_to_file(root: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<CombinedResults> {
    let results = combine(root)?;
    write_combined(&results, output)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_summary(root: &Path, model: &str, task: &str, body: &str) {
        let dir = root.join(model).join(task).join("results");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("summary.json"), body).unwrap();
    }

    #[test]
    fn test_combine_two_levels() {
        let tmp = tempfile::tempdir().unwrap();
        write_summary(tmp.path(), "gpt-4o_baseline", "base", r#"{"success_rate": 0.5}"#);
        write_summary(tmp.path(), "gpt-4o_baseline", "spatial", r#"{"success_rate": 0.25}"#);

        let combined = combine(tmp.path()).unwrap();
        assert_eq!(combined.model_count(), 1);
        assert_eq!(combined.task_count(), 2);
        assert_eq!(combined.get("gpt-4o_baseline", "base").unwrap(), &json!({"success_rate": 0.5}));
    }

    #[test]
    fn test_model_without_tasks_is_omitted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("empty_model")).unwrap();
        write_summary(tmp.path(), "claude", "base", "{}");
        let combined = combine(tmp.path()).unwrap();
        assert_eq!(combined.models().collect::<Vec<_>>(), vec!["claude"]);
    }

    #[test]
    fn test_stray_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        write_summary(tmp.path(), "m", "t", "{}");
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join("m").join("log.txt"), "x").unwrap();
        assert_eq!(combine(tmp.path()).unwrap().task_count(), 1);
    }

    #[test]
    fn test_missing_summary_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("m").join("t")).unwrap();
        match combine(tmp.path()).unwrap_err() {
            Error::MissingResultFile { path } => assert!(path.ends_with("m/t/results/summary.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparsable_summary_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_summary(tmp.path(), "m", "t", "{not json");
        assert!(matches!(combine(tmp.path()), Err(Error::InvalidResultFile { .. })));
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            combine(tmp.path().join("nope")),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_report_uses_four_space_indent() {
        let mut results = CombinedResults::new();
        results.insert("m", "t", json!({"a": 1}));
        let text = results.to_json_string().unwrap();
        assert_eq!(text, "{\n    \"m\": {\n        \"t\": {\n            \"a\": 1\n        }\n    }\n}");
    }

    #[test]
    fn test_write_creates_parent_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("embodiedbench").join("combined_results.json");
        let mut results = CombinedResults::new();
        results.insert("m", "t", json!({}));
        write_combined(&results, &out).unwrap();

        let entries: Vec<_> = fs::read_dir(out.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let back: CombinedResults = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back, results);
    }
}
