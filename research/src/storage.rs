//! Per-run folder holding the durable outputs of each stage.
//!
//! Every file is rewritten in full after the stage that owns it completes,
//! via a temporary file and a rename, so a crash leaves the previous
//! complete version in place.

use crate::Result;
use crate::model::{FinalReport, SynthesisMap};
use crate::task::Task;
use agent::Evidence;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const TASKS_FILE: &str = "tasks.json";
pub const RETRIEVAL_FILE: &str = "retrieval_results.json";
pub const SYNTHESIS_FILE: &str = "synthesis_results.json";
pub const GAPS_FILE: &str = "gap_results.json";
pub const REPORT_FILE: &str = "final_report.json";

const MAX_SLUG_LEN: usize = 80;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Filesystem-safe folder name for a topic. Deterministic, so the same topic
/// always maps to the same folder and different topics never share one
/// unless they differ only in punctuation or case.
pub fn slug(topic: &str) -> String {
    let lowered = topic.to_lowercase();
    let collapsed = NON_ALNUM.replace_all(&lowered, "_");
    let trimmed = collapsed.trim_matches('_');
    trimmed[..trimmed.len().min(MAX_SLUG_LEN)]
        .trim_end_matches('_')
        .to_string()
}

/// What the service returns for a finished run.
#[derive(Debug, Serialize)]
pub struct RunBundle {
    pub tasks: Value,
    pub synthesis: Value,
    pub report: Value,
}

pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Folder for `slug` under `root`, without touching the filesystem.
    pub fn locate(root: &Path, slug: &str) -> Self {
        Self {
            dir: root.join(slug),
        }
    }

    /// Creates the run folder and drops any report left by an earlier run of
    /// the same topic, so a failed run never exposes a stale report.
    pub fn open(root: &Path, slug: &str) -> Result<Self> {
        let store = Self::locate(root, slug);
        fs::create_dir_all(&store.dir)?;

        match fs::remove_file(store.dir.join(REPORT_FILE)) {
            Ok(()) => tracing::debug!(dir = %store.dir.display(), "removed stale report"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.write_json(TASKS_FILE, tasks)
    }

    pub fn write_retrieval(&self, retrieval: &IndexMap<String, Vec<Evidence>>) -> Result<()> {
        self.write_json(RETRIEVAL_FILE, retrieval)
    }

    pub fn write_synthesis(&self, synthesis: &SynthesisMap) -> Result<()> {
        self.write_json(SYNTHESIS_FILE, synthesis)
    }

    pub fn write_gaps<T: Serialize + ?Sized>(&self, gaps: &T) -> Result<()> {
        self.write_json(GAPS_FILE, gaps)
    }

    pub fn write_report(&self, report: &FinalReport) -> Result<()> {
        self.write_json(REPORT_FILE, report)
    }

    /// `None` when the run produced no report.
    pub fn load_bundle(&self) -> Result<Option<RunBundle>> {
        if !self.dir.join(REPORT_FILE).exists() {
            return Ok(None);
        }

        Ok(Some(RunBundle {
            report: self.read_json(REPORT_FILE)?,
            tasks: self.read_json(TASKS_FILE)?,
            synthesis: self.read_json(SYNTHESIS_FILE)?,
        }))
    }

    fn read_json(&self, name: &str) -> Result<Value> {
        let bytes = fs::read(self.dir.join(name))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));

        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{REPORT_FILE, RunStore, TASKS_FILE, slug};
    use crate::Result;
    use crate::task::Task;
    use serde_json::json;

    #[test]
    fn test_slug() {
        assert_eq!(
            slug("Impacts of renewable energy adoption"),
            "impacts_of_renewable_energy_adoption"
        );
        assert_eq!(slug("  AI & Science: what's next?! "), "ai_science_what_s_next");
        assert_eq!(slug("Énergie solaire"), "nergie_solaire");
        assert_eq!(slug("?!"), "");
    }

    #[test]
    fn test_slug_is_bounded() {
        let long = "word ".repeat(40);
        let s = slug(&long);
        assert!(s.len() <= 80);
        assert!(!s.ends_with('_'));
        assert!(s.starts_with("word_word"));
    }

    #[test]
    fn test_open_removes_stale_report() -> Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("solar");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(REPORT_FILE), "{}")?;
        std::fs::write(dir.join(TASKS_FILE), "[]")?;

        let store = RunStore::open(root.path(), "solar")?;

        assert!(!dir.join(REPORT_FILE).exists());
        assert!(dir.join(TASKS_FILE).exists());
        assert!(store.load_bundle()?.is_none());
        Ok(())
    }

    #[test]
    fn test_write_tasks_round_trips_through_bundle() -> Result<()> {
        let root = tempfile::tempdir()?;
        let store = RunStore::open(root.path(), "wind")?;

        store.write_tasks(&[Task::research("Map wind farms", 6)])?;
        store.write_synthesis(&Default::default())?;
        std::fs::write(
            store.dir().join(REPORT_FILE),
            r#"{"executive_summary": "ok"}"#,
        )?;

        let bundle = store.load_bundle()?.expect("report was written");
        assert_eq!(bundle.tasks[0]["description"], json!("Map wind farms"));
        assert_eq!(bundle.synthesis, json!({}));
        assert_eq!(bundle.report["executive_summary"], json!("ok"));
        Ok(())
    }
}
