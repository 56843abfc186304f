use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::Task;

/// Persistence adapter: the whole collection lives in one JSON document,
/// rewritten after every mutation.
#[derive(Debug)]
pub struct Storage {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl Storage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "[]\n")
                .with_context(|| format!("failed to seed {}", tasks_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened storage"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    /// Fails open: an unreadable or corrupt file yields the empty
    /// collection rather than an error.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Vec<Task> {
        let raw = match fs::read_to_string(&self.tasks_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    file = %self.tasks_path.display(),
                    error = %err,
                    "failed reading task file; starting empty"
                );
                return vec![];
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Err(err) => {
                warn!(
                    file = %self.tasks_path.display(),
                    error = %err,
                    "task file is not valid task JSON; starting empty"
                );
                vec![]
            }
        }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        debug!(file = %self.tasks_path.display(), count = tasks.len(), "saving tasks");

        let dir = self
            .tasks_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string_pretty(tasks)?;
        temp.write_all(serialized.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.flush()?;

        temp.persist(&self.tasks_path).map_err(|err| {
            anyhow!("failed to persist {}: {}", self.tasks_path.display(), err)
        })?;

        Ok(())
    }
}
