use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

use crate::task::Priority;
use crate::view::SortKey;

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("data.location".to_string(), "~/.taskdeck".to_string());
        cfg.map
            .insert("default.command".to_string(), "list".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());
        cfg.map
            .insert("default.category".to_string(), "Work".to_string());
        cfg.map
            .insert("default.priority".to_string(), "low".to_string());
        cfg.map
            .insert("default.sort".to_string(), "due".to_string());

        match resolve_rc_path(rc_override)? {
            Some(path) => {
                info!(rc = %path.display(), "loading rc file");
                cfg.load_file(&path)?;
            }
            None => {
                debug!("no rc file found; using defaults");
            }
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn default_category(&self) -> String {
        self.get("default.category")
            .unwrap_or_else(|| "Work".to_string())
    }

    /// An unparseable value falls back rather than failing startup.
    pub fn default_priority(&self) -> Priority {
        self.get("default.priority")
            .and_then(|v| v.parse().ok())
            .unwrap_or(Priority::Low)
    }

    pub fn default_sort(&self) -> SortKey {
        self.get("default.sort")
            .and_then(|v| v.parse().ok())
            .unwrap_or(SortKey::DueDate)
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let line = raw_line
                .split_once('#')
                .map(|(before, _)| before)
                .unwrap_or(raw_line)
                .trim();
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        home_dir()?.join(".taskdeck")
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("TASKDECKRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let candidate = home_dir()?.join(".taskdeckrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    warn!("no rc file present");
    Ok(None)
}

fn home_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::Config;
    use crate::task::Priority;
    use crate::view::SortKey;

    #[test]
    fn defaults_are_seeded() {
        let cfg = Config::load(Some(Path::new("/dev/null"))).expect("load");
        assert_eq!(cfg.get("default.command").as_deref(), Some("list"));
        assert_eq!(cfg.default_category(), "Work");
        assert_eq!(cfg.default_priority(), Priority::Low);
        assert_eq!(cfg.default_sort(), SortKey::DueDate);
        assert_eq!(cfg.get_bool("color"), Some(true));
    }

    #[test]
    fn rc_file_and_overrides_win_over_defaults() {
        let mut rc = tempfile::NamedTempFile::new().expect("temp rc");
        writeln!(rc, "# comment").expect("write");
        writeln!(rc, "default.category = Personal  # inline").expect("write");
        writeln!(rc, "default.priority = high").expect("write");
        writeln!(rc, "default.sort = completed").expect("write");
        writeln!(rc, "color = off").expect("write");
        rc.flush().expect("flush");

        let mut cfg = Config::load(Some(rc.path())).expect("load");
        assert_eq!(cfg.default_category(), "Personal");
        assert_eq!(cfg.default_priority(), Priority::High);
        assert_eq!(cfg.default_sort(), SortKey::Completed);
        assert_eq!(cfg.get_bool("color"), Some(false));

        cfg.apply_overrides([("rc.color".to_string(), "on".to_string())]);
        assert_eq!(cfg.get_bool("color"), Some(true));
    }

    #[test]
    fn unparseable_defaults_fall_back() {
        let mut rc = tempfile::NamedTempFile::new().expect("temp rc");
        writeln!(rc, "default.priority = urgent").expect("write");
        writeln!(rc, "default.sort = shuffled").expect("write");
        rc.flush().expect("flush");

        let cfg = Config::load(Some(rc.path())).expect("load");
        assert_eq!(cfg.default_priority(), Priority::Low);
        assert_eq!(cfg.default_sort(), SortKey::DueDate);
    }

    #[test]
    fn include_pulls_in_relative_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("extra.rc"), "default.category = Errands\n")
            .expect("write extra");
        let rc_path = dir.path().join("main.rc");
        std::fs::write(
            &rc_path,
            "color = off\ninclude extra.rc\ninclude missing.rc\n",
        )
        .expect("write main");

        let cfg = Config::load(Some(&rc_path)).expect("load");
        assert_eq!(cfg.default_category(), "Errands");
        assert_eq!(cfg.get_bool("color"), Some(false));
        // the missing include is skipped, the rest both loaded
        assert_eq!(cfg.loaded_files.len(), 2);
    }

    #[test]
    fn malformed_rc_line_is_an_error() {
        let mut rc = tempfile::NamedTempFile::new().expect("temp rc");
        writeln!(rc, "no equals sign here").expect("write");
        rc.flush().expect("flush");

        assert!(Config::load(Some(rc.path())).is_err());
    }
}
