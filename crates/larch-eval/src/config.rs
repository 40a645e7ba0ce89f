use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "config.toml";
pub const INIT_SCRIPT: &str = "init.lar";

fn default_history_file() -> String {
    "history.lar".to_string()
}

fn default_history_size() -> usize {
    5000
}

fn default_use_color() -> bool {
    true
}

/// Settings read from `<larchdir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LarchConfig {
    /// Extra startup scripts, run after the site and user scripts.
    #[serde(default)]
    pub init_files: Vec<String>,
    /// Directories searched by `import`, ahead of `.`.
    #[serde(default)]
    pub modules_path: Vec<String>,
    /// REPL history, relative to the larch directory unless absolute.
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_use_color")]
    pub use_color: bool,
}

impl Default for LarchConfig {
    fn default() -> Self {
        LarchConfig {
            init_files: Vec::new(),
            modules_path: Vec::new(),
            history_file: default_history_file(),
            history_size: default_history_size(),
            use_color: default_use_color(),
        }
    }
}

impl LarchConfig {
    /// Load from the user's larch directory. A missing file gives the
    /// defaults; an unreadable or malformed one is reported and ignored.
    pub fn load() -> Self {
        match larch_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_FILE)),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config file");
                return Self::default();
            }
        };
        match Self::parse(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        let file = PathBuf::from(&self.history_file);
        if file.is_absolute() {
            return Some(file);
        }
        larch_dir().map(|dir| dir.join(file))
    }

    /// Startup scripts in the order they run: site-wide, per-user, then
    /// the configured extras. Paths that do not exist are skipped when run.
    pub fn init_scripts(&self) -> Vec<PathBuf> {
        let mut scripts = Vec::new();
        if let Some(site) = site_init_script() {
            scripts.push(site);
        }
        if let Some(dir) = larch_dir() {
            scripts.push(dir.join(INIT_SCRIPT));
        }
        scripts.extend(self.init_files.iter().map(|file| expand_home(file)));
        scripts
    }
}

/// `$LARCHDIR`, else `~/.larch`.
pub fn larch_dir() -> Option<PathBuf> {
    match env::var_os("LARCHDIR") {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".larch")),
    }
}

/// `$LARCH_SITE_INIT`, else `<config dir>/larch/init.lar`.
pub fn site_init_script() -> Option<PathBuf> {
    match env::var_os("LARCH_SITE_INIT") {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => dirs::config_dir().map(|dir| dir.join("larch").join(INIT_SCRIPT)),
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = LarchConfig::parse("modules_path = ['/opt/larch/modules']").unwrap();
        assert_eq!(config.modules_path, vec!["/opt/larch/modules".to_string()]);
        assert_eq!(config.history_size, 5000);
        assert!(config.use_color);
        assert!(config.init_files.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "init_files = ['a.lar', 'b.lar']\nuse_color = false\n").unwrap();
        let config = LarchConfig::load_from(&path);
        assert_eq!(config.init_files.len(), 2);
        assert!(!config.use_color);
    }

    #[test]
    fn test_malformed_or_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(LarchConfig::load_from(&path), LarchConfig::default());
        fs::write(&path, "history_size = 'many'").unwrap();
        assert_eq!(LarchConfig::load_from(&path), LarchConfig::default());
    }

    #[test]
    fn test_extra_init_files_run_last() {
        let config = LarchConfig {
            init_files: vec!["/tmp/extra.lar".into()],
            ..LarchConfig::default()
        };
        let scripts = config.init_scripts();
        assert_eq!(scripts.last(), Some(&PathBuf::from("/tmp/extra.lar")));
    }
}
