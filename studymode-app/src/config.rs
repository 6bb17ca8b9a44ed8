//! Settings resolution: built-in defaults, then an optional TOML file, then
//! command-line flags.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use studymode_json::paths;
use tracing::info;

pub const CONFIG_ENV: &str = "STUDYMODE_CONFIG";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Json,
    Sqlite,
}

/// Shape of `studymode.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub store: Option<StoreKind>,
    pub json_path: Option<PathBuf>,
    pub backups_dir: Option<PathBuf>,
    pub max_backups: Option<usize>,
    pub db_path: Option<PathBuf>,
    pub api_addr: Option<String>,
}

/// Flag values that override the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub store: Option<StoreKind>,
    pub json_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub store: StoreKind,
    pub json_path: PathBuf,
    pub backups_dir: PathBuf,
    pub max_backups: usize,
    pub db_path: PathBuf,
    pub api_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        let (json_path, backups_dir) = paths::default_store_file();
        Self {
            store: StoreKind::Json,
            json_path,
            backups_dir,
            max_backups: DEFAULT_MAX_BACKUPS,
            db_path: paths::default_sqlite_file(),
            api_addr: DEFAULT_API_ADDR.to_string(),
        }
    }
}

impl Settings {
    /// Resolves settings. An explicitly named config file must exist; the
    /// default location is optional.
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let file = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(p) => {
                if !p.exists() {
                    bail!("config file not found: {}", p.display());
                }
                Some(read_file(&p)?)
            }
            None => {
                let p = paths::default_config_file();
                if p.exists() { Some(read_file(&p)?) } else { None }
            }
        };
        Ok(Self::default().merge(file.unwrap_or_default(), overrides))
    }

    pub fn merge(mut self, file: FileConfig, flags: Overrides) -> Self {
        if let Some(v) = file.store { self.store = v; }
        if let Some(v) = file.json_path { self.json_path = v; }
        if let Some(v) = file.backups_dir { self.backups_dir = v; }
        if let Some(v) = file.max_backups { self.max_backups = v; }
        if let Some(v) = file.db_path { self.db_path = v; }
        if let Some(v) = file.api_addr { self.api_addr = v; }

        if let Some(v) = flags.store { self.store = v; }
        if let Some(v) = flags.json_path { self.json_path = v; }
        if let Some(v) = flags.db_path { self.db_path = v; }
        self
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "loaded config file");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_then_flags() {
        let file: FileConfig = toml::from_str(
            r#"
            store = "sqlite"
            db_path = "/tmp/from-file.db"
            api_addr = "0.0.0.0:9000"
            "#,
        )
        .unwrap();
        let flags = Overrides {
            db_path: Some(PathBuf::from("/tmp/from-flag.db")),
            ..Overrides::default()
        };
        let s = Settings::default().merge(file, flags);
        assert_eq!(s.store, StoreKind::Sqlite);
        assert_eq!(s.db_path, PathBuf::from("/tmp/from-flag.db"));
        assert_eq!(s.api_addr, "0.0.0.0:9000");
        assert_eq!(s.max_backups, DEFAULT_MAX_BACKUPS);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load(Some(&missing), Overrides::default()).is_err());
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("studymode.toml");
        std::fs::write(&p, "store = \"json\"\nmax_backups = 2\n").unwrap();
        let s = Settings::load(Some(&p), Overrides::default()).unwrap();
        assert_eq!(s.store, StoreKind::Json);
        assert_eq!(s.max_backups, 2);
    }
}
