use directories::ProjectDirs;
use std::path::PathBuf;

pub fn data_root() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("com", "studymode", "StudyMode") {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn default_store_file() -> (PathBuf, PathBuf) {
    let root = data_root();
    (root.join("cards.json"), root.join("backups"))
}

pub fn default_sqlite_file() -> PathBuf {
    data_root().join("srs.db")
}

pub fn default_config_file() -> PathBuf {
    data_root().join("studymode.toml")
}
