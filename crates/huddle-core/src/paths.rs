//! Data directory layout.

use std::path::PathBuf;

use anyhow::Result;
use directories::ProjectDirs;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "HUDDLE_DATA_DIR";

#[derive(Debug, Clone)]
pub struct HuddlePaths {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl HuddlePaths {
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Self::from_base(PathBuf::from(dir));
        }
        if let Some(dirs) = ProjectDirs::from("", "", "Huddle") {
            return Self::from_base(dirs.data_dir().to_path_buf());
        }
        Self::from_base(PathBuf::from(".huddle"))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let db_path = base_dir.join("huddle.db");
        let config_path = base_dir.join("huddle.toml");
        Self {
            base_dir,
            db_path,
            config_path,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}
