use anyhow::Result;
use std::env::var;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "screentime";

/// Resolves application file locations under the user's home directory.
#[derive(Clone)]
pub struct DataStorage {
    base_path: PathBuf,
}

impl DataStorage {
    pub fn new() -> Self {
        let base_path = Path::new(&Self::home_dir()).join(".config").join(APP_NAME);
        Self { base_path }
    }

    /// Path of a file inside the application config directory, creating
    /// the directory on first use.
    pub fn get_path(&self, file_name: &str) -> Result<PathBuf> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
        }
        Ok(self.base_path.join(file_name))
    }

    pub fn home_dir() -> String {
        var("HOME").unwrap_or_else(|_| ".".into())
    }
}

impl Default for DataStorage {
    fn default() -> Self {
        Self::new()
    }
}
