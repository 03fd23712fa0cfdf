//! Builder for creating and configuring Store instances.

use std::path::{Path, PathBuf};

use tokio::task;

use super::{DATABASE_FILE, Store};
use crate::{
    db::Database,
    error::{IoResultExt, Result, TermoraError},
};

/// Builder for creating and configuring Store instances.
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    data_dir: Option<PathBuf>,
}

impl StoreBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom data directory.
    ///
    /// If not specified, uses the XDG Base Directory specification:
    /// `$XDG_DATA_HOME/termora` or `~/.local/share/termora`
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.data_dir = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Creates the directory layout and initializes the database.
    ///
    /// # Errors
    ///
    /// Returns `TermoraError::FileSystem` if the directories cannot be created
    /// Returns `TermoraError::Database` if database initialization fails
    pub async fn build(self) -> Result<Store> {
        let data_dir = match self.data_dir {
            Some(path) => path,
            None => Self::default_data_dir()?,
        };

        let store = Store::new(data_dir);
        for dir in [store.data_dir().to_path_buf(), store.blob_dir()] {
            std::fs::create_dir_all(&dir).fs_context(&dir)?;
        }

        let db_path = store.db_path();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path)?;
            Ok::<(), TermoraError>(())
        })
        .await
        .map_err(TermoraError::join)??;

        Ok(store)
    }

    /// Returns the default data directory following the XDG Base Directory
    /// specification.
    fn default_data_dir() -> Result<PathBuf> {
        let db_path = xdg::BaseDirectories::with_prefix("termora")
            .place_data_file(DATABASE_FILE)
            .map_err(|e| TermoraError::XdgDirectory(e.to_string()))?;
        db_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| TermoraError::XdgDirectory("data file has no parent".to_string()))
    }
}
