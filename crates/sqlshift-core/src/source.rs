use std::path::{Path, PathBuf};

use sqlshift_common::{Error, Result};
use tracing::debug;

use crate::migration::{DOWN_FILE, Migration, Migrations, UP_FILE};

/// Produces every known migration, in ascending version order.
pub trait Source {
    fn collect(&self) -> Result<Migrations>;
}

/// Reads migrations from a folder holding one `<version>_<name>` directory
/// per migration.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    migrations_folder: PathBuf,
}

impl FileSystemSource {
    pub fn new(migrations_folder: impl Into<PathBuf>) -> Self {
        Self {
            migrations_folder: migrations_folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.migrations_folder
    }

    /// Scaffold the directory for a freshly generated migration, with empty
    /// up and down files. Returns the directory that was created.
    ///
    /// Refuses a version the folder already holds and never touches an
    /// existing directory.
    pub fn create(&self, migration: &Migration) -> Result<PathBuf> {
        if !migration.persistable() {
            return Err(Error::Other(format!(
                "migration {} has no path to create",
                migration.version
            )));
        }

        if self.collect()?.get(migration.version).is_some() {
            return Err(Error::DuplicateVersion(migration.version));
        }

        std::fs::create_dir_all(&self.migrations_folder)?;
        let dir = self.migrations_folder.join(&migration.path);
        std::fs::create_dir(&dir)?;
        std::fs::write(dir.join(UP_FILE), &migration.up_sql)?;
        std::fs::write(dir.join(DOWN_FILE), &migration.down_sql)?;
        Ok(dir)
    }
}

impl Source for FileSystemSource {
    /// Stops at the first directory that is not a valid migration.
    fn collect(&self) -> Result<Migrations> {
        let entries = match std::fs::read_dir(&self.migrations_folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "migrations folder {} does not exist",
                    self.migrations_folder.display()
                );
                return Ok(Migrations::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut migrations = Migrations::default();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            migrations.push(Migration::from_path(entry.path())?);
        }

        migrations.sort_by_version();
        migrations.ensure_unique_versions()?;

        debug!(
            "collected {} migrations from {}",
            migrations.len(),
            self.migrations_folder.display()
        );
        Ok(migrations)
    }
}
