use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlshift_common::{Error, Result, validate_table_name};

/// Settings for one migrations folder and the database it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file the migrations run against.
    pub database: PathBuf,
    /// Folder holding one `<version>_<name>` directory per migration.
    pub migrations_dir: PathBuf,
    /// Bookkeeping table recording applied versions.
    pub table: String,
    /// Run each migration and its bookkeeping write in one transaction.
    /// Migration SQL must then not issue its own `BEGIN`/`COMMIT`; SQLite
    /// rejects nested transactions with "cannot start a transaction within a
    /// transaction".
    pub transactional: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sqlshift.db"),
            migrations_dir: PathBuf::from("migrations"),
            table: "schema_migrations".to_string(),
            transactional: true,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table)?;

        if self.database.as_os_str().is_empty() {
            return Err(Error::Config("database path cannot be empty".into()));
        }
        Ok(())
    }
}
