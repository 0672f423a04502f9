use rusqlite::params;
use sqlshift_common::{Error, Result, validate_table_name};
use tracing::debug;

use crate::database::Database;
use crate::migration::{Migration, Migrations};

pub const DEFAULT_TABLE: &str = "schema_migrations";

/// Persists which migration versions have been applied.
///
/// Every operation creates the backing structure first if it does not exist,
/// so calling any of them on a fresh database is fine.
pub trait Storage {
    /// Record `migration` as applied. Recording an already applied version
    /// must not fail, so that a retried `up` is safe.
    fn insert(&self, migration: &Migration) -> Result<()>;

    fn remove(&self, migration: &Migration) -> Result<()>;

    /// Applied migrations in ascending version order. Only `version` is set.
    fn all(&self) -> Result<Migrations>;
}

/// Bookkeeping table in a SQLite database.
pub struct SqliteStorage {
    db: Database,
    table: String,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Use `table` instead of `schema_migrations`. The name must be a plain
    /// SQL identifier.
    pub fn with_table(db: Database, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn ensure_table_exists(&self, conn: &rusqlite::Connection) -> Result<()> {
        debug!("ensuring bookkeeping table {} exists", self.table);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS [{}] (
                version INTEGER PRIMARY KEY NOT NULL
            );",
            self.table
        ))
        .map_err(|e| Error::Database(format!("failed to create {}: {e}", self.table)))
    }
}

impl Storage for SqliteStorage {
    fn insert(&self, migration: &Migration) -> Result<()> {
        let conn = self.db.connection()?;
        self.ensure_table_exists(&conn)?;

        conn.execute(
            &format!("INSERT OR IGNORE INTO [{}] (version) VALUES (?1)", self.table),
            params![migration.version],
        )
        .map_err(|e| {
            Error::Database(format!(
                "failed to record migration {}: {e}",
                migration.version
            ))
        })?;
        Ok(())
    }

    fn remove(&self, migration: &Migration) -> Result<()> {
        let conn = self.db.connection()?;
        self.ensure_table_exists(&conn)?;

        conn.execute(
            &format!("DELETE FROM [{}] WHERE version = ?1", self.table),
            params![migration.version],
        )
        .map_err(|e| {
            Error::Database(format!(
                "failed to remove migration {}: {e}",
                migration.version
            ))
        })?;
        Ok(())
    }

    fn all(&self) -> Result<Migrations> {
        let conn = self.db.connection()?;
        self.ensure_table_exists(&conn)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT version FROM [{}] ORDER BY version ASC",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Database(format!("failed to query migrations: {e}")))?;

        let mut migrations = Migrations::default();
        for row in rows {
            let version =
                row.map_err(|e| Error::Database(format!("failed to read version row: {e}")))?;
            migrations.push(Migration::from_version(version));
        }
        Ok(migrations)
    }
}
