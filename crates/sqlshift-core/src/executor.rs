use sqlshift_common::{Error, Result};
use tracing::{info, warn};

use crate::database::Database;
use crate::migration::Migration;
use crate::storage::Storage;

/// Applies and reverses single migrations, keeping `storage` in step.
///
/// Implementations must not record a migration whose content failed, and must
/// not run anything for an irreversible `down`.
pub trait Executor {
    fn up(&self, migration: &Migration, storage: &dyn Storage) -> Result<()>;
    fn down(&self, migration: &Migration, storage: &dyn Storage) -> Result<()>;
}

/// Runs migration content against a SQLite database.
///
/// Without a transaction, content and bookkeeping are two separate steps: if
/// the bookkeeping write fails after the content ran, the error is returned
/// and the database already carries the change. Transactional mode wraps both
/// steps in `BEGIN`/`COMMIT`, which only covers the bookkeeping write when the
/// storage uses the same [`Database`] handle.
pub struct SqliteExecutor {
    db: Database,
    transactional: bool,
}

impl SqliteExecutor {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            transactional: false,
        }
    }

    pub fn transactional(db: Database) -> Self {
        Self {
            db,
            transactional: true,
        }
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    fn run(&self, step: impl FnOnce() -> Result<()>) -> Result<()> {
        if !self.transactional {
            return step();
        }

        self.db.execute_batch("BEGIN")?;
        match step().and_then(|()| self.db.execute_batch("COMMIT")) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(rollback) = self.db.execute_batch("ROLLBACK") {
                    warn!("rollback failed after migration error: {rollback}");
                }
                Err(e)
            }
        }
    }
}

impl Executor for SqliteExecutor {
    fn up(&self, migration: &Migration, storage: &dyn Storage) -> Result<()> {
        let sql = sql_text(migration.version, &migration.up_sql)?;

        self.run(|| {
            self.db.execute_batch(sql)?;
            storage.insert(migration)
        })?;

        info!("applied migration {}", migration.version);
        Ok(())
    }

    fn down(&self, migration: &Migration, storage: &dyn Storage) -> Result<()> {
        if !migration.reversible() {
            return Err(Error::Irreversible(migration.version));
        }
        let sql = sql_text(migration.version, &migration.down_sql)?;

        self.run(|| {
            self.db.execute_batch(sql)?;
            storage.remove(migration)
        })?;

        info!("reversed migration {}", migration.version);
        Ok(())
    }
}

fn sql_text(version: i64, content: &[u8]) -> Result<&str> {
    std::str::from_utf8(content)
        .map_err(|e| Error::Database(format!("migration {version} is not valid UTF-8: {e}")))
}
