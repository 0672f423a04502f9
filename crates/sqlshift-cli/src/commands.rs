use anyhow::{Context, Result};
use sqlshift_config::AppConfig;
use sqlshift_core::{
    Database, Executor, FileSystemSource, Migration, Source, SqliteExecutor, SqliteStorage,
    applied_versions, generate_migration, last_applied_migration, unapplied_migrations,
};
use tracing::info;

/// Everything a command needs to talk to one migrations folder and database.
pub struct Workspace {
    pub source: FileSystemSource,
    pub storage: SqliteStorage,
    pub executor: SqliteExecutor,
}

impl Workspace {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let db = Database::open(&config.database)
            .with_context(|| format!("failed to open {}", config.database.display()))?;

        let storage = SqliteStorage::with_table(db.clone(), &config.table)?;
        let executor = if config.transactional {
            SqliteExecutor::transactional(db)
        } else {
            SqliteExecutor::new(db)
        };

        Ok(Self {
            source: FileSystemSource::new(&config.migrations_dir),
            storage,
            executor,
        })
    }

    /// Apply pending migrations one at a time, stopping at the first failure.
    /// Returns the versions that were applied.
    pub fn up(&self) -> Result<Vec<i64>> {
        let pending = unapplied_migrations(&self.source, &self.storage)
            .context("failed to compute pending migrations")?;

        let mut applied = Vec::with_capacity(pending.len());
        for migration in &pending {
            self.executor
                .up(migration, &self.storage)
                .with_context(|| format!("migration {} failed (up)", label(migration)))?;
            applied.push(migration.version);
        }
        Ok(applied)
    }

    /// Reverse the latest applied migration, if any.
    pub fn down(&self) -> Result<Option<i64>> {
        let Some(migration) = last_applied_migration(&self.source, &self.storage)
            .context("failed to find the last applied migration")?
        else {
            return Ok(None);
        };

        self.executor
            .down(&migration, &self.storage)
            .with_context(|| format!("migration {} failed (down)", label(&migration)))?;
        Ok(Some(migration.version))
    }

    /// One line per source migration: state, name and reversibility.
    pub fn status(&self) -> Result<Vec<String>> {
        let migrations = self.source.collect()?;
        let applied = applied_versions(&self.storage)?;

        Ok(migrations
            .iter()
            .map(|m| {
                let state = if applied.contains(&m.version) {
                    "applied"
                } else {
                    "pending"
                };
                let note = if m.reversible() { "" } else { "  (irreversible)" };
                format!("{state:<8} {}{note}", label(m))
            })
            .collect())
    }
}

fn label(migration: &Migration) -> String {
    migration
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| migration.version.to_string())
}

pub fn new_migration(config: &AppConfig, name: &str) -> Result<()> {
    let source = FileSystemSource::new(&config.migrations_dir);
    let migration = generate_migration(name)?;
    let dir = source
        .create(&migration)
        .with_context(|| format!("failed to create migration {name}"))?;

    info!("created migration {}", dir.display());
    println!("Created {}", dir.display());
    Ok(())
}

pub fn up(config: &AppConfig) -> Result<()> {
    let applied = Workspace::open(config)?.up()?;
    if applied.is_empty() {
        println!("Nothing to apply.");
    } else {
        println!("Applied {} migration(s).", applied.len());
    }
    Ok(())
}

pub fn down(config: &AppConfig) -> Result<()> {
    match Workspace::open(config)?.down()? {
        Some(version) => println!("Reversed migration {version}."),
        None => println!("Nothing to roll back."),
    }
    Ok(())
}

pub fn status(config: &AppConfig) -> Result<()> {
    let lines = Workspace::open(config)?.status()?;
    if lines.is_empty() {
        println!("No migrations in {}.", config.migrations_dir.display());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn write_migration(root: &Path, name: &str, up: &str, down: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("up.sql"), up).unwrap();
        std::fs::write(dir.join("down.sql"), down).unwrap();
    }

    fn config_in(root: &Path) -> AppConfig {
        AppConfig {
            database: root.join("test.db"),
            migrations_dir: root.join("migrations"),
            ..Default::default()
        }
    }

    #[test]
    fn up_down_and_status() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let migrations = &config.migrations_dir;
        write_migration(
            migrations,
            "1_users",
            "CREATE TABLE users (id INTEGER);",
            "DROP TABLE users;",
        );
        write_migration(migrations, "2_seed", "INSERT INTO users VALUES (1);", "");

        let workspace = Workspace::open(&config).unwrap();
        assert_eq!(
            workspace.status().unwrap(),
            vec!["pending  1_users", "pending  2_seed  (irreversible)"]
        );

        assert_eq!(workspace.up().unwrap(), vec![1, 2]);
        assert!(workspace.up().unwrap().is_empty());
        assert_eq!(
            workspace.status().unwrap(),
            vec!["applied  1_users", "applied  2_seed  (irreversible)"]
        );

        let err = workspace.down().unwrap_err();
        assert_eq!(err.to_string(), "migration 2_seed failed (down)");
    }

    #[test]
    fn up_stops_at_first_failure() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        let migrations = &config.migrations_dir;
        write_migration(migrations, "1_bad", "CREATE TABLE (;", "");
        write_migration(
            migrations,
            "2_good",
            "CREATE TABLE t (id INTEGER);",
            "DROP TABLE t;",
        );

        let workspace = Workspace::open(&config).unwrap();
        let err = workspace.up().unwrap_err();
        assert_eq!(err.to_string(), "migration 1_bad failed (up)");
        assert_eq!(
            workspace.status().unwrap(),
            vec!["pending  1_bad  (irreversible)", "pending  2_good"]
        );
    }

    #[test]
    fn new_migration_with_path_separators_stays_in_folder() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        new_migration(&config, "add/users").unwrap();

        let entries: Vec<_> = std::fs::read_dir(&config.migrations_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("_add_users"), "{entries:?}");

        let workspace = Workspace::open(&config).unwrap();
        assert_eq!(workspace.status().unwrap().len(), 1);
    }

    #[test]
    fn down_with_nothing_applied() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(&config_in(root.path())).unwrap();
        assert_eq!(workspace.down().unwrap(), None);
    }

    #[test]
    fn new_migration_scaffolds_into_migrations_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = config_in(root.path());
        new_migration(&config, "createUsers").unwrap();

        let workspace = Workspace::open(&config).unwrap();
        let lines = workspace.status().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("pending "));
        assert!(lines[0].contains("_create_Users"));
    }
}
