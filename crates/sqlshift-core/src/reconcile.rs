use std::collections::HashSet;

use sqlshift_common::{Error, Result};

use crate::migration::{Migration, Migrations};
use crate::source::Source;
use crate::storage::Storage;

/// Migrations known to `source` that `storage` has not recorded as applied,
/// in the order the source lists them.
///
/// Errors from either side are returned as is. A source listing the same
/// version twice is rejected with [`Error::DuplicateVersion`].
pub fn unapplied_migrations(source: &dyn Source, storage: &dyn Storage) -> Result<Migrations> {
    let all = source.collect()?;
    all.ensure_unique_versions()?;

    let applied = storage.all()?;
    Ok(applied.except(all))
}

pub fn applied_versions(storage: &dyn Storage) -> Result<HashSet<i64>> {
    Ok(storage.all()?.versions())
}

/// The source migration matching the highest applied version, i.e. the one
/// a rollback should reverse. `None` when nothing has been applied.
pub fn last_applied_migration(
    source: &dyn Source,
    storage: &dyn Storage,
) -> Result<Option<Migration>> {
    let Some(latest) = storage.all()?.iter().map(|m| m.version).max() else {
        return Ok(None);
    };

    source
        .collect()?
        .into_iter()
        .find(|m| m.version == latest)
        .map(Some)
        .ok_or(Error::MissingSource(latest))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Vec<i64>);

    impl Source for StaticSource {
        fn collect(&self) -> Result<Migrations> {
            Ok(self
                .0
                .iter()
                .map(|&version| Migration {
                    up_sql: b"SELECT 1;".to_vec(),
                    path: format!("{version}_m").into(),
                    version,
                    ..Default::default()
                })
                .collect())
        }
    }

    struct StaticStorage(Vec<i64>);

    impl Storage for StaticStorage {
        fn insert(&self, _: &Migration) -> Result<()> {
            unreachable!("reconciliation never writes")
        }

        fn remove(&self, _: &Migration) -> Result<()> {
            unreachable!("reconciliation never writes")
        }

        fn all(&self) -> Result<Migrations> {
            Ok(self.0.iter().copied().map(Migration::from_version).collect())
        }
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn insert(&self, _: &Migration) -> Result<()> {
            unreachable!()
        }

        fn remove(&self, _: &Migration) -> Result<()> {
            unreachable!()
        }

        fn all(&self) -> Result<Migrations> {
            Err(Error::Database("connection refused".into()))
        }
    }

    fn versions(migrations: &Migrations) -> Vec<i64> {
        migrations.iter().map(|m| m.version).collect()
    }

    #[test]
    fn skips_applied_versions() {
        let pending =
            unapplied_migrations(&StaticSource(vec![1, 2, 3]), &StaticStorage(vec![1])).unwrap();
        assert_eq!(versions(&pending), vec![2, 3]);
        assert!(pending.iter().all(|m| !m.up_sql.is_empty()));
    }

    #[test]
    fn disjoint_sets() {
        let source = StaticSource(vec![10, 20]);

        let pending = unapplied_migrations(&source, &StaticStorage(vec![])).unwrap();
        assert_eq!(versions(&pending), vec![10, 20]);

        let pending = unapplied_migrations(&source, &StaticStorage(vec![10, 20])).unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn storage_errors_propagate() {
        let err = unapplied_migrations(&StaticSource(vec![1]), &BrokenStorage).unwrap_err();
        assert_eq!(err.to_string(), "database error: connection refused");
    }

    #[test]
    fn duplicate_source_versions_are_rejected() {
        let err =
            unapplied_migrations(&StaticSource(vec![1, 2, 2]), &StaticStorage(vec![])).unwrap_err();
        assert!(matches!(err, Error::DuplicateVersion(2)));
    }

    #[test]
    fn applied_versions_from_storage() {
        let applied = applied_versions(&StaticStorage(vec![4, 5])).unwrap();
        assert_eq!(applied, HashSet::from([4, 5]));
    }

    #[test]
    fn last_applied_is_highest_version_with_content() {
        let last = last_applied_migration(&StaticSource(vec![1, 2, 3]), &StaticStorage(vec![2, 1]))
            .unwrap()
            .unwrap();
        assert_eq!(last.version, 2);
        assert!(last.persistable());
    }

    #[test]
    fn last_applied_with_nothing_applied() {
        let last = last_applied_migration(&StaticSource(vec![1]), &StaticStorage(vec![])).unwrap();
        assert!(last.is_none());
    }

    #[test]
    fn last_applied_missing_from_source() {
        let err =
            last_applied_migration(&StaticSource(vec![1]), &StaticStorage(vec![9])).unwrap_err();
        assert!(matches!(err, Error::MissingSource(9)));
    }
}
