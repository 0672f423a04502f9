use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sqlshift_common::{Error, Result};

use crate::clock::{Clock, SystemClock};

/// Timestamp layout a migration version is derived from (`YYYYMMDDHHMMSS`).
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

pub const UP_FILE: &str = "up.sql";
pub const DOWN_FILE: &str = "down.sql";

static NAME_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex is valid"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex is valid"));

/// One versioned unit of schema change.
///
/// The version orders migrations and is their only identity. Migrations read
/// back from a [`Storage`](crate::Storage) carry nothing but the version, so
/// their content is empty and their path is blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migration {
    pub up_sql: Vec<u8>,
    pub down_sql: Vec<u8>,
    pub path: PathBuf,
    pub version: i64,
}

impl Migration {
    /// A bookkeeping-only migration, as returned by storage.
    pub fn from_version(version: i64) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Build a blank migration named after `name`, stamped with `clock`.
    ///
    /// Fails when the clock reads a year outside `0..=9999`, which has no
    /// 14-digit version.
    pub fn generate_with(name: &str, clock: &dyn Clock) -> Result<Self> {
        let stamp = clock.now().format(VERSION_FORMAT).to_string();
        let version = parse_version(&stamp).ok_or(Error::VersionParse(stamp))?;

        Ok(Self {
            path: PathBuf::from(migration_dir_name(version, name)),
            version,
            ..Default::default()
        })
    }

    /// Load a migration from a directory laid out like:
    ///
    /// ```text
    /// migrations/20170329154959_introduce_domain_model/up.sql
    /// migrations/20170329154959_introduce_domain_model/down.sql
    /// ```
    ///
    /// `up.sql` is mandatory, `down.sql` is optional.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let version = version_from_path(path)?;

        let up_path = path.join(UP_FILE);
        let up_sql = std::fs::read(&up_path).map_err(|source| Error::Read {
            path: up_path,
            source,
        })?;

        let down_path = path.join(DOWN_FILE);
        let down_sql = match std::fs::read(&down_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(Error::Read {
                    path: down_path,
                    source,
                });
            }
        };

        Ok(Self {
            up_sql,
            down_sql,
            path: path.to_path_buf(),
            version,
        })
    }

    /// Whether the migration carries down content and can be reversed.
    pub fn reversible(&self) -> bool {
        !self.down_sql.is_empty()
    }

    /// Whether the migration has an origin on disk (as opposed to one rebuilt
    /// from a bookkeeping record).
    pub fn persistable(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }
}

/// Generate a blank migration stamped with the current system time.
pub fn generate_migration(name: &str) -> Result<Migration> {
    Migration::generate_with(name, &SystemClock)
}

/// `<version>_<slug>`, where the slug keeps only `[A-Za-z0-9_]` so it stays a
/// single path segment.
fn migration_dir_name(version: i64, name: &str) -> String {
    let slug = NAME_BOUNDARY.replace_all(name, "${1}_${2}");
    format!("{version}_{}", UNSAFE_CHARS.replace_all(&slug, "_"))
}

fn parse_version(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn version_from_path(path: &Path) -> Result<i64> {
    let invalid = || Error::VersionParse(path.display().to_string());

    let segment = path.file_name().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let (prefix, _) = segment.split_once('_').ok_or_else(invalid)?;
    parse_version(prefix).ok_or_else(invalid)
}

/// An ordered collection of migrations, keyed by version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migrations(Vec<Migration>);

impl Migrations {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self(migrations)
    }

    pub fn push(&mut self, migration: Migration) {
        self.0.push(migration);
    }

    pub fn versions(&self) -> HashSet<i64> {
        self.0.iter().map(|m| m.version).collect()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.0.iter().find(|m| m.version == version)
    }

    pub fn sort_by_version(&mut self) {
        self.0.sort_by_key(|m| m.version);
    }

    /// Fails with [`Error::DuplicateVersion`] on the first repeated version.
    pub fn ensure_unique_versions(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.0.len());
        for migration in &self.0 {
            if !seen.insert(migration.version) {
                return Err(Error::DuplicateVersion(migration.version));
            }
        }
        Ok(())
    }

    /// Migrations from `candidates` whose version is absent from `self`,
    /// in the order `candidates` lists them.
    pub fn except(&self, candidates: Migrations) -> Migrations {
        let existing = self.versions();
        candidates
            .into_iter()
            .filter(|m| !existing.contains(&m.version))
            .collect()
    }

    pub fn into_vec(self) -> Vec<Migration> {
        self.0
    }
}

impl std::ops::Deref for Migrations {
    type Target = [Migration];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Migration>> for Migrations {
    fn from(migrations: Vec<Migration>) -> Self {
        Self(migrations)
    }
}

impl FromIterator<Migration> for Migrations {
    fn from_iter<I: IntoIterator<Item = Migration>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Migrations {
    type Item = Migration;
    type IntoIter = std::vec::IntoIter<Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Migrations {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
