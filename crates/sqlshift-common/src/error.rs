use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot extract version from {0}")]
    VersionParse(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when reversing a migration that has no down content.
    #[error("cannot reverse migration {0}")]
    Irreversible(i64),

    #[error("duplicate migration version {0}")]
    DuplicateVersion(i64),

    #[error("migration {0} is applied but missing from the source")]
    MissingSource(i64),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
