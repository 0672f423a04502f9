pub mod clock;
pub mod database;
pub mod executor;
pub mod migration;
pub mod reconcile;
pub mod source;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use database::Database;
pub use executor::{Executor, SqliteExecutor};
pub use migration::{Migration, Migrations, generate_migration};
pub use reconcile::{applied_versions, last_applied_migration, unapplied_migrations};
pub use source::{FileSystemSource, Source};
pub use storage::{SqliteStorage, Storage};
