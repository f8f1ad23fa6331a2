//! # popula-rev
//!
//! Copies the monthly-info records of one agency into the revision history
//! collection. Every record whose collection run produced process info becomes
//! an immutable [`RevisionRecord`] keyed by agency, month, year and the
//! collection timestamp in epoch seconds.
//!
//! ```rust,no_run
//! use popula_rev::{DatabaseManager, MigratorOptions, RevisionMigrator};
//!
//! # async fn example() -> popula_rev::Result<()> {
//! let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//! let store = DatabaseManager::new(&client, "dadosjusbr", "miCol", "miRev");
//! let migrator = RevisionMigrator::new(store, MigratorOptions::default());
//!
//! let report = migrator.run("tjal").await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod migrator;
pub mod models;
pub mod report;

pub use cli::Cli;
pub use config::{Config, MongoConfig, StorageConfig};
pub use database::{DatabaseManager, RevisionStore, UpsertCounts};
pub use migrator::{FailurePolicy, MigrationEvent, MigratorOptions, RevisionMigrator, WriteMode, YearRange};
pub use models::{CollectionTimestamp, MonthlyRecord, RevisionRecord};
pub use report::{MigrationReport, YearOutcome, YearReport};

/// First year scanned when no range is given.
pub const DEFAULT_FIRST_YEAR: i32 = 2018;

/// Last year scanned when no range is given (inclusive).
pub const DEFAULT_LAST_YEAR: i32 = 2021;

/// Default wall-clock limit for a whole run.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(40);

/// Error types for the revision migration
#[derive(thiserror::Error, Debug)]
pub enum RevisionError {
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("[{aid}/{year}] failed to decode monthly info: {source}")]
    Decode {
        aid: String,
        year: i32,
        #[source]
        source: bson::de::Error,
    },

    #[error("failed to encode revision: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("failed to write revisions for [{aid}/{year}]: {source}")]
    Write {
        aid: String,
        year: i32,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("run timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },
}

/// Result type for revision migration operations
pub type Result<T> = std::result::Result<T, RevisionError>;
