//! Command line interface for the revision migration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::migrator::{FailurePolicy, MigratorOptions, WriteMode, YearRange};
use crate::{Result, DEFAULT_FIRST_YEAR, DEFAULT_LAST_YEAR};

#[derive(Debug, Parser)]
#[command(name = "popula-rev")]
#[command(about = "Copy an agency's monthly info records into the revision history collection")]
pub struct Cli {
    /// Agency identifier (e.g. tjal)
    #[arg(long, value_parser = non_empty)]
    pub aid: String,

    /// First year to migrate (inclusive)
    #[arg(long, default_value_t = DEFAULT_FIRST_YEAR)]
    pub from_year: i32,

    /// Last year to migrate (inclusive)
    #[arg(long, default_value_t = DEFAULT_LAST_YEAR)]
    pub to_year: i32,

    /// Plain insert, or upsert keyed by (aid, month, year, version_id)
    #[arg(long, value_enum, default_value_t = WriteMode::Insert)]
    pub write_mode: WriteMode,

    /// Stop at the first failed year, or keep going and report all failures
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    pub on_error: FailurePolicy,

    /// Wall-clock limit for the whole run, in seconds
    #[arg(long, default_value_t = 40)]
    pub timeout_secs: u64,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Do not require the object storage (SWIFT_*) settings
    #[arg(long)]
    pub skip_storage_config: bool,
}

fn non_empty(value: &str) -> std::result::Result<String, String> {
    if value.trim().is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

impl Cli {
    pub fn migrator_options(&self) -> Result<MigratorOptions> {
        Ok(MigratorOptions {
            years: YearRange::new(self.from_year, self.to_year)?,
            write_mode: self.write_mode,
            failure_policy: self.on_error,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
