use std::fmt;
use std::time::Instant;

use chrono::Utc;
use futures::TryStreamExt;
use tracing::{debug, error, info, warn};

use crate::database::RevisionStore;
use crate::models::{MonthlyRecord, RevisionRecord};
use crate::report::{MigrationReport, YearOutcome, YearReport};
use crate::{Result, RevisionError, DEFAULT_FIRST_YEAR, DEFAULT_LAST_YEAR};

/// How revisions are written to the revisions collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum WriteMode {
    /// Unconditional insert. Re-runs store duplicate revisions.
    #[default]
    Insert,
    /// Upsert keyed by agency, month, year and version id. Re-runs add nothing.
    Upsert,
}

/// What a failed year does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Stop at the first failure.
    #[default]
    Abort,
    /// Record the failure and move on to the next year.
    Continue,
}

/// Inclusive range of years to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    first: i32,
    last: i32,
}

impl YearRange {
    pub fn new(first: i32, last: i32) -> Result<Self> {
        if first > last {
            return Err(RevisionError::Config {
                message: format!("year range {}..={} is empty", first, last),
            });
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> i32 {
        self.first
    }

    pub fn last(&self) -> i32 {
        self.last
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.first..=self.last
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST_YEAR,
            last: DEFAULT_LAST_YEAR,
        }
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, Copy)]
pub enum MigrationEvent<'a> {
    /// A record without process info was read and skipped.
    NothingToRevise { agency_id: &'a str, year: i32, month: i32 },
    /// A year finished, successfully or not.
    YearFinished(&'a YearReport),
}

impl fmt::Display for MigrationEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationEvent::NothingToRevise { agency_id, year, month } => {
                write!(f, "{}/{} no error in collection for {}, nothing to revise", month, year, agency_id)
            }
            MigrationEvent::YearFinished(report) => write!(f, "{}", report),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigratorOptions {
    pub years: YearRange,
    pub write_mode: WriteMode,
    pub failure_policy: FailurePolicy,
}

/// Copies the monthly records of one agency into the revisions collection,
/// one year at a time.
pub struct RevisionMigrator<S> {
    store: S,
    options: MigratorOptions,
}

impl<S: RevisionStore> RevisionMigrator<S> {
    pub fn new(store: S, options: MigratorOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &MigratorOptions {
        &self.options
    }

    /// Migrate every year of the configured range.
    pub async fn run(&self, agency_id: &str) -> Result<MigrationReport> {
        self.run_with_progress(agency_id, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_event` for every skipped month
    /// while the cursor is read and once more when each year is done.
    pub async fn run_with_progress<F>(&self, agency_id: &str, mut on_event: F) -> Result<MigrationReport>
    where
        F: FnMut(MigrationEvent<'_>) + Send,
    {
        if agency_id.trim().is_empty() {
            return Err(RevisionError::Config {
                message: "agency id must not be empty".to_string(),
            });
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut years = Vec::new();

        info!(
            aid = agency_id,
            first_year = self.options.years.first(),
            last_year = self.options.years.last(),
            write_mode = ?self.options.write_mode,
            "Starting revision migration"
        );

        for year in self.options.years.years() {
            let report = match self.migrate_year_with(agency_id, year, &mut on_event).await {
                Ok(report) => report,
                Err(e) if self.options.failure_policy == FailurePolicy::Continue => {
                    error!(aid = agency_id, year, error = %e, "Year failed, continuing with the next one");
                    YearReport::new(agency_id, year, Vec::new(), YearOutcome::Failed { error: e.to_string() })
                }
                Err(e) => {
                    error!(aid = agency_id, year, error = %e, "Year failed, aborting run");
                    return Err(e);
                }
            };
            on_event(MigrationEvent::YearFinished(&report));
            years.push(report);
        }

        Ok(MigrationReport {
            agency_id: agency_id.to_string(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            years,
        })
    }

    /// Migrate a single year: read, filter, transform, then write one batch.
    pub async fn migrate_year(&self, agency_id: &str, year: i32) -> Result<YearReport> {
        self.migrate_year_with(agency_id, year, &mut |_: MigrationEvent<'_>| {}).await
    }

    async fn migrate_year_with<F>(&self, agency_id: &str, year: i32, on_event: &mut F) -> Result<YearReport>
    where
        F: FnMut(MigrationEvent<'_>) + Send,
    {
        let mut documents = self.store.monthly_records(agency_id, year).await?;
        let mut pending = Vec::new();
        let mut skipped_months = Vec::new();

        while let Some(document) = documents.try_next().await? {
            let record = MonthlyRecord::from_document(document).map_err(|source| RevisionError::Decode {
                aid: agency_id.to_string(),
                year,
                source,
            })?;

            match RevisionRecord::from_monthly(&record) {
                Some(revision) => {
                    if record.collection_timestamp.is_none() {
                        warn!(aid = agency_id, year, month = record.month, "Record has no collection timestamp, using version 0");
                    }
                    debug!(aid = agency_id, year, month = record.month, version_id = revision.version_id, "Queued revision");
                    pending.push(revision);
                }
                None => {
                    info!(aid = agency_id, year, month = record.month, "No process info, nothing to revise");
                    on_event(MigrationEvent::NothingToRevise {
                        agency_id,
                        year,
                        month: record.month,
                    });
                    skipped_months.push(record.month);
                }
            }
        }
        skipped_months.sort_unstable();

        if pending.is_empty() {
            info!(aid = agency_id, year, "Nothing to insert");
            return Ok(YearReport::new(agency_id, year, skipped_months, YearOutcome::NothingToInsert));
        }

        let outcome = match self.options.write_mode {
            WriteMode::Insert => {
                let inserted = self
                    .store
                    .insert_revisions(&pending)
                    .await
                    .map_err(|e| write_error(agency_id, year, e))?;
                YearOutcome::Inserted { inserted, already_present: 0 }
            }
            WriteMode::Upsert => {
                let counts = self
                    .store
                    .upsert_revisions(&pending)
                    .await
                    .map_err(|e| write_error(agency_id, year, e))?;
                YearOutcome::Inserted {
                    inserted: counts.inserted,
                    already_present: counts.already_present,
                }
            }
        };

        info!(aid = agency_id, year, queued = pending.len(), ?outcome, "Revisions written");
        Ok(YearReport::new(agency_id, year, skipped_months, outcome))
    }
}

fn write_error(agency_id: &str, year: i32, err: RevisionError) -> RevisionError {
    match err {
        RevisionError::Database(source) => RevisionError::Write {
            aid: agency_id.to_string(),
            year,
            source,
        },
        other => other,
    }
}
