use std::fmt;

use chrono::{DateTime, Utc};

/// What happened to the revisions of one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearOutcome {
    /// A write was issued. `already_present` is only non-zero in upsert mode.
    Inserted { inserted: u64, already_present: u64 },
    /// No record of the year had process info, so no write was issued.
    NothingToInsert,
    /// The year failed and the run continued past it.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearReport {
    pub agency_id: String,
    pub year: i32,
    /// Months whose record had no process info.
    pub skipped_months: Vec<i32>,
    pub outcome: YearOutcome,
}

impl YearReport {
    pub fn new(agency_id: impl Into<String>, year: i32, skipped_months: Vec<i32>, outcome: YearOutcome) -> Self {
        Self {
            agency_id: agency_id.into(),
            year,
            skipped_months,
            outcome,
        }
    }

    pub fn inserted(&self) -> u64 {
        match self.outcome {
            YearOutcome::Inserted { inserted, .. } => inserted,
            _ => 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, YearOutcome::Failed { .. })
    }
}

impl fmt::Display for YearReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            YearOutcome::Inserted { inserted, already_present: 0 } => {
                write!(f, "[{}/{}] {} documents inserted", self.agency_id, self.year, inserted)
            }
            YearOutcome::Inserted { inserted, already_present } => write!(
                f,
                "[{}/{}] {} documents inserted, {} already present",
                self.agency_id, self.year, inserted, already_present
            ),
            YearOutcome::NothingToInsert => {
                write!(f, "[{}/{}] nothing to insert", self.agency_id, self.year)
            }
            YearOutcome::Failed { error } => {
                write!(f, "[{}/{}] FAILED: {}", self.agency_id, self.year, error)
            }
        }
    }
}

/// Result of a whole run, one entry per processed year.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub agency_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub years: Vec<YearReport>,
}

impl MigrationReport {
    pub fn total_inserted(&self) -> u64 {
        self.years.iter().map(YearReport::inserted).sum()
    }

    pub fn failed_years(&self) -> Vec<i32> {
        self.years.iter().filter(|y| y.is_failed()).map(|y| y.year).collect()
    }

    pub fn is_success(&self) -> bool {
        self.years.iter().all(|y| !y.is_failed())
    }

    pub fn summary(&self) -> String {
        let failed = self.failed_years();
        if failed.is_empty() {
            format!(
                "✓ {}: {} revision(s) inserted across {} year(s) in {}ms",
                self.agency_id,
                self.total_inserted(),
                self.years.len(),
                self.duration_ms
            )
        } else {
            let list = failed.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(", ");
            format!(
                "✗ {}: {} of {} year(s) failed ({}), {} revision(s) inserted",
                self.agency_id,
                failed.len(),
                self.years.len(),
                list,
                self.total_inserted()
            )
        }
    }
}
