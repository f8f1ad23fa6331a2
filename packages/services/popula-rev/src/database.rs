use async_trait::async_trait;
use bson::{doc, Document};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::options::{InsertManyOptions, UpdateOptions};
use mongodb::{Client, Collection};

use crate::models::RevisionRecord;
use crate::{Result, RevisionError};

/// Outcome of an idempotent revision write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    /// Revisions that did not exist before the write.
    pub inserted: u64,
    /// Revisions whose key was already stored and were left untouched.
    pub already_present: u64,
}

/// Access to the monthly-info source and the revisions destination.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Every monthly-info document for one agency and year, in store order.
    async fn monthly_records(&self, agency_id: &str, year: i32) -> Result<BoxStream<'static, Result<Document>>>;

    /// Insert all revisions as one ordered batch. Returns the inserted count.
    async fn insert_revisions(&self, revisions: &[RevisionRecord]) -> Result<u64>;

    /// Insert each revision unless one with the same key already exists.
    async fn upsert_revisions(&self, revisions: &[RevisionRecord]) -> Result<UpsertCounts>;
}

#[derive(Clone)]
pub struct DatabaseManager {
    pub monthly_info: Collection<Document>,
    pub revisions: Collection<RevisionRecord>,
}

impl DatabaseManager {
    pub fn new(client: &Client, database_name: &str, monthly_info_collection: &str, revision_collection: &str) -> Self {
        let database = client.database(database_name);
        Self {
            monthly_info: database.collection::<Document>(monthly_info_collection),
            revisions: database.collection::<RevisionRecord>(revision_collection),
        }
    }
}

#[async_trait]
impl RevisionStore for DatabaseManager {
    async fn monthly_records(&self, agency_id: &str, year: i32) -> Result<BoxStream<'static, Result<Document>>> {
        let filter = doc! { "aid": agency_id, "year": year };
        let cursor = self.monthly_info.find(filter, None).await?;
        Ok(cursor.map_err(RevisionError::from).boxed())
    }

    async fn insert_revisions(&self, revisions: &[RevisionRecord]) -> Result<u64> {
        if revisions.is_empty() {
            return Ok(0);
        }
        let options = InsertManyOptions::builder().ordered(true).build();
        let result = self.revisions.insert_many(revisions, options).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn upsert_revisions(&self, revisions: &[RevisionRecord]) -> Result<UpsertCounts> {
        let mut counts = UpsertCounts::default();
        for revision in revisions {
            let update = doc! { "$setOnInsert": { "version": revision.snapshot.clone() } };
            let options = UpdateOptions::builder().upsert(true).build();
            let result = self.revisions.update_one(revision.key(), update, options).await?;
            if result.upserted_id.is_some() {
                counts.inserted += 1;
            } else {
                counts.already_present += 1;
            }
        }
        Ok(counts)
    }
}
