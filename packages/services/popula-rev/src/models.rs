use bson::{doc, Bson, Document};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Point in time at which the collector produced a monthly record.
///
/// The collector stores it as a protobuf timestamp (`{ seconds, nanos }`);
/// records written by other tools may carry a plain BSON datetime instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionTimestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl CollectionTimestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Whole seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        self.seconds
    }

    /// Interpret a stored BSON value as a collection timestamp.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::Document(d) => {
                let seconds = integer(d.get("seconds")?)?;
                let nanos = match d.get("nanos") {
                    Some(n) => i32::try_from(integer(n)?).ok()?,
                    None => 0,
                };
                Some(Self { seconds, nanos })
            }
            Bson::DateTime(dt) => {
                let millis = dt.timestamp_millis();
                Some(Self {
                    seconds: millis.div_euclid(1000),
                    nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
                })
            }
            Bson::Timestamp(ts) => Some(Self { seconds: ts.time as i64, nanos: 0 }),
            _ => None,
        }
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for CollectionTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Bson::deserialize(deserializer)?;
        Self::from_bson(&value)
            .ok_or_else(|| D::Error::custom(format!("unsupported collection timestamp: {}", value)))
    }
}

/// Typed view over the fields of a monthly-info document the migration reads.
#[derive(Debug, Deserialize)]
struct MonthlyRecordFields {
    #[serde(rename = "aid")]
    agency_id: String,
    month: i32,
    year: i32,
    #[serde(rename = "ts", default)]
    collection_timestamp: Option<CollectionTimestamp>,
    #[serde(rename = "procinfo", default)]
    process_info: Option<Document>,
}

/// One agency/month/year worth of collected data, as found in the
/// monthly-info collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    pub agency_id: String,
    pub month: i32,
    pub year: i32,
    pub collection_timestamp: Option<CollectionTimestamp>,
    /// Present only when the collection run finished with an error report.
    pub process_info: Option<Document>,
    /// The stored document, untouched.
    pub payload: Document,
}

impl MonthlyRecord {
    pub fn from_document(payload: Document) -> Result<Self, bson::de::Error> {
        let fields: MonthlyRecordFields = bson::from_document(payload.clone())?;
        Ok(Self {
            agency_id: fields.agency_id,
            month: fields.month,
            year: fields.year,
            collection_timestamp: fields.collection_timestamp,
            process_info: fields.process_info,
            payload,
        })
    }

    pub fn has_process_info(&self) -> bool {
        self.process_info.is_some()
    }
}

/// Immutable snapshot of a monthly record stored in the revisions collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    #[serde(rename = "aid")]
    pub agency_id: String,
    pub month: i32,
    pub year: i32,
    pub version_id: i64,
    #[serde(rename = "version")]
    pub snapshot: Document,
}

impl RevisionRecord {
    /// Build the revision for a monthly record, or `None` when the record has
    /// no process info and therefore nothing to revise.
    ///
    /// A record without a collection timestamp gets `version_id` 0, the value
    /// the collector's zero timestamp maps to.
    pub fn from_monthly(record: &MonthlyRecord) -> Option<Self> {
        if !record.has_process_info() {
            return None;
        }
        Some(Self {
            agency_id: record.agency_id.clone(),
            month: record.month,
            year: record.year,
            version_id: record
                .collection_timestamp
                .map(|ts| ts.unix_seconds())
                .unwrap_or_default(),
            snapshot: record.payload.clone(),
        })
    }

    /// Filter identifying this revision in the revisions collection.
    pub fn key(&self) -> Document {
        doc! {
            "aid": &self.agency_id,
            "month": self.month,
            "year": self.year,
            "version_id": self.version_id,
        }
    }
}
