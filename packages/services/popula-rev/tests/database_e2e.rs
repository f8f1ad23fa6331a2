use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::{Client, Collection};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage};

use popula_rev::{
    DatabaseManager, FailurePolicy, MigratorOptions, RevisionMigrator, RevisionStore, WriteMode, YearOutcome,
    YearRange,
};

const MONTHLY_INFO: &str = "miCol";
const REVISIONS: &str = "miRev";

async fn start_mongo() -> (ContainerAsync<GenericImage>, Client) {
    let image = GenericImage::new("mongo", "7.0")
        .with_exposed_port(ContainerPort::Tcp(27017))
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"));
    let container = image.start().await.expect("start container");
    let port = container.get_host_port_ipv4(27017).await.expect("map mongo port");
    let client = Client::with_uri_str(format!("mongodb://127.0.0.1:{}", port))
        .await
        .expect("create client");
    (container, client)
}

/// Months 1-6 of 2019 for tjal (3 and 5 without process info), stored with
/// int64 year/month the way the collector writes them, plus noise.
async fn seed(client: &Client, database: &str) {
    let mut docs = Vec::new();
    for month in 1..=6_i64 {
        let mut d = doc! {
            "aid": "tjal",
            "year": 2019_i64,
            "month": month,
            "crawler_version": "v2.1.0",
            "ts": { "seconds": 1_560_000_000_i64 + month, "nanos": 0 },
        };
        if month != 3 && month != 5 {
            d.insert("procinfo", doc! { "status": 4, "stderr": "parse failure" });
        }
        docs.push(d);
    }
    docs.push(doc! { "aid": "trt13", "year": 2019_i64, "month": 1_i64, "ts": { "seconds": 1_i64, "nanos": 0 }, "procinfo": {} });
    docs.push(doc! { "aid": "tjal", "year": 2017_i64, "month": 1_i64, "ts": { "seconds": 2_i64, "nanos": 0 }, "procinfo": {} });

    client
        .database(database)
        .collection::<Document>(MONTHLY_INFO)
        .insert_many(docs, None)
        .await
        .expect("seed monthly info");
}

fn migrator(client: &Client, database: &str, write_mode: WriteMode) -> RevisionMigrator<DatabaseManager> {
    let options = MigratorOptions {
        years: YearRange::new(2018, 2019).unwrap(),
        write_mode,
        failure_policy: FailurePolicy::Abort,
    };
    RevisionMigrator::new(DatabaseManager::new(client, database, MONTHLY_INFO, REVISIONS), options)
}

fn raw_revisions(client: &Client, database: &str) -> Collection<Document> {
    client.database(database).collection::<Document>(REVISIONS)
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn e2e_find_filters_by_agency_and_year() {
    let (_container, client) = start_mongo().await;
    seed(&client, "filter_test").await;
    let store = DatabaseManager::new(&client, "filter_test", MONTHLY_INFO, REVISIONS);

    let docs: Vec<Document> = store
        .monthly_records("tjal", 2019)
        .await
        .expect("query")
        .try_collect()
        .await
        .expect("drain cursor");

    assert_eq!(docs.len(), 6);
    assert!(docs.iter().all(|d| d.get_str("aid").unwrap() == "tjal"));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn e2e_insert_mode_duplicates_on_rerun() {
    let (_container, client) = start_mongo().await;
    seed(&client, "insert_test").await;
    let migrator = migrator(&client, "insert_test", WriteMode::Insert);

    let first = migrator.run("tjal").await.expect("first run");
    let second = migrator.run("tjal").await.expect("second run");

    assert_eq!(first.total_inserted(), 4);
    assert_eq!(second.total_inserted(), 4);
    let y2019 = first.years.iter().find(|y| y.year == 2019).unwrap();
    assert_eq!(y2019.skipped_months, vec![3, 5]);

    let revisions = raw_revisions(&client, "insert_test");
    assert_eq!(revisions.count_documents(doc! {}, None).await.unwrap(), 8);
    for month in [1_i32, 2, 4, 6] {
        let key = doc! { "aid": "tjal", "year": 2019, "month": month, "version_id": 1_560_000_000_i64 + month as i64 };
        assert_eq!(revisions.count_documents(key, None).await.unwrap(), 2, "month {}", month);
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn e2e_upsert_mode_is_idempotent() {
    let (_container, client) = start_mongo().await;
    seed(&client, "upsert_test").await;
    let migrator = migrator(&client, "upsert_test", WriteMode::Upsert);

    let first = migrator.run("tjal").await.expect("first run");
    let second = migrator.run("tjal").await.expect("second run");

    assert_eq!(first.total_inserted(), 4);
    let y2019 = second.years.iter().find(|y| y.year == 2019).unwrap();
    assert_eq!(y2019.outcome, YearOutcome::Inserted { inserted: 0, already_present: 4 });
    assert_eq!(raw_revisions(&client, "upsert_test").count_documents(doc! {}, None).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn e2e_revisions_use_stored_field_names() {
    for (database, write_mode) in [("names_insert", WriteMode::Insert), ("names_upsert", WriteMode::Upsert)] {
        let (_container, client) = start_mongo().await;
        seed(&client, database).await;
        migrator(&client, database, write_mode).run("tjal").await.expect("run");

        let stored = raw_revisions(&client, database)
            .find_one(doc! { "month": 2 }, None)
            .await
            .unwrap()
            .expect("revision for month 2");

        assert_eq!(stored.get_str("aid").unwrap(), "tjal");
        assert_eq!(stored.get("version_id"), Some(&Bson::Int64(1_560_000_002)));
        let snapshot = stored.get_document("version").unwrap();
        assert_eq!(snapshot.get_str("crawler_version").unwrap(), "v2.1.0");
        assert!(snapshot.contains_key("procinfo"));
        assert!(snapshot.contains_key("_id"));
    }
}
