use std::sync::{Arc, Mutex};

use episode_sync_core::config::SyncConfig;
use episode_sync_core::contract::{Collection, MockContentStore, RemoteEntry, StoreError};
use episode_sync_core::delimited::parse;
use episode_sync_core::reconcile::Outcome;
use episode_sync_core::synchronise::synchronise;
use serde_json::{json, Map, Value};

fn entry(id: impl Into<String>) -> RemoteEntry {
    RemoteEntry {
        id: id.into(),
        slug: None,
    }
}

/// Records every episode payload handed to `create`.
fn capture_episode_creates(store: &mut MockContentStore) -> Arc<Mutex<Vec<Map<String, Value>>>> {
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();
    store
        .expect_create()
        .withf(|c, _, _| *c == Collection::Episodes)
        .returning(move |_, data, _| {
            sink.lock().unwrap().push(data.clone());
            Ok(entry("doc-new"))
        });
    written
}

#[tokio::test]
async fn new_published_episode_with_tags_is_created_with_publish_intent() {
    let table = parse("title,status,tags\nAI in Healthcare,Published,AI|Healthcare\n");

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .withf(|c, slug| *c == Collection::Episodes && slug == "ai-in-healthcare")
        .times(1)
        .returning(|_, _| Ok(None));
    store
        .expect_find_by_slug()
        .withf(|c, _| *c == Collection::Tags)
        .times(2)
        .returning(|_, _| Ok(None));
    store
        .expect_create()
        .withf(|c, _, publish| *c == Collection::Tags && *publish)
        .times(2)
        .returning(|_, data, _| {
            let slug = data["slug"].as_str().unwrap_or_default();
            Ok(entry(format!("tag-{slug}")))
        });
    store
        .expect_create()
        .withf(|c, data, publish| {
            *c == Collection::Episodes
                && *publish
                && data.get("slug") == Some(&json!("ai-in-healthcare"))
                && data.get("podcastStatus") == Some(&json!("published"))
                && data.get("tags") == Some(&json!(["tag-ai", "tag-healthcare"]))
        })
        .times(1)
        .returning(|_, _, _| Ok(entry("doc-1")));

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;

    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.records[0].slug.as_deref(), Some("ai-in-healthcare"));
    assert!(report.halted_at.is_none());
}

#[tokio::test]
async fn absent_columns_never_reach_the_payload() {
    let table = parse("title,description,date\nPlain Episode,Some words,not-a-date\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    let written = capture_episode_creates(&mut store);

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.created, 1);

    let written = written.lock().unwrap();
    let payload = &written[0];
    let mut keys: Vec<&str> = payload.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["description", "publishedDate", "slug", "title"]);
    // A malformed date clears the field instead of failing the record.
    assert_eq!(payload["publishedDate"], Value::Null);
}

#[tokio::test]
async fn identity_only_record_is_skipped_without_writing() {
    let table = parse("title,slug\nJust A Title,just-a-title\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().times(1).returning(|_, _| Ok(None));
    store.expect_create().never();
    store.expect_update().never();

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.skipped, 1);
    assert!(matches!(report.records[0].outcome, Outcome::Skipped(_)));
}

#[tokio::test]
async fn blank_optional_columns_do_not_make_an_existing_record_writable() {
    let table = parse("title,slug,description,tags,status,date\nJust A Title,just-a-title,,,,\n");

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .withf(|c, slug| *c == Collection::Episodes && slug == "just-a-title")
        .times(1)
        .returning(|_, _| Ok(Some(entry("doc-existing"))));
    store.expect_create().never();
    store.expect_update().never();

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.updated, 0);
}

#[tokio::test]
async fn blank_cells_clear_fields_when_the_row_has_content() {
    let table = parse("title,description,tags,date\nUpdated Show,New words,,\n");

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .returning(|_, _| Ok(Some(entry("doc-1"))));
    store
        .expect_update()
        .withf(|_, id, data, _| {
            id == "doc-1"
                && data.get("publishedDate") == Some(&Value::Null)
                && data.get("tags") == Some(&json!([]))
        })
        .times(1)
        .returning(|_, id, _, _| Ok(entry(id)));

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.updated, 1);
}

#[tokio::test]
async fn unrecognized_status_defaults_to_draft_only_for_new_records() {
    let table = parse("title,status,duration\nNew One,someday,10\nOld One,someday,5\n");

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .withf(|_, slug| slug == "new-one")
        .returning(|_, _| Ok(None));
    store
        .expect_find_by_slug()
        .withf(|_, slug| slug == "old-one")
        .returning(|_, _| Ok(Some(entry("doc-old"))));
    store
        .expect_create()
        .withf(|_, data, publish| !*publish && data.get("podcastStatus") == Some(&json!("draft")))
        .times(1)
        .returning(|_, _, _| Ok(entry("doc-new")));
    store
        .expect_update()
        .withf(|_, id, data, _| id == "doc-old" && !data.contains_key("podcastStatus"))
        .times(1)
        .returning(|_, id, _, _| Ok(entry(id)));

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;

    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.updated, 1);
}

#[tokio::test]
async fn unrecognized_status_alone_does_not_make_a_record_writable() {
    let table = parse("title,status\nNew One,someday\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    store.expect_create().never();

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.skipped, 1);
}

#[tokio::test]
async fn existing_record_is_updated_by_durable_id() {
    let table = parse("title,episode\nReturning Show,7\n");

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .returning(|_, _| Ok(Some(entry("doc-42"))));
    store
        .expect_update()
        .withf(|c, id, data, publish| {
            *c == Collection::Episodes
                && id == "doc-42"
                && !*publish
                && data.get("episodeNumber") == Some(&json!(7))
        })
        .times(1)
        .returning(|_, id, _, _| Ok(entry(id)));

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.updated, 1);
}

#[tokio::test]
async fn rejected_publishing_write_is_retried_once_without_publish() {
    let table = parse("title,status\nLaunch,published\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    store
        .expect_create()
        .withf(|_, _, publish| *publish)
        .times(1)
        .returning(|_, _, _| {
            Err(StoreError::Status {
                status: 400,
                body: "Invalid status".into(),
            })
        });
    store
        .expect_create()
        .withf(|_, _, publish| !*publish)
        .times(1)
        .returning(|_, _, _| Ok(entry("doc-1")));

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.created, 1);
}

#[tokio::test]
async fn draft_write_failure_is_not_retried() {
    let table = parse("title,status\nLaunch,draft\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    store.expect_create().times(1).returning(|_, _, _| {
        Err(StoreError::Status {
            status: 422,
            body: "episodeNumber must be positive".into(),
        })
    });

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.failed, 1);
    assert_eq!(
        report.records[0].outcome,
        Outcome::Failed("HTTP 422: episodeNumber must be positive".into())
    );
}

#[tokio::test]
async fn references_shared_across_rows_are_resolved_once() {
    let table = parse(
        "title,tags,company\nFirst,AI,Acme\nSecond,ai|Robotics,ACME\n",
    );

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .withf(|c, _| *c == Collection::Episodes)
        .returning(|_, _| Ok(None));
    for (collection, slug) in [
        (Collection::Tags, "ai"),
        (Collection::Tags, "robotics"),
        (Collection::Companies, "acme"),
    ] {
        store
            .expect_find_by_slug()
            .withf(move |c, s| *c == collection && s == slug)
            .times(1)
            .returning(|_, _| Ok(None));
        store
            .expect_create()
            .withf(move |c, data, _| *c == collection && data["slug"] == json!(slug))
            .times(1)
            .returning(move |_, _, _| Ok(entry(format!("{collection}-{slug}"))));
    }
    let written = capture_episode_creates(&mut store);

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.created, 2);

    let written = written.lock().unwrap();
    assert_eq!(written[1]["tags"], json!(["tags-ai", "tags-robotics"]));
    assert_eq!(written[1]["companies"], json!(["companies-acme"]));
}

#[tokio::test]
async fn strict_mode_stops_after_the_first_failure() {
    let table = parse("title,duration\nOne,10\nTwo,20\n,30\nFour,40\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    let written = capture_episode_creates(&mut store);

    let config = SyncConfig {
        strict: true,
        ..SyncConfig::default()
    };
    let mut seen = Vec::new();
    let report = synchronise(&store, &table, &config, |r| seen.push(r.row)).await;

    assert_eq!(report.halted_at, Some(3));
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(report.summary.created, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.total, 4);
    assert_eq!(
        report.records[2].outcome,
        Outcome::Failed("title is required".into())
    );
    assert_eq!(written.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failures_do_not_stop_a_lenient_run() {
    let table = parse("title,slug,duration\n!!!,,10\nFine,,20\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().returning(|_, _| Ok(None));
    capture_episode_creates(&mut store);

    let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.created, 1);
    assert_eq!(
        report.records[0].outcome,
        Outcome::Failed("slug could not be derived".into())
    );
}

#[tokio::test]
async fn row_limit_caps_processing() {
    let table = parse("title,duration\nOne,1\nTwo,2\nThree,3\n");

    let mut store = MockContentStore::new();
    store.expect_find_by_slug().times(1).returning(|_, _| Ok(None));
    capture_episode_creates(&mut store);

    let config = SyncConfig {
        limit: Some(1),
        ..SyncConfig::default()
    };
    let report = synchronise(&store, &table, &config, |_| {}).await;
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.processed(), 1);
}

#[tokio::test]
async fn second_run_against_synchronised_store_creates_nothing() {
    let csv = "title,status,tags\nAlpha,published,AI\nBeta,draft,\n";
    let table = parse(csv);

    let mut store = MockContentStore::new();
    store
        .expect_find_by_slug()
        .returning(|c, slug| Ok(Some(entry(format!("{c}-{slug}")))));
    store.expect_create().never();
    store
        .expect_update()
        .times(4)
        .returning(|_, id, _, _| Ok(entry(id)));

    for _ in 0..2 {
        let report = synchronise(&store, &table, &SyncConfig::default(), |_| {}).await;
        assert_eq!(report.summary.created, 0);
        assert_eq!(report.summary.updated, 2);
    }
}

#[tokio::test]
async fn dry_run_touches_nothing_remote() {
    let table = parse(
        "title,status,tags,companies,appleUrl,platformLinks\nDry,published,AI|ML,Acme,https://apple/x,\"[{\"\"platform\"\":\"\"apple\"\",\"\"url\"\":\"\"https://apple/x\"\"}]\"\n",
    );
    // No expectations: any remote call panics.
    let store = MockContentStore::new();

    let config = SyncConfig {
        dry_run: true,
        ..SyncConfig::default()
    };
    let report = synchronise(&store, &table, &config, |_| {}).await;

    assert!(report.summary.dry_run);
    assert_eq!(report.summary.created, 1);
}
