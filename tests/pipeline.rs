mod common;

use std::sync::atomic::Ordering;

use assessrank::{
    error::Error,
    model::{Query, ScoredItem},
};
use common::{Reply, record, recommender, two_item_catalog, write_catalog};

fn urls(items: &[ScoredItem]) -> Vec<&str> {
    items.iter().map(ScoredItem::url).collect()
}

#[tokio::test]
async fn retrieval_prefers_matching_type() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    let rec = recommender(dir.path(), &catalog, Reply::Down).await;

    let found = rec
        .retrieve(&Query::new("cognitive test").with_top_k(1))
        .await
        .unwrap();
    assert_eq!(urls(&found), vec!["u1", "u2"]);
    assert!(found[0].score > found[1].score);
    assert!(found.iter().all(|r| (0.0..=1.0).contains(&r.score)));
}

#[tokio::test]
async fn generator_down_falls_back_to_best_retrieval_result() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    let rec = recommender(dir.path(), &catalog, Reply::Down).await;

    let retrieved = rec
        .retrieve(&Query::new("cognitive test").with_top_k(1))
        .await
        .unwrap();
    let result = rec
        .recommend(&Query::new("cognitive test").with_top_k(1))
        .await
        .unwrap();

    assert_eq!(result, retrieved[..1].to_vec());
    assert_eq!(rec.refiner().generator().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upper_case_reply_rescores_known_item() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    let rec = recommender(
        dir.path(),
        &catalog,
        Reply::Text(r#"[{"URL":"u1","Score":0.9}]"#),
    )
    .await;

    let result = rec
        .recommend(&Query::new("cognitive test").with_top_k(1))
        .await
        .unwrap();
    assert_eq!(urls(&result), vec!["u1"]);
    assert!((result[0].score - 0.9).abs() < 1e-6);
    assert_eq!(result[0].item.name, "A");
}

#[tokio::test]
async fn reply_naming_unknown_url_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    let rec = recommender(
        dir.path(),
        &catalog,
        Reply::Text(r#"[{"url":"u9","score":0.5}]"#),
    )
    .await;

    let result = rec
        .recommend(&Query::new("cognitive test").with_top_k(1))
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn index_survives_reopen_without_reembedding() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    {
        let index = common::index(dir.path(), &catalog).await;
        assert_eq!(index.len(), 2);
    }

    // Catalog changes are ignored once the store is populated.
    write_catalog(dir.path(), &[record("u3", "C", &["Sales"])]);
    let index = common::index(dir.path(), &catalog).await;
    assert_eq!(index.len(), 2);
    assert_eq!(index.embedder().calls.load(Ordering::SeqCst), 0);

    let found = index.search("personality", 1).await.unwrap();
    assert_eq!(urls(&found), vec!["u2"]);
}

#[tokio::test]
async fn tags_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        dir.path(),
        &[record(
            "u1",
            "A",
            &["Ability & Aptitude", "Knowledge & Skills", "Simulations"],
        )],
    );
    let index = common::index(dir.path(), &catalog).await;

    let found = index.search("anything", 5).await.unwrap();
    assert_eq!(
        found[0].item.test_type,
        vec!["Ability & Aptitude", "Knowledge & Skills", "Simulations"]
    );
}

#[tokio::test]
async fn invalid_records_are_skipped_at_seed() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        dir.path(),
        &[
            record("u1", "A", &["Cognitive"]),
            serde_json::json!({"url": "u2", "name": "broken"}),
            serde_json::json!("not an object"),
        ],
    );
    let index = common::index(dir.path(), &catalog).await;
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn empty_catalog_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &[]);
    let result = assessrank::VectorIndex::open_or_seed(
        &dir.path().join("index.redb"),
        &catalog,
        common::KeywordEmbedder::default(),
        Default::default(),
        std::time::Duration::from_secs(5),
    )
    .await;
    assert!(matches!(result, Err(Error::DataLoad { .. })));
}

#[tokio::test]
async fn blank_query_is_invalid_not_a_pipeline_error() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_item_catalog(dir.path());
    let rec = recommender(dir.path(), &catalog, Reply::Down).await;

    match rec.recommend(&Query::new("")).await {
        Err(Error::InvalidQuery(_)) => {}
        Err(Error::Pipeline { stage, .. }) => panic!("unexpected {stage} failure"),
        other => panic!("unexpected: {other:?}"),
    }
}
