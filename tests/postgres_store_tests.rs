//! Runs against a live Postgres with the `vector` extension available.
//! `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use common::{
    CountingEmbeddingProvider, InterleavedTransaction, TestApp, chunk, embed,
    plan_with_new_chunks,
};
use dedup_store::application::use_cases::search_content::SearchContentRequest;
use dedup_store::domain::repositories::{
    DedupRepository, StoreError, StoreTransaction, TransactionRunner, TransactionalDedupRepository,
};
use dedup_store::domain::services::persist_ingestion;
use dedup_store::domain::value_objects::{IngestStatus, chunk_hash, content_hash};
use dedup_store::infrastructure::database::{PostgresStore, create_connection_pool, run_migrations};

fn postgres_store() -> Arc<PostgresStore> {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = create_connection_pool(&url, 4).expect("pool");
    run_migrations(&pool).expect("migrations");
    Arc::new(PostgresStore::new(pool))
}

fn postgres_repository() -> Arc<dyn DedupRepository> {
    Arc::new(TransactionalDedupRepository::new(postgres_store()))
}

/// Tests share one database, so every fixture carries its own marker.
fn unique(text: &str) -> String {
    format!("{} {}", text, Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn test_postgres_link_and_collect() {
    let app = TestApp::new(postgres_repository(), CountingEmbeddingProvider::new());
    let body = unique("hello world");
    let hash = content_hash(body.as_bytes());
    let (user1, user2) = (unique("user1"), unique("user2"));

    let first = app.ingest(&user1, "a.txt", body.as_bytes()).await;
    assert_eq!(first.status, IngestStatus::Created);
    assert_eq!(first.chunks_total, 1);

    let second = app.ingest(&user2, "b.txt", body.as_bytes()).await;
    assert_eq!(second.status, IngestStatus::Linked);

    app.delete(&user1, first.file_id).await;
    assert!(app.repository().find_global_file(&hash).await.unwrap().is_some());

    let deleted = app.delete(&user2, second.file_id).await;
    assert!(deleted.outcome.content_collected);
    assert_eq!(deleted.outcome.chunks_collected, 1);
    assert!(app.repository().find_global_file(&hash).await.unwrap().is_none());
    assert!(
        app.repository()
            .find_global_chunk(&chunk_hash(&body))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_shared_chunks_and_isolation() {
    let app = TestApp::new(postgres_repository(), CountingEmbeddingProvider::new());
    let shared = unique("shared paragraph");
    let (one, two) = (unique("unique one"), unique("unique two"));
    let (owner, stranger) = (unique("owner"), unique("stranger"));

    let first = app
        .ingest(&owner, "one.txt", format!("{shared}\n{one}").as_bytes())
        .await;
    let second = app
        .ingest(&owner, "two.txt", format!("{shared}\n{two}").as_bytes())
        .await;
    assert_eq!(second.chunks_newly_embedded, 1);

    let hits = app
        .container
        .search_content_use_case
        .execute(SearchContentRequest {
            query_embedding: embed(&shared),
            user_id: stranger.clone(),
            top_k: 5,
            file_id_allowlist: None,
        })
        .await
        .unwrap();
    assert_eq!(hits.total_results, 0);

    let hits = app
        .container
        .search_content_use_case
        .execute(SearchContentRequest {
            query_embedding: embed(&shared),
            user_id: owner.clone(),
            top_k: 5,
            file_id_allowlist: Some(vec![second.file_id]),
        })
        .await
        .unwrap();
    assert_eq!(hits.results[0].content, shared);
    assert!(hits.results.iter().all(|h| h.file_id == second.file_id));

    let deleted = app.delete(&owner, first.file_id).await;
    assert_eq!(deleted.outcome.chunks_collected, 1);
    assert!(
        app.repository()
            .find_global_chunk(&chunk_hash(&shared))
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(app.chunk_texts(&owner, second.file_id).await, vec![shared, two]);

    app.delete(&owner, second.file_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_postgres_concurrent_ingest_and_delete() {
    let app = Arc::new(TestApp::new(postgres_repository(), CountingEmbeddingProvider::new()));
    let body = unique("contended paragraph");
    let mut tasks = Vec::new();

    for round in 0..8 {
        let app = app.clone();
        let body = format!("{body}\nround {}", round % 2);
        tasks.push(tokio::spawn(async move {
            let user = format!("racer{}", round % 3);
            let response = app.ingest(&user, "race.txt", body.as_bytes()).await;
            app.delete(&user, response.file_id).await;
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    for round in 0..2 {
        let hash = content_hash(format!("{body}\nround {round}").as_bytes());
        assert!(app.repository().find_global_file(&hash).await.unwrap().is_none());
    }
    assert!(
        app.repository()
            .find_global_chunk(&chunk_hash(&body))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_chunk_collected_after_conflicting_insert() {
    let store = postgres_store();
    let repository = TransactionalDedupRepository::new(store.clone());
    let (stray, fresh) = (unique("stray paragraph"), unique("fresh paragraph"));
    let stray_chunk = chunk(&stray);
    assert!(repository.upsert_chunk(&stray_chunk).await.unwrap());

    let body = format!("{stray}\n{fresh}");
    let plan = plan_with_new_chunks(&unique("owner"), body.as_bytes(), &[&stray, &fresh]);
    let collectable = BTreeSet::from([stray_chunk.hash().clone()]);
    let collector = store.clone();

    // The insert of the already committed stray chunk takes no row lock, so
    // a collector on another connection can remove it before it is linked.
    let result = store.run_in_transaction(&mut |tx| {
        let mut interleaved = InterleavedTransaction {
            inner: tx,
            after_chunk_insert: |_: &mut dyn StoreTransaction| {
                collector.run_in_transaction(&mut |other| {
                    other.delete_unreferenced_chunks(&collectable).map(|_| ())
                })
            },
        };
        persist_ingestion(&mut interleaved, &plan).map(|_| ())
    });

    assert!(matches!(result, Err(StoreError::ConcurrentModification(_))));
    assert!(repository.find_global_chunk(stray_chunk.hash()).await.unwrap().is_none());
    assert!(repository.find_global_chunk(&chunk_hash(&fresh)).await.unwrap().is_none());
    assert!(
        repository
            .find_global_file(plan.content.hash())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore]
async fn test_postgres_search_orders_by_similarity() {
    let app = TestApp::new(postgres_repository(), CountingEmbeddingProvider::new());
    let owner = unique("ranker");
    let lines = [unique("first line"), unique("second line"), unique("third line")];
    let file = app.ingest(&owner, "ranked.txt", lines.join("\n").as_bytes()).await;

    let hits = app
        .container
        .search_content_use_case
        .execute(SearchContentRequest {
            query_embedding: embed(&lines[1]),
            user_id: owner.clone(),
            top_k: 3,
            file_id_allowlist: None,
        })
        .await
        .unwrap();

    assert_eq!(hits.total_results, 3);
    assert_eq!(hits.results[0].content, lines[1]);
    assert!((hits.results[0].similarity_score - 1.0).abs() < 1e-4);
    assert!(
        hits.results
            .windows(2)
            .all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
    );

    app.delete(&owner, file.file_id).await;
}
