mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use ruledb_core::config::FailurePolicy;
use ruledb_core::loader::{DecodeStrategy, DocumentLoader};
use ruledb_core::planner::QueryPlanner;
use ruledb_core::traits::{IndexStore, TextExtractor};
use ruledb_core::{Error, IndexStage};
use ruledb_hybrid::{RetrievalOptions, RetrievalPipeline};

use common::*;

#[tokio::test]
async fn end_to_end_single_chunk_document() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", LEAVE_DOC);
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore::default());

    let report = indexing(embedder.clone(), store.clone()).index_document(&path, COLLECTION).await.unwrap();
    assert_eq!(report.chunks, 1);
    assert_eq!(report.written, 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.inputs.load(Ordering::SeqCst), 1);
    assert_eq!(*store.upsert_sizes.lock().unwrap(), vec![1]);
    let stored = store.upsert_metadata.lock().unwrap().clone();
    assert_eq!(stored[0].chunk_index, 0);
    assert_eq!(stored[0].total_chunks, 1);
    assert_eq!(stored[0].text, LEAVE_DOC);
    assert_eq!(stored[0].source, "employee-rules.txt");

    let pipeline = retrieval(embedder.clone(), store.clone(), FailurePolicy::FailFast);
    let results = pipeline.retrieve("How many vacation days?", 3).await.unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2, "all variants embedded in one call");
    assert_eq!(results[0].id, "employee-rules.txt:0");
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[0].text, LEAVE_DOC);
    assert!(results[0].score > 0.0);
}

#[tokio::test]
async fn reindex_replaces_instead_of_accumulating() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore::default());
    let pipeline = indexing(embedder, store.clone());

    let first = pipeline.index_document(&path, COLLECTION).await.unwrap();
    let count_first = store.count(COLLECTION).await.unwrap();
    let second = pipeline.index_document(&path, COLLECTION).await.unwrap();
    let count_second = store.count(COLLECTION).await.unwrap();

    assert!(first.chunks > 1);
    assert_eq!(first, second);
    assert_eq!(count_first, first.chunks);
    assert_eq!(count_second, count_first);
    assert_eq!(
        store.ops(),
        vec!["delete", "create", "upsert:start", "upsert:end", "delete", "create", "upsert:start", "upsert:end"]
    );
}

#[tokio::test]
async fn keyword_variant_joins_the_fusion() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore::default());
    indexing(embedder.clone(), store.clone()).index_document(&path, COLLECTION).await.unwrap();

    let pipeline = retrieval(embedder.clone(), store.clone(), FailurePolicy::FailFast);
    let before = embedder.inputs.load(Ordering::SeqCst);
    let results = pipeline.retrieve("请假超过30天需要书面申请", 4).await.unwrap();
    assert_eq!(embedder.inputs.load(Ordering::SeqCst) - before, 2, "original + keyword variant");
    assert_eq!(results.len(), 4);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.rank, i + 1);
    }
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

fn poisoned_keyword_store(embedder: &CountingEmbedder) -> ScriptedStore {
    let store = ScriptedStore::default();
    let keyword_text = QueryPlanner::default().plan("请假超过30天需要书面申请")[1].text.clone();
    *store.poison.lock().unwrap() = Some(embedder.embed_one(&keyword_text));
    store
}

#[tokio::test]
async fn fail_fast_aborts_on_one_failed_source() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(poisoned_keyword_store(&embedder));
    indexing(embedder.clone(), store.clone()).index_document(&path, COLLECTION).await.unwrap();

    let err = retrieval(embedder, store, FailurePolicy::FailFast)
        .retrieve("请假超过30天需要书面申请", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetrievalSource { variant: 1, .. }), "{err:?}");
}

#[tokio::test]
async fn degrade_fuses_the_surviving_sources() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(poisoned_keyword_store(&embedder));
    indexing(embedder.clone(), store.clone()).index_document(&path, COLLECTION).await.unwrap();

    let results = retrieval(embedder.clone(), store.clone(), FailurePolicy::Degrade)
        .retrieve("请假超过30天需要书面申请", 3)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    // With one source left, fused order equals that source's order.
    let original = embedder.embed_one("请假超过30天需要书面申请");
    let direct = store.inner.query(COLLECTION, &original, 6).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    let expected: Vec<&str> = direct.iter().take(3).map(|r| r.id.as_str()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn degrade_with_every_source_failed_is_an_error() {
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore { fail_all_queries: true, ..Default::default() });
    let err = retrieval(embedder, store, FailurePolicy::Degrade).retrieve("请假", 3).await.unwrap_err();
    assert!(matches!(err, Error::EmptyFusionInput));
}

#[tokio::test]
async fn empty_collection_is_an_empty_result_not_an_error() {
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore::default());
    store.create_index(COLLECTION, DIM).await.unwrap();
    let results = retrieval(embedder, store, FailurePolicy::FailFast).retrieve("请假", 3).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn slow_store_query_times_out_as_source_failure() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", LEAVE_DOC);
    let embedder = Arc::new(CountingEmbedder::new());
    let store = Arc::new(ScriptedStore { query_delay: Some(Duration::from_millis(500)), ..Default::default() });
    indexing(embedder.clone(), store.clone()).index_document(&path, COLLECTION).await.unwrap();

    let options = RetrievalOptions { timeout: Duration::from_millis(20), ..RetrievalOptions::default() };
    let pipeline = RetrievalPipeline::new(QueryPlanner::default(), embedder, store, COLLECTION, options);
    let err = pipeline.retrieve("How many vacation days?", 3).await.unwrap_err();
    assert!(matches!(err, Error::RetrievalSource { variant: 0, .. }), "{err:?}");
}

#[tokio::test]
async fn slow_embedder_times_out_as_provider_error() {
    let mut slow = CountingEmbedder::new();
    slow.delay = Some(Duration::from_millis(500));
    let store = Arc::new(ScriptedStore::default());
    let options = RetrievalOptions { timeout: Duration::from_millis(20), ..RetrievalOptions::default() };
    let pipeline = RetrievalPipeline::new(QueryPlanner::default(), Arc::new(slow), store, COLLECTION, options);
    let err = pipeline.retrieve("How many vacation days?", 3).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider(_)));
}

#[tokio::test]
async fn embed_failure_leaves_existing_collection_untouched() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", LEAVE_DOC);
    let store = Arc::new(ScriptedStore::default());
    indexing(Arc::new(CountingEmbedder::new()), store.clone()).index_document(&path, COLLECTION).await.unwrap();

    let mut failing = CountingEmbedder::new();
    failing.fail = true;
    let err = indexing(Arc::new(failing), store.clone()).index_document(&path, COLLECTION).await.unwrap_err();
    match err {
        Error::Indexing { path: p, stage, .. } => {
            assert_eq!(p, path);
            assert_eq!(stage, IndexStage::Embed);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.count(COLLECTION).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_upsert_leaves_no_collection() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let store = Arc::new(ScriptedStore { fail_upsert: true, ..Default::default() });
    let err = indexing(Arc::new(CountingEmbedder::new()), store.clone())
        .index_document(&path, COLLECTION)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Indexing { stage: IndexStage::Upsert, .. }));
    assert!(store.inner.collection_names().await.is_empty());
    assert_eq!(store.ops().last().map(String::as_str), Some("delete"));
}

#[tokio::test]
async fn unsupported_document_fails_at_load() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.docx", "x");
    let store = Arc::new(ScriptedStore::default());
    let err = indexing(Arc::new(CountingEmbedder::new()), store.clone())
        .index_document(&path, COLLECTION)
        .await
        .unwrap_err();
    match err {
        Error::Indexing { stage: IndexStage::Load, source, .. } => {
            assert!(matches!(*source, Error::UnsupportedFormat { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.ops().is_empty(), "nothing touched the store");
}

struct UnreadablePdf;

impl TextExtractor for UnreadablePdf {
    fn extract(&self, _bytes: &[u8]) -> ruledb_core::Result<String> {
        Err(Error::Decode("encrypted PDF".to_string()))
    }
}

#[tokio::test]
async fn pdf_extraction_failure_fails_at_load() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.pdf", "%PDF-1.4");
    let store = Arc::new(ScriptedStore::default());
    let embedder = Arc::new(CountingEmbedder::new());
    let loader = DocumentLoader::new(Box::new(UnreadablePdf), DecodeStrategy::default());
    let err = indexing_with_loader(loader, embedder.clone(), store.clone())
        .index_document(&path, COLLECTION)
        .await
        .unwrap_err();
    match err {
        Error::Indexing { stage: IndexStage::Load, path: failed, source } => {
            assert_eq!(failed, path);
            assert!(matches!(*source, Error::Decode(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn missing_document_is_nothing_to_index() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ScriptedStore::default());
    let report = indexing(Arc::new(CountingEmbedder::new()), store.clone())
        .index_from_base(&tmp.path().join("employee-rules"), COLLECTION)
        .await
        .unwrap();
    assert!(report.is_none());
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn first_index_on_fresh_store_deletes_as_noop() {
    let tmp = TempDir::new().unwrap();
    write_doc(tmp.path(), "employee-rules.txt", LEAVE_DOC);
    let store = Arc::new(ScriptedStore::default());
    let report = indexing(Arc::new(CountingEmbedder::new()), store.clone())
        .index_from_base(&tmp.path().join("employee-rules"), COLLECTION)
        .await
        .unwrap()
        .expect("document found");
    assert_eq!(report.written, 1);
    assert_eq!(store.ops()[0], "delete");
}

#[tokio::test]
async fn concurrent_reindex_is_serialized() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(tmp.path(), "employee-rules.txt", &handbook());
    let store = Arc::new(ScriptedStore { upsert_delay: Some(Duration::from_millis(30)), ..Default::default() });
    let pipeline = indexing(Arc::new(CountingEmbedder::new()), store.clone());

    let (a, b) = tokio::join!(
        pipeline.index_document(&path, COLLECTION),
        pipeline.index_document(&path, COLLECTION)
    );
    let chunks = a.unwrap().chunks;
    b.unwrap();

    let one_run = ["delete", "create", "upsert:start", "upsert:end"];
    let expected: Vec<String> = one_run.iter().chain(one_run.iter()).map(|s| s.to_string()).collect();
    assert_eq!(store.ops(), expected);
    assert_eq!(store.count(COLLECTION).await.unwrap(), chunks);
}
