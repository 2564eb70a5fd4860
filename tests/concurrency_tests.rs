mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::harness::{fvecs, random_dataset, CountingStore, FaultyStore, InstrumentedBackend, TestHarness};
use vectorlake::index::NativeBackend;
use vectorlake::{IndexVariant, VectorLakeError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dataset_fetched_once_under_contention() {
    let harness = TestHarness::new();
    let counting = CountingStore::new(Arc::clone(&harness.store));
    let engine = Arc::new(
        harness
            .engine_with(
                counting.clone(),
                NativeBackend::default(),
                "dataset-once",
                Some(fvecs(&random_dataset(500, 32))),
            )
            .await,
    );

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move { engine.get_vector_array().await }));
    }
    let mut loaded = Vec::new();
    for h in handles {
        loaded.push(h.await.unwrap().unwrap());
    }

    assert_eq!(counting.gets(), 1);
    assert!(loaded.iter().all(|d| Arc::ptr_eq(d, &loaded[0])));
    assert_eq!(loaded[0].len(), 500);

    harness.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_index_fetched_once_under_contention() {
    let harness = TestHarness::new();
    let data = random_dataset(200, 16);
    let builder = harness.engine("index-once-builder", Some(fvecs(&data))).await;
    builder.create_index(IndexVariant::Flat).await.unwrap();

    let counting = CountingStore::new(Arc::clone(&harness.store));
    let reader = Arc::new(
        harness
            .engine_with(counting.clone(), NativeBackend::default(), "index-once-reader", None)
            .await,
    );

    let mut handles = Vec::new();
    for i in 0..16 {
        let reader = Arc::clone(&reader);
        let query = data.row(i).to_vec();
        handles.push(tokio::spawn(async move {
            reader.search(&query, IndexVariant::Flat, 1).await
        }));
    }
    for (i, h) in handles.into_iter().enumerate() {
        let result = h.await.unwrap().unwrap();
        assert_eq!(result.ids, vec![i as u64]);
    }

    assert_eq!(counting.gets_for("flat.index"), 1);
    assert_eq!(counting.gets(), 1);

    harness.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuild_does_not_disturb_inflight_searches() {
    let harness = TestHarness::new();
    let data = random_dataset(300, 16);
    let backend = InstrumentedBackend::new(Duration::from_millis(100));
    let searches = Arc::clone(&backend.searches);
    let engine = Arc::new(
        harness
            .engine_with(Arc::clone(&harness.store), backend, "rebuild", Some(fvecs(&data)))
            .await,
    );
    engine.create_index(IndexVariant::Flat).await.unwrap();
    let expected = engine.search(data.row(5), IndexVariant::Flat, 10).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let query = data.row(5).to_vec();
        handles.push(tokio::spawn(async move {
            engine.search(&query, IndexVariant::Flat, 10).await
        }));
    }

    // Rebuild while the searches sleep inside the backend.
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.create_index(IndexVariant::Flat).await.unwrap();

    for h in handles {
        let result = h.await.unwrap().unwrap();
        assert_eq!(result, expected);
    }
    assert_eq!(searches.load(Ordering::SeqCst), 9);

    // The rebuilt artifact answers identically.
    let after = engine.search(data.row(5), IndexVariant::Flat, 10).await.unwrap();
    assert_eq!(after, expected);

    harness.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_variant_does_not_block_others() {
    let harness = TestHarness::new();
    let data = random_dataset(300, 16);
    let builder = harness.engine("independence-builder", Some(fvecs(&data))).await;
    for variant in IndexVariant::ALL {
        builder.create_index(variant).await.unwrap();
    }

    let faulty = FaultyStore::new(Arc::clone(&harness.store), "/pq.index");
    let reader = harness
        .engine_with(faulty.clone(), NativeBackend::default(), "independence-reader", None)
        .await;

    let report = reader.cache_all_indexes().await;
    assert_eq!(
        report.loaded(),
        vec![
            IndexVariant::Flat,
            IndexVariant::Lsh,
            IndexVariant::Hnsw,
            IndexVariant::IvfFlat,
            IndexVariant::IvfPq,
        ]
    );
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, IndexVariant::Pq);
    assert!(matches!(failed[0].1, VectorLakeError::Transport { .. }));

    // The failed slot stays empty and a later call retries.
    assert!(!reader.resident_variants().await.contains(&IndexVariant::Pq));
    faulty.heal();
    let retry = reader.cache_all_indexes().await;
    assert!(retry.is_complete());
    reader.search(data.row(0), IndexVariant::Pq, 5).await.unwrap();

    harness.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_search_does_not_block_other_variants() {
    let harness = TestHarness::new();
    let data = random_dataset(100, 8);
    let backend = InstrumentedBackend::new(Duration::from_millis(1000));
    let engine = Arc::new(
        harness
            .engine_with(Arc::clone(&harness.store), backend, "cross-slot", Some(fvecs(&data)))
            .await,
    );
    engine.create_index(IndexVariant::Flat).await.unwrap();

    let slow = {
        let engine = Arc::clone(&engine);
        let query = data.row(0).to_vec();
        tokio::spawn(async move { engine.search(&query, IndexVariant::Flat, 3).await })
    };

    // Building another variant proceeds while the flat search is in flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.create_index(IndexVariant::Lsh).await.unwrap();
    assert!(!slow.is_finished());

    slow.await.unwrap().unwrap();

    harness.cleanup().await;
}
