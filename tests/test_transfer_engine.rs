// tests/test_transfer_engine.rs
//
// Exercises the batch engine against instrumented in-memory operations:
// partitioning, batch sequencing, concurrency bounds, and failure isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use s3kit::transfer::{TransferError, TransferOptions, copy_batched, download_pooled};

fn keys(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}/{i}.dat")).collect()
}

#[tokio::test]
async fn batch_count_is_ceiling_and_report_preserves_input_order() {
    for (n, batch_size) in [(1usize, 1usize), (3, 2), (10, 3), (10, 10), (25, 1000)] {
        let sources = keys("src", n);
        let dests = keys("dst", n);
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));

        let seen_in_op = seen.clone();
        let options = TransferOptions::default().with_batch_size(batch_size);
        let report = copy_batched(&sources, &dests, &options, move |src, dst| {
            let seen = seen_in_op.clone();
            async move {
                seen.lock().unwrap().push((src, dst));
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(report.batches, n.div_ceil(batch_size), "n={n} batch_size={batch_size}");
        assert!(report.is_complete_success());

        // Concatenating the per-batch outcomes reproduces the request list.
        let reported: Vec<(String, String)> = report
            .outcomes
            .iter()
            .map(|o| (o.source.clone(), o.dest.clone()))
            .collect();
        let expected: Vec<(String, String)> =
            sources.iter().cloned().zip(dests.iter().cloned()).collect();
        assert_eq!(reported, expected);

        // Every pair reached the store exactly once.
        let mut invoked = seen.lock().unwrap().clone();
        invoked.sort();
        let mut expected_sorted = expected;
        expected_sorted.sort();
        assert_eq!(invoked, expected_sorted);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn next_batch_does_not_start_until_previous_batch_drains() {
    const N: usize = 12;
    const BATCH: usize = 4;

    struct Probe {
        finished_per_batch: Vec<usize>,
        violations: usize,
    }

    let sources: Vec<String> = (0..N).map(|i| i.to_string()).collect();
    let dests = sources.clone();
    let probe = Arc::new(Mutex::new(Probe {
        finished_per_batch: vec![0; N.div_ceil(BATCH)],
        violations: 0,
    }));

    let probe_in_op = probe.clone();
    let options = TransferOptions::default().with_batch_size(BATCH);
    let report = copy_batched(&sources, &dests, &options, move |src, _dst| {
        let probe = probe_in_op.clone();
        async move {
            let batch = src.parse::<usize>().unwrap() / BATCH;
            {
                let mut p = probe.lock().unwrap();
                for earlier in 0..batch {
                    if p.finished_per_batch[earlier] < BATCH {
                        p.violations += 1;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            probe.lock().unwrap().finished_per_batch[batch] += 1;
            Ok(())
        }
    })
    .await
    .unwrap();

    assert!(report.is_complete_success());
    let p = probe.lock().unwrap();
    assert_eq!(p.violations, 0, "a task started before the previous batch drained");
    assert_eq!(p.finished_per_batch, vec![BATCH; N / BATCH]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_limit_bounds_in_flight_tasks() {
    const N: usize = 40;
    const LIMIT: usize = 5;

    let sources = keys("src", N);
    let dests = keys("dst", N);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let in_flight_op = in_flight.clone();
    let high_water_op = high_water.clone();
    let options = TransferOptions::default().with_worker_limit(LIMIT);
    let report = copy_batched(&sources, &dests, &options, move |_src, _dst| {
        let in_flight = in_flight_op.clone();
        let high_water = high_water_op.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(report.succeeded(), N);
    assert!(
        high_water.load(Ordering::SeqCst) <= LIMIT,
        "observed {} concurrent tasks with worker_limit {}",
        high_water.load(Ordering::SeqCst),
        LIMIT
    );
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_failing_item_does_not_block_siblings_or_later_batches() {
    const N: usize = 10;
    let sources = keys("src", N);
    let dests = keys("dst", N);
    let attempts = Arc::new(AtomicUsize::new(0));

    let attempts_op = attempts.clone();
    let options = TransferOptions::default().with_batch_size(5);
    let report = copy_batched(&sources, &dests, &options, move |src, _dst| {
        let attempts = attempts_op.clone();
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            if src == "src/3.dat" {
                return Err(anyhow!("access denied"));
            }
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), N, "every item must be attempted");
    assert_eq!(report.batches, 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), N - 1);
    let failed = &report.outcomes[3];
    assert_eq!(failed.source, "src/3.dat");
    assert!(failed.error.as_ref().unwrap().to_string().contains("access denied"));
}

#[tokio::test]
async fn mismatched_lengths_abort_before_any_dispatch() {
    let sources = keys("src", 5);
    let dests = keys("dst", 3);
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_op = calls.clone();
    let err = copy_batched(&sources, &dests, &TransferOptions::default(), move |_src, _dst| {
        let calls = calls_op.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TransferError>(),
        Some(TransferError::LengthMismatch { sources: 5, dests: 3 })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no store call may happen");
}

#[tokio::test]
async fn worked_example_three_copies_in_two_batches() {
    let sources: Vec<String> = ["a/1.txt", "a/2.txt", "a/3.txt"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let dests: Vec<String> = ["b/1.txt", "b/2.txt", "b/3.txt"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_in_op = seen.clone();
    let options = TransferOptions::default().with_batch_size(2).with_worker_limit(2);
    let report = copy_batched(&sources, &dests, &options, move |src, dst| {
        let seen = seen_in_op.clone();
        async move {
            seen.lock().unwrap().push((src, dst));
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(report.batches, 2);
    assert!(report.is_complete_success());

    let mut invoked = seen.lock().unwrap().clone();
    invoked.sort();
    assert_eq!(
        invoked,
        vec![
            ("a/1.txt".to_string(), "b/1.txt".to_string()),
            ("a/2.txt".to_string(), "b/2.txt".to_string()),
            ("a/3.txt".to_string(), "b/3.txt".to_string()),
        ]
    );
}

#[tokio::test]
async fn pooled_download_reports_outcomes_without_batching() {
    let keys = keys("obj", 7);
    let paths: Vec<String> = (0..7).map(|i| format!("/tmp/out/{i}.dat")).collect();
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_op = calls.clone();
    let report = download_pooled(&keys, &paths, 3, move |_key, _path| {
        let calls = calls_op.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.succeeded(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn pooled_download_rejects_mismatched_lists_before_dispatch() {
    let keys = keys("obj", 4);
    let paths: Vec<String> = (0..2).map(|i| format!("/tmp/out/{i}.dat")).collect();
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_op = calls.clone();
    let err = download_pooled(&keys, &paths, 3, move |_key, _path| {
        let calls = calls_op.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TransferError>(),
        Some(TransferError::LengthMismatch { sources: 4, dests: 2 })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_worker_limit_is_a_structural_error() {
    let sources = keys("src", 2);
    let dests = keys("dst", 2);

    let err = copy_batched(
        &sources,
        &dests,
        &TransferOptions::default().with_worker_limit(0),
        |_src, _dst| async move { Ok(()) },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TransferError>(),
        Some(TransferError::InvalidOptions(_))
    ));
}
