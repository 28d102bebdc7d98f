//! Integration tests for resilient reads
//!
//! These tests drive `HardObject` through the public API against scripted
//! faults and check that callers always see exactly the requested bytes.

use std::sync::Arc;
use std::time::Duration;

use steadfast::backend::{Fault, FaultPlan, FaultyObject, MemoryObject, OpenOption, RangeSpec, RemoteObject};
use steadfast::{HardObject, ReadOutcome, ReaderError, RetryPolicy};

fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn faulty_object(data: Vec<u8>, max_chunk: usize, plan: FaultPlan) -> Arc<FaultyObject> {
    Arc::new(FaultyObject::new(
        Arc::new(MemoryObject::new("bucket/blob.bin", data).with_max_chunk(max_chunk)),
        plan,
    ))
}

/// Deterministic mix of every recoverable fault
fn mixed_plan(len: usize) -> FaultPlan {
    let mut faults = Vec::with_capacity(len);
    for i in 0..len {
        faults.push(match i % 5 {
            0 => Fault::RejectOpen,
            1 => Fault::DropAfter(17 + i),
            2 => Fault::CutAfter(5 + i * 3),
            3 => Fault::Healthy,
            _ => Fault::DropAfter(1),
        });
    }
    FaultPlan::script(faults)
}

async fn read_all_small(reader: &mut steadfast::ResilientReader, buf_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; buf_size];
    loop {
        let n = reader.read(&mut buf).await.unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[tokio::test]
async fn test_content_survives_interleaved_failures() {
    let data = sample_data(4096);
    let windows: [(u64, Option<u64>); 5] = [
        (0, None),
        (1, None),
        (100, Some(3000)),
        (0, Some(777)),
        (4000, Some(4096)),
    ];

    for (offset, limit) in windows {
        let faulty = faulty_object(data.clone(), 61, mixed_plan(200));
        let object = HardObject::new(faulty.clone()).with_policy(RetryPolicy::immediate(10));

        let options = match limit {
            Some(limit) => vec![OpenOption::Range(RangeSpec::new(offset, limit - 1))],
            None if offset > 0 => vec![OpenOption::Seek { offset }],
            None => vec![],
        };
        let mut reader = object.open(&options);
        let out = read_all_small(&mut reader, 97).await;

        let end = limit.unwrap_or(data.len() as u64) as usize;
        assert_eq!(out, &data[offset as usize..end], "window {}..{:?}", offset, limit);
        assert_eq!(reader.offset(), end as u64);
        assert!(faulty.open_attempts() > 1);

        reader.close().await.unwrap();
        // Every stream ever opened has been released
        let failed_opens = reader.stats().failed_opens as usize;
        assert_eq!(faulty.closed_streams(), faulty.open_attempts() - failed_opens);
    }
}

#[tokio::test]
async fn test_ten_byte_scenario() {
    let faulty = Arc::new(FaultyObject::new(
        Arc::new(MemoryObject::new("digits", "0123456789")),
        FaultPlan::script([Fault::RejectOpen, Fault::DropAfter(3)]),
    ));
    let object = HardObject::new(faulty.clone()).with_policy(RetryPolicy::immediate(5));
    let mut reader = object.open(&[OpenOption::Range(RangeSpec::new(3, 7))]);
    let mut buf = [0u8; 10];

    assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
    assert_eq!(&buf[..3], b"345");
    assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
    assert_eq!(&buf[..2], b"67");
    assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    assert_eq!(reader.offset(), 8);
    assert_eq!(faulty.open_attempts(), 3);
}

#[tokio::test]
async fn test_end_of_stream_does_not_reopen() {
    let faulty = faulty_object(sample_data(10), 4, FaultPlan::default());
    let object = HardObject::new(faulty.clone());
    let mut reader = object.open(&[]);

    let out = read_all_small(&mut reader, 3).await;
    assert_eq!(out.len(), 10);
    let opens = faulty.open_attempts();

    let mut buf = [0u8; 8];
    for _ in 0..5 {
        assert_eq!(reader.read_outcome(&mut buf).await.unwrap(), ReadOutcome::EndOfStream);
    }
    assert_eq!(faulty.open_attempts(), opens);
}

#[tokio::test]
async fn test_close_semantics() {
    let faulty = faulty_object(sample_data(10), 10, FaultPlan::default());
    let object = HardObject::new(faulty.clone());
    let mut reader = object.open(&[]);
    let mut buf = [0u8; 4];

    reader.read(&mut buf).await.unwrap();
    reader.close().await.unwrap();
    assert_eq!(faulty.closed_streams(), 1);

    assert!(matches!(reader.close().await, Err(ReaderError::Closed)));
    assert!(matches!(reader.read(&mut buf).await, Err(ReaderError::Closed)));
    assert_eq!(faulty.open_attempts(), 1);
}

#[tokio::test]
async fn test_release_error_still_closes() {
    let faulty = faulty_object(sample_data(10), 10, FaultPlan::script([Fault::FailClose]));
    let object = HardObject::new(faulty.clone());
    let mut reader = object.open(&[]);
    let mut buf = [0u8; 4];

    reader.read(&mut buf).await.unwrap();
    assert!(matches!(reader.close().await, Err(ReaderError::Release(_))));
    assert!(reader.is_closed());
    assert!(matches!(reader.close().await, Err(ReaderError::Closed)));
}

#[tokio::test]
async fn test_retry_exhaustion_reports_last_error() {
    let faulty = faulty_object(sample_data(10), 10, FaultPlan::always(Fault::RejectOpen));
    let object = HardObject::new(faulty.clone()).with_policy(RetryPolicy::immediate(4));
    let mut reader = object.open(&[OpenOption::Seek { offset: 2 }]);
    let mut buf = [0u8; 4];

    match reader.read(&mut buf).await {
        Err(ReaderError::RetryExhausted { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert!(last.is_retriable());
        }
        other => panic!("expected retry exhaustion, got {:?}", other),
    }
    assert_eq!(faulty.open_attempts(), 4);
    assert_eq!(reader.offset(), 2);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let faulty = faulty_object(sample_data(10), 10, FaultPlan::always(Fault::RejectOpenPermanently));
    let object = HardObject::new(faulty.clone()).with_policy(RetryPolicy::immediate(4));
    let mut reader = object.open(&[]);
    let mut buf = [0u8; 4];

    let err = reader.read(&mut buf).await.unwrap_err();
    assert!(matches!(err, ReaderError::Backend(ref e) if e.is_not_found()));
    assert_eq!(faulty.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_and_caps() {
    let faulty = faulty_object(
        sample_data(10),
        10,
        FaultPlan::script([Fault::RejectOpen; 5]),
    );
    let policy = RetryPolicy {
        max_attempts: Some(10),
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(300),
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
        max_elapsed: None,
        fail_fast_on_permanent: true,
    };
    let object = HardObject::new(faulty.clone()).with_policy(policy);
    let mut reader = object.open(&[]);
    let mut buf = [0u8; 16];

    let start = tokio::time::Instant::now();
    assert_eq!(reader.read(&mut buf).await.unwrap(), 10);

    // 100 + 200 + 300 + 300 + 300
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1200), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1300), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_budget_bounds_a_read() {
    let faulty = faulty_object(sample_data(10), 10, FaultPlan::always(Fault::RejectOpen));
    let policy = RetryPolicy {
        max_attempts: None,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(1),
        backoff_multiplier: 1.0,
        jitter_factor: 0.0,
        max_elapsed: Some(Duration::from_secs(5)),
        fail_fast_on_permanent: true,
    };
    let object = HardObject::new(faulty.clone()).with_policy(policy);
    let mut reader = object.open(&[]);
    let mut buf = [0u8; 4];

    let err = reader.read(&mut buf).await.unwrap_err();
    assert!(err.is_retry_exhausted());
    assert!(faulty.open_attempts() >= 5);
}

#[tokio::test]
async fn test_stacked_hard_objects() {
    let faulty = faulty_object(
        sample_data(300),
        32,
        FaultPlan::script([Fault::DropAfter(40), Fault::CutAfter(10)]),
    );
    let inner: Arc<dyn RemoteObject> =
        Arc::new(HardObject::new(faulty.clone()).with_policy(RetryPolicy::immediate(3)));
    let outer = HardObject::new(inner);
    assert_eq!(outer.to_string(), "Hard: bucket/blob.bin");

    let mut reader = outer.open(&[OpenOption::Range(RangeSpec::new(20, 219))]);
    let out = read_all_small(&mut reader, 50).await;
    assert_eq!(out, &sample_data(300)[20..220]);
}
