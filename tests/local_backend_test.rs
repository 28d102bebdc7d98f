//! Integration tests for resilient reads over local files
//!
//! Real files on disk, served in 64 KiB chunks, with faults injected on top.

use std::io::Write;
use std::sync::Arc;

use steadfast::backend::{Fault, FaultPlan, FaultyObject, HashKind, LocalStore, OpenOption, RangeSpec};
use steadfast::{HardObject, SteadfastConfig};
use tempfile::{NamedTempFile, TempDir};

fn write_file(dir: &TempDir, name: &str, len: usize) -> Vec<u8> {
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, &data).unwrap();
    data
}

#[tokio::test]
async fn test_large_file_with_dropped_connections() {
    let temp_dir = TempDir::new().unwrap();
    let data = write_file(&temp_dir, "videos/clip.bin", 1_000_000);

    let local = LocalStore::new(temp_dir.path())
        .object("videos/clip.bin")
        .await
        .unwrap();
    let plan = FaultPlan::script([
        Fault::DropAfter(100_000),
        Fault::RejectOpen,
        Fault::CutAfter(70_000),
        Fault::DropAfter(250_001),
    ]);
    let faulty = Arc::new(FaultyObject::new(Arc::new(local), plan));
    let config = SteadfastConfig::from_toml_str("[retry]\nmax_attempts = 5\ninitial_backoff_ms = 1\nmax_backoff_ms = 5\n")
        .unwrap();
    let object = HardObject::new(faulty.clone()).with_policy(config.retry_policy());

    let mut reader = object.open(&[OpenOption::Range(RangeSpec::new(12_345, 987_654))]);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    reader.close().await.unwrap();

    assert_eq!(out.len(), 987_654 - 12_345 + 1);
    assert_eq!(out, &data[12_345..=987_654]);
    assert_eq!(faulty.open_attempts(), 5);

    // Every reopen resumes exactly where the previous stream stopped
    let starts: Vec<u64> = faulty
        .opened_with()
        .iter()
        .map(|options| match options.as_slice() {
            [OpenOption::Range(range)] => range.decode(data.len() as u64).0,
            other => panic!("unexpected directives {:?}", other),
        })
        .collect();
    assert_eq!(
        starts,
        vec![12_345, 112_345, 112_345, 182_345, 432_346]
    );
}

#[tokio::test]
async fn test_forwarded_operations_on_local_file() {
    let temp_dir = TempDir::new().unwrap();
    let data = write_file(&temp_dir, "notes.txt", 1000);

    let local = LocalStore::new(temp_dir.path()).object("notes.txt").await.unwrap();
    let path = local.path().to_path_buf();
    let object = HardObject::new(Arc::new(local));

    assert_eq!(object.size(), 1000);
    assert_eq!(object.to_string(), "Hard: notes.txt");
    assert_eq!(
        object.hash(HashKind::Blake3).await.unwrap(),
        Some(blake3::hash(&data).to_hex().to_string())
    );
    let metadata = object.metadata().await.unwrap().unwrap();
    assert_eq!(metadata.get("size").map(String::as_str), Some("1000"));

    object.remove().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_missing_file_fails_fast() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir, "short-lived.txt", 10);
    let local = LocalStore::new(temp_dir.path())
        .object("short-lived.txt")
        .await
        .unwrap();
    let object = HardObject::new(Arc::new(local));

    std::fs::remove_file(temp_dir.path().join("short-lived.txt")).unwrap();

    let mut reader = object.open(&[]);
    let mut buf = [0u8; 8];
    let err = reader.read(&mut buf).await.unwrap_err();
    assert!(matches!(err, steadfast::ReaderError::Backend(ref e) if e.is_not_found()));
}

#[test]
fn test_config_file_drives_policy() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "remote = \"/srv/objects\"\n\n[retry]\nmax_attempts = 0\njitter = false\nfail_fast_on_permanent = false"
    )
    .unwrap();

    let config = SteadfastConfig::from_file(file.path()).unwrap();
    let policy = config.retry_policy();
    assert!(policy.is_unbounded());
    assert!(!policy.fail_fast_on_permanent);
    assert_eq!(policy.jitter_factor, 0.0);
}
