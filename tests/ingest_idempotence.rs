mod common;

use std::time::Duration;

use tempfile::TempDir;

use adifpush::{
    config::RetryPolicy,
    ingest::{FileIngestor, IngestError},
    persist::{DupeCache, file::FileDupeCache},
    qso,
    upload::UploadError,
};

use common::{FakeUploader, K2XYZ, ThreadRecordingCache, W1ABC};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        retries: 5,
        backoff: Duration::from_millis(100),
    }
}

fn write_later(path: std::path::PathBuf, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        std::fs::write(path, format!("{W1ABC}\n")).expect("late write");
    });
}

fn write_log(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("wsjtx_log.adi");
    let mut text = String::from("WSJT-X ADIF Export\n<adif_ver:5>3.1.0\n<programid:6>WSJT-X\n<EOH>\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    std::fs::write(&path, text).expect("write log");
    path
}

#[tokio::test]
async fn single_record_is_sent_once_then_skipped() {
    let tmp = TempDir::new().expect("tmp");
    let cache_path = tmp.path().join("uploaded_qsos");
    let log = write_log(&tmp, &[W1ABC]);
    let uploader = FakeUploader::default();

    let mut ingestor = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone());
    let first = ingestor.ingest_file(&log).await.expect("first run");
    assert_eq!((first.sent, first.failed, first.skipped), (1, 0, 0));
    assert_eq!(uploader.attempts(), vec![W1ABC.to_string()]);

    let cached = FileDupeCache::new(&cache_path).load();
    assert_eq!(cached.len(), 1);
    assert!(cached.contains(&qso::dupe_key(W1ABC).expect("key")));

    let second = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("second run");
    assert_eq!((second.sent, second.skipped), (0, 1));
    assert_eq!(uploader.attempts().len(), 1);
}

#[tokio::test]
async fn rerun_on_unchanged_file_sends_nothing() {
    let tmp = TempDir::new().expect("tmp");
    let cache_path = tmp.path().join("uploaded_qsos");
    let log = write_log(&tmp, &[W1ABC, "", "# operator note", K2XYZ]);
    let uploader = FakeUploader::default();

    let first = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("first");
    assert_eq!(first.sent, 2);
    // Export banner and header tags are not records.
    assert_eq!(first.invalid, 4);

    let second = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("second");
    assert_eq!((second.sent, second.failed, second.skipped), (0, 0, 2));
    assert_eq!(uploader.attempts().len(), 2);
}

#[tokio::test]
async fn repeated_line_within_one_file_is_sent_once() {
    let tmp = TempDir::new().expect("tmp");
    let padded = format!("  {W1ABC}  ");
    let log = write_log(&tmp, &[W1ABC, padded.as_str()]);
    let uploader = FakeUploader::default();

    let summary = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("run");
    assert_eq!((summary.sent, summary.skipped), (1, 1));
}

#[tokio::test]
async fn failed_delivery_is_not_cached_and_retried_next_run() {
    let tmp = TempDir::new().expect("tmp");
    let cache_path = tmp.path().join("uploaded_qsos");
    let log = write_log(&tmp, &[W1ABC]);
    let uploader = FakeUploader::failing(500);

    let first = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("first");
    assert_eq!((first.sent, first.failed, first.skipped), (0, 1, 0));
    assert_eq!(first.failures[0].line_no, 5);
    assert!(matches!(first.failures[0].reason, UploadError::Status { code: 500, .. }));
    assert!(FileDupeCache::new(&cache_path).load().is_empty());

    uploader.set_failure(None);
    let second = FileIngestor::new(FileDupeCache::new(&cache_path), uploader.clone())
        .ingest_file(&log)
        .await
        .expect("second");
    assert_eq!((second.sent, second.skipped), (1, 0));
    assert_eq!(uploader.attempts().len(), 2);
}

#[tokio::test]
async fn failures_do_not_stop_the_run() {
    let tmp = TempDir::new().expect("tmp");
    let lines: Vec<String> = (0..8)
        .map(|i| format!("<QSO_DATE:8>20240115<TIME_ON:6>1500{i:02}<CALL:4>K{i}AA<EOR>"))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let log = write_log(&tmp, &refs);

    let summary = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), FakeUploader::failing(503))
        .ingest_file(&log)
        .await
        .expect("run");
    assert_eq!(summary.failed, 8);
    let report = summary.report_lines();
    assert_eq!(report.len(), 6);
    assert_eq!(report[5], "... and 3 more errors");
}

#[tokio::test]
async fn resend_mode_ignores_cache_but_records_success() {
    let tmp = TempDir::new().expect("tmp");
    let cache_path = tmp.path().join("uploaded_qsos");
    let log = write_log(&tmp, &[W1ABC]);
    let mut cache = FileDupeCache::new(&cache_path);
    cache.add(&qso::dupe_key(W1ABC).expect("key")).expect("seed");
    let uploader = FakeUploader::default();

    let summary = FileIngestor::new(cache, uploader.clone())
        .skip_duplicates(false)
        .ingest_file(&log)
        .await
        .expect("run");
    assert_eq!((summary.sent, summary.skipped), (1, 0));
    assert_eq!(FileDupeCache::new(&cache_path).load().len(), 1);
}

#[tokio::test]
async fn file_appearing_within_retry_window_is_read() {
    let tmp = TempDir::new().expect("tmp");
    let log = tmp.path().join("late.adi");
    write_later(log.clone(), Duration::from_millis(250));

    let summary = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), FakeUploader::default())
        .with_retry(fast_retry())
        .ingest_file(&log)
        .await
        .expect("eventually readable");
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn file_unavailable_past_retry_window_fails_the_run() {
    let tmp = TempDir::new().expect("tmp");
    let log = tmp.path().join("never.adi");
    let uploader = FakeUploader::default();

    let err = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), uploader.clone())
        .with_retry(fast_retry())
        .ingest_file(&log)
        .await
        .expect_err("unreadable");
    assert!(matches!(err, IngestError::Read { .. }));
    assert!(uploader.attempts().is_empty());
}

#[tokio::test]
async fn default_policy_waits_out_a_two_second_hold() {
    let tmp = TempDir::new().expect("tmp");
    let log = tmp.path().join("held.adi");
    write_later(log.clone(), Duration::from_millis(2200));

    let summary = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), FakeUploader::default())
        .with_retry(RetryPolicy::default())
        .ingest_file(&log)
        .await
        .expect("read on the last retry");
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn default_policy_gives_up_on_a_three_second_hold() {
    let tmp = TempDir::new().expect("tmp");
    let log = tmp.path().join("held.adi");
    write_later(log.clone(), Duration::from_millis(3000));

    let started = std::time::Instant::now();
    let err = FileIngestor::new(FileDupeCache::new(tmp.path().join("c")), FakeUploader::default())
        .ingest_file(&log)
        .await
        .expect_err("still held");
    assert!(matches!(err, IngestError::Read { .. }));
    assert!(started.elapsed() >= Duration::from_millis(2500));
}

#[tokio::test]
async fn cache_io_runs_off_the_runtime_thread() {
    let tmp = TempDir::new().expect("tmp");
    let log = write_log(&tmp, &[W1ABC, K2XYZ]);
    let cache = ThreadRecordingCache::default();

    let summary = FileIngestor::new(cache.clone(), FakeUploader::default())
        .ingest_file(&log)
        .await
        .expect("run");
    assert_eq!(summary.sent, 2);

    let runtime_thread = std::thread::current().id();
    let threads = cache.threads();
    assert_eq!(threads.len(), 3);
    assert!(threads.iter().all(|t| *t != runtime_thread));
}
