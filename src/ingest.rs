//! Sync of a whole log file through the duplicate cache and upload client.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use hashbrown::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::RetryPolicy,
    persist::{self, DupeCache},
    qso,
    types::DupeKey,
    upload::{QsoUploader, UploadError},
};

/// Failures shown individually before the rest are only counted.
pub const REPORTED_FAILURES: usize = 5;

/// Run-ending ingestion failure.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file could not be read within the retry budget.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Last error seen.
        #[source]
        source: io::Error,
    },
}

/// One line the server did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    /// 1-based line number in the file.
    pub line_no: usize,
    /// Delivery error for that line.
    pub reason: UploadError,
}

/// Outcome counts for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records accepted by the server.
    pub sent: usize,
    /// Records the server rejected or never received.
    pub failed: usize,
    /// Records already in the duplicate cache.
    pub skipped: usize,
    /// Lines that are not records (headers, junk); never sent.
    pub invalid: usize,
    /// Per-line detail for `failed`, in file order.
    pub failures: Vec<LineFailure>,
}

impl IngestSummary {
    /// Operator-facing failure lines: the first few, then a remainder count.
    pub fn report_lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .failures
            .iter()
            .take(REPORTED_FAILURES)
            .map(|f| format!("Line {}: {}", f.line_no, f.reason))
            .collect();
        if self.failures.len() > REPORTED_FAILURES {
            out.push(format!(
                "... and {} more errors",
                self.failures.len() - REPORTED_FAILURES
            ));
        }
        out
    }
}

/// Reads `path` into lines, retrying while another program holds it.
///
/// Every I/O error is retried `policy.retries` times, waiting
/// `policy.backoff` before each retry; the last error is then returned.
/// Invalid UTF-8 is replaced rather than rejected.
pub async fn read_lines_with_retry(path: &Path, policy: &RetryPolicy) -> io::Result<Vec<String>> {
    let mut retry = 0;
    loop {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                return Ok(String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect());
            }
            Err(err) if retry < policy.retries => {
                retry += 1;
                debug!(path = %path.display(), retry, error = %err, "log file busy, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Drives every record of a log file through the uploader once.
pub struct FileIngestor<C, U> {
    cache: Arc<Mutex<C>>,
    uploader: U,
    retry: RetryPolicy,
    skip_duplicates: bool,
}

impl<C: DupeCache + 'static, U: QsoUploader> FileIngestor<C, U> {
    /// Ingestor with the default retry policy and duplicate skipping on.
    pub fn new(cache: C, uploader: U) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
            uploader,
            retry: RetryPolicy::default(),
            skip_duplicates: true,
        }
    }

    /// Replaces the file-open retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// When off, the cache is not consulted; successes are still recorded.
    pub fn skip_duplicates(mut self, on: bool) -> Self {
        self.skip_duplicates = on;
        self
    }

    /// Reads `path` and ingests its lines. Only an unreadable file is an
    /// error; per-line problems end up in the summary.
    pub async fn ingest_file(&mut self, path: &Path) -> Result<IngestSummary, IngestError> {
        let lines = read_lines_with_retry(path, &self.retry)
            .await
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), lines = lines.len(), "syncing log file");
        let summary = self.ingest_lines(lines.iter().map(String::as_str)).await;
        info!(
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            invalid = summary.invalid,
            "sync finished"
        );
        Ok(summary)
    }

    /// Ingests already-read lines; line numbers start at 1.
    pub async fn ingest_lines<'a, I>(&mut self, lines: I) -> IngestSummary
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: HashSet<DupeKey> = if self.skip_duplicates {
            persist::load_blocking(&self.cache).await.unwrap_or_else(|err| {
                warn!(error = %err, "duplicate cache load failed, treating as empty");
                HashSet::new()
            })
        } else {
            HashSet::new()
        };
        let mut summary = IngestSummary::default();

        for (idx, raw) in lines.into_iter().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(key) = qso::dupe_key(line) else {
                summary.invalid += 1;
                continue;
            };
            if self.skip_duplicates && seen.contains(&key) {
                summary.skipped += 1;
                continue;
            }

            match self.uploader.push(line).await {
                Ok(()) => {
                    summary.sent += 1;
                    if let Err(err) = persist::add_blocking(&self.cache, &key).await {
                        warn!(line_no, error = %err, "sent but could not record in duplicate cache");
                    }
                    seen.insert(key);
                }
                Err(reason) => {
                    warn!(line_no, %reason, "upload failed");
                    summary.failed += 1;
                    summary.failures.push(LineFailure { line_no, reason });
                }
            }
        }

        summary
    }
}
