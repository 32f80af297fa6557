//! Duplicate-safe forwarding of logged QSOs to a Cloudlog server.
//!
//! Records arrive from a logger's `.adi` file or from its UDP multicast
//! broadcasts. Both paths share one [`persist::DupeCache`], so a contact is
//! delivered at most once across restarts and across sources.
//!
//! # Examples
//!
//! Parsing and keying a record with [`qso`]:
//! ```
//! use adifpush::qso;
//!
//! let line = "<QSO_DATE:8>20240115<TIME_ON:6>143000<CALL:5>W1ABC<FREQ:8>14.07400<MODE:3>FT8<EOR>";
//! let rec = qso::parse(line).expect("valid record");
//! assert_eq!(rec.call(), "W1ABC");
//!
//! let spaced = "<CALL:5>W1ABC <MODE:3>FT8 <QSO_DATE:8>20240115 <FREQ:8>14.07400 <TIME_ON:6>143000";
//! assert_eq!(qso::dupe_key(line), qso::dupe_key(spaced));
//! ```
//!
//! Syncing a log file:
//! ```no_run
//! use adifpush::{
//!     config::{CloudlogConfig, UploadConfig},
//!     ingest::FileIngestor,
//!     persist::file::FileDupeCache,
//!     upload::CloudlogClient,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cfg = CloudlogConfig::new("https://log.example.com", "api-key", "1").expect("config");
//! let client = CloudlogClient::new(&cfg, &UploadConfig::default()).expect("client");
//! let cache = FileDupeCache::new("uploaded_qsos");
//! let mut ingestor = FileIngestor::new(cache, client);
//! let summary = ingestor.ingest_file(std::path::Path::new("wsjtx_log.adi")).await.expect("read");
//! println!("{} sent, {} skipped", summary.sent, summary.skipped);
//! # }
//! ```
#![warn(missing_docs)]

/// Tag scanner shared by file and datagram parsing.
pub mod adif;
/// Credentials, paths and tunables.
pub mod config;
/// Whole-file ingestion.
pub mod ingest;
/// Duplicate cache abstraction and backends.
pub mod persist;
/// Contact records and duplicate keys.
pub mod qso;
/// Live multicast listener.
pub mod runtime;
/// Shared primitive types and tags.
pub mod types;
/// Cloudlog upload client.
pub mod upload;
