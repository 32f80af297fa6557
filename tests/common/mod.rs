#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    thread::ThreadId,
};

use hashbrown::HashSet;

use adifpush::{
    persist::{DupeCache, MemoryDupeCache, PersistResult},
    types::DupeKey,
    upload::{QsoUploader, UploadError, UploadResult},
};

pub const W1ABC: &str =
    "<QSO_DATE:8>20240115<TIME_ON:6>143000<CALL:5>W1ABC<FREQ:8>14.07400<MODE:3>FT8<EOR>";
pub const K2XYZ: &str =
    "<QSO_DATE:8>20240115<TIME_ON:6>150500<CALL:5>K2XYZ<FREQ:8>7.074000<MODE:3>FT8<TX_PWR:4>100W<EOR>";

/// Records every push and answers with a configurable status.
#[derive(Clone, Default)]
pub struct FakeUploader {
    attempts: Arc<Mutex<Vec<String>>>,
    fail_status: Arc<Mutex<Option<u16>>>,
}

impl FakeUploader {
    pub fn failing(code: u16) -> Self {
        let up = Self::default();
        up.set_failure(Some(code));
        up
    }

    pub fn set_failure(&self, code: Option<u16>) {
        *self.fail_status.lock().expect("lock") = code;
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("lock").clone()
    }
}

impl QsoUploader for FakeUploader {
    async fn push(&self, line: &str) -> UploadResult<()> {
        self.attempts.lock().expect("lock").push(line.to_string());
        match *self.fail_status.lock().expect("lock") {
            Some(code) => Err(UploadError::Status {
                code,
                body: "server error".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// In-memory cache that remembers which threads touched it.
#[derive(Clone, Default)]
pub struct ThreadRecordingCache {
    inner: Arc<Mutex<MemoryDupeCache>>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl ThreadRecordingCache {
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().expect("lock").clone()
    }

    fn record(&self) {
        self.threads.lock().expect("lock").push(std::thread::current().id());
    }
}

impl DupeCache for ThreadRecordingCache {
    fn load(&self) -> HashSet<DupeKey> {
        self.record();
        self.inner.lock().expect("lock").load()
    }

    fn add(&mut self, key: &DupeKey) -> PersistResult<()> {
        self.record();
        self.inner.lock().expect("lock").add(key)
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.record();
        self.inner.lock().expect("lock").clear()
    }
}
