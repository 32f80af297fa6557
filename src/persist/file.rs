//! Duplicate cache stored as one key per line, sorted ascending.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::types::DupeKey;

use super::{DupeCache, PersistResult};

/// Whole-file cache rewritten on every [`DupeCache::add`].
///
/// Writes go to a sibling temp file that is then renamed over the cache, so
/// a reader never sees a half-written list. Concurrent writers in separate
/// processes are not coordinated: the last rename wins.
#[derive(Debug, Clone)]
pub struct FileDupeCache {
    path: PathBuf,
}

impl FileDupeCache {
    /// Cache backed by `path`. Nothing is touched until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&self, keys: &HashSet<DupeKey>) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut sorted: Vec<&DupeKey> = keys.iter().collect();
        sorted.sort();

        let tmp = self.path.with_extension("tmp");
        {
            let mut out = io::BufWriter::new(fs::File::create(&tmp)?);
            for key in sorted {
                writeln!(out, "{key}")?;
            }
            out.flush()?;
        }
        fs::rename(&tmp, &self.path)
    }
}

impl DupeCache for FileDupeCache {
    fn load(&self) -> HashSet<DupeKey> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return HashSet::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "duplicate cache unreadable, treating as empty");
                return HashSet::new();
            }
        };

        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(DupeKey::from_stored)
            .collect()
    }

    fn add(&mut self, key: &DupeKey) -> PersistResult<()> {
        let mut keys = self.load();
        keys.insert(key.clone());
        self.write_all(&keys)?;
        debug!(%key, total = keys.len(), "duplicate cache updated");
        Ok(())
    }

    fn clear(&mut self) -> PersistResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
