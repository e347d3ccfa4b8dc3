//! Filesystem raw snapshot store, one `{YYYYMMDD}_{SYMBOL}.json` file per key.

use crate::domain::error::PipelineError;
use crate::domain::raw_snapshot::{RawSnapshot, snapshot_key};
use crate::ports::raw_store_port::{PutOutcome, RawStorePort};
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

pub struct FileRawStore {
    dir: PathBuf,
}

impl FileRawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn store_err(key: &str, e: std::io::Error) -> PipelineError {
        PipelineError::RawStore {
            key: key.to_string(),
            reason: e.to_string(),
        }
    }
}

impl RawStorePort for FileRawStore {
    fn put(&self, snapshot: &RawSnapshot) -> Result<PutOutcome, PipelineError> {
        let key = snapshot.key();
        fs::create_dir_all(&self.dir).map_err(|e| Self::store_err(&key, e))?;

        let path = self.dir.join(&key);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(PutOutcome::AlreadyPresent),
            Err(e) => return Err(Self::store_err(&key, e)),
        };
        if let Err(e) = file.write_all(&snapshot.body).and_then(|_| file.sync_all()) {
            // never leave a truncated snapshot behind a write-once key
            let _ = fs::remove_file(&path);
            return Err(Self::store_err(&key, e));
        }
        Ok(PutOutcome::Written)
    }

    fn get(&self, symbol: &str, date: NaiveDate) -> Result<Option<RawSnapshot>, PipelineError> {
        let key = snapshot_key(symbol, date);
        match fs::read(self.dir.join(&key)) {
            Ok(body) => Ok(Some(RawSnapshot::new(symbol, date, body))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::store_err(&key, e)),
        }
    }
}
