use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::repo::Archive;

/// Restore counters. `size`/`storage_size` mirror the archive being
/// processed; `transferred` accumulates decoded bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub files: u64,
    pub dirs: u64,
    pub sym_links: u64,
    pub size: u64,
    pub storage_size: u64,
    pub transferred: u64,
}

/// One record on the snapshot decode progress stream. A populated `error`
/// means the stream closes without further successful records.
#[derive(Debug)]
pub struct Progress {
    pub path: String,
    pub total: Stats,
    pub current: Stats,
    pub error: Option<Error>,
}

impl Progress {
    pub(crate) fn event(archive: &Archive, total: Stats, current: Stats) -> Self {
        Progress {
            path: archive.path.clone(),
            total,
            current,
            error: None,
        }
    }

    pub(crate) fn from_error(error: Error) -> Self {
        Progress {
            path: String::new(),
            total: Stats::default(),
            current: Stats::default(),
            error: Some(error),
        }
    }
}
