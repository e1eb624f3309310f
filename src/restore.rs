use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{lchown, symlink, DirBuilderExt, OpenOptionsExt};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread;

use filetime::FileTime;
use tracing::debug;

use crate::cache::{ChunkCache, DEFAULT_CACHE_BYTES};
use crate::error::Error;
use crate::progress::{Progress, Stats};
use crate::repo::{Archive, ArchiveKind, Chunk, Repository, Snapshot};
use crate::shard;

/// Worker threads for speculative chunk prefetch.
const PREFETCH_THREADS: usize = 2;

/// Everything a decode needs to run: the repository handle, the chunk
/// cache, and the prefetch pool. Owned by the caller and shared across
/// restore and random-access reads; nothing here is global.
pub struct DecodeContext {
    pub repository: Repository,
    pub(crate) cache: ChunkCache,
    pub(crate) prefetch: rayon::ThreadPool,
}

impl DecodeContext {
    pub fn new(repository: Repository) -> Result<Self, Error> {
        DecodeContext::with_cache_capacity(repository, DEFAULT_CACHE_BYTES)
    }

    pub fn with_cache_capacity(repository: Repository, capacity: usize) -> Result<Self, Error> {
        let prefetch = rayon::ThreadPoolBuilder::new()
            .num_threads(PREFETCH_THREADS)
            .build()
            .map_err(|e| Error::Other(format!("prefetch pool: {e}")))?;
        Ok(DecodeContext {
            repository,
            cache: ChunkCache::new(capacity),
            prefetch,
        })
    }

    /// Decoded plaintext for `chunk`, via the cache.
    pub(crate) fn cached_chunk(&self, chunk: &Chunk) -> Result<Arc<[u8]>, Error> {
        self.cache
            .get_or_load(&chunk.sha_sum, || shard::load_chunk(&self.repository, chunk))
    }
}

/// Materialize one archive at `path`, reporting progress through `emit`.
///
/// Directories and symlinks are single operations; files stream their
/// chunks in logical order through the cache and codec. Ownership is
/// restored last, with lchown so symlinks themselves are chowned. All
/// filesystem errors propagate.
pub fn decode_archive<F>(
    ctx: &DecodeContext,
    archive: &Archive,
    path: &Path,
    mut emit: F,
) -> Result<(), Error>
where
    F: FnMut(Progress) -> Result<(), Error>,
{
    let mut total = Stats::default();
    let mut current = Stats::default();

    match archive.kind {
        ArchiveKind::Directory => {
            DirBuilder::new()
                .recursive(true)
                .mode(archive.mode)
                .create(path)?;
            total.dirs += 1;
            emit(Progress::event(archive, total, current))?;
        }
        ArchiveKind::SymLink => {
            let target = archive
                .points_to
                .as_deref()
                .ok_or_else(|| Error::Other(format!("symlink {} has no target", archive.path)))?;
            symlink(target, path)?;
            total.sym_links += 1;
            emit(Progress::event(archive, total, current))?;
        }
        ArchiveKind::File => {
            total.files += 1;
            total.size = archive.size;
            total.storage_size = archive.storage_size;
            current.size = archive.size;
            current.storage_size = archive.storage_size;
            emit(Progress::event(archive, total, current))?;

            // Safety net for snapshots whose directory entries were not
            // iterated first.
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .mode(archive.mode)
                .open(path)?;

            for num in 0..archive.chunks.len() as u32 {
                let pos = archive.position_of_chunk(num)?;
                let data = ctx.cached_chunk(&archive.chunks[pos])?;
                file.write_all(&data)?;

                total.transferred += data.len() as u64;
                current.transferred += data.len() as u64;
                emit(Progress::event(archive, total, current))?;
            }

            file.flush()?;
            file.sync_all()?;
            drop(file);

            let mtime = FileTime::from_unix_time(archive.mod_time, 0);
            filetime::set_file_times(path, mtime, mtime)?;
        }
    }

    lchown(path, Some(archive.uid), Some(archive.gid))?;
    Ok(())
}

/// Restore a whole snapshot under `dest`, streaming progress.
///
/// A single producer thread walks the archives in stored order; the
/// returned channel is unbuffered, so the producer blocks until each
/// event is consumed. The first archive error is published as a progress
/// record carrying it and ends the stream.
pub fn decode_snapshot(
    ctx: Arc<DecodeContext>,
    snapshot: &Snapshot,
    dest: &Path,
) -> Receiver<Progress> {
    let (tx, rx) = sync_channel::<Progress>(0);
    let snapshot = snapshot.clone();
    let dest = dest.to_path_buf();

    thread::spawn(move || {
        for archive in &snapshot.archives {
            let path = dest.join(&archive.path);
            debug!(archive = %archive.path, "restoring archive");
            let result = decode_archive(&ctx, archive, &path, |event| {
                tx.send(event)
                    .map_err(|_| Error::Other("progress receiver dropped".into()))
            });
            if let Err(err) = result {
                let _ = tx.send(Progress::from_error(err));
                break;
            }
        }
        // tx drops here, closing the stream exactly once on every path.
    });

    rx
}
