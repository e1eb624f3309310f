use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::progress::Stats;
use crate::repo::{Archive, ArchiveKind};
use crate::restore::DecodeContext;

/// Random-access read over a File archive: `size` bytes starting at
/// `offset`, truncated at end of file. Non-File archives read as empty.
///
/// A chunk load failure fails the whole read; partial results are never
/// returned. After a successful read the next chunk is prefetched in the
/// background to warm the cache for sequential consumers.
pub fn read_archive(
    ctx: &Arc<DecodeContext>,
    archive: &Archive,
    offset: u64,
    size: usize,
) -> Result<Vec<u8>, Error> {
    if archive.kind != ArchiveKind::File {
        return Ok(Vec::new());
    }

    let (mut chunk_num, mut internal) = archive.chunk_for_offset(offset)?;
    let mut out = Vec::with_capacity(size.min((archive.size - offset) as usize));

    while out.len() < size {
        if chunk_num as usize >= archive.chunks.len() {
            return Ok(out);
        }
        let pos = archive.position_of_chunk(chunk_num)?;
        let data = ctx.cached_chunk(&archive.chunks[pos])?;

        if internal < data.len() {
            let want = size - out.len();
            let end = data.len().min(internal + want);
            out.extend_from_slice(&data[internal..end]);
        }
        internal = 0;
        chunk_num += 1;
    }

    prefetch(ctx, archive, chunk_num);
    Ok(out)
}

/// Decode a whole File archive to memory, chunk by chunk through the
/// cache, together with per-archive stats. Non-File archives yield empty
/// bytes and zeroed stats.
pub fn decode_archive_data(
    ctx: &DecodeContext,
    archive: &Archive,
) -> Result<(Vec<u8>, Stats), Error> {
    let mut stats = Stats::default();
    let mut out = Vec::new();

    if archive.kind != ArchiveKind::File {
        return Ok((out, stats));
    }

    for num in 0..archive.chunks.len() as u32 {
        let pos = archive.position_of_chunk(num)?;
        let data = ctx.cached_chunk(&archive.chunks[pos])?;
        out.extend_from_slice(&data);
    }

    stats.files += 1;
    stats.size += archive.size;
    stats.storage_size += archive.storage_size;
    stats.transferred += archive.size;
    Ok((out, stats))
}

/// Queue a background load of the chunk at logical index `chunk_num`.
/// Runs on the context's capped pool; already-cached or in-flight keys
/// are dropped, and failures only cost the warm cache.
fn prefetch(ctx: &Arc<DecodeContext>, archive: &Archive, chunk_num: u32) {
    if chunk_num as usize >= archive.chunks.len() {
        return;
    }
    let task_ctx = Arc::clone(ctx);
    let archive = archive.clone();
    ctx.prefetch.spawn(move || {
        let pos = match archive.position_of_chunk(chunk_num) {
            Ok(pos) => pos,
            Err(_) => return,
        };
        let chunk = &archive.chunks[pos];
        if task_ctx.cache.is_cached_or_loading(&chunk.sha_sum) {
            return;
        }
        if let Err(err) = task_ctx.cached_chunk(chunk) {
            debug!(chunk = %chunk.sha_sum, error = %err, "prefetch failed");
        }
    });
}
