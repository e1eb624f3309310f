use tracing::debug;

use crate::codec::decode_chunk;
use crate::error::Error;
use crate::repo::{Chunk, Repository};
use crate::rs_codec::RsCodec;

/// Fetch and decode one chunk, reassembling shards as needed.
pub fn load_chunk(repository: &Repository, chunk: &Chunk) -> Result<Vec<u8>, Error> {
    let raw = load_raw(repository, chunk)?;
    decode_chunk(&repository.password, chunk, raw)
}

/// Reassemble the stored ciphertext for `chunk` from its shards.
///
/// Single-blob chunks take the fast path: one backend fetch, errors
/// propagated. Sharded chunks fetch shard positions in index order,
/// tolerating individual failures; as soon as enough shards are present
/// the data is reconstructed (if any data shard is missing) and joined.
/// A failed reconstruct or join just keeps the loop fetching parity.
fn load_raw(repository: &Repository, chunk: &Chunk) -> Result<Vec<u8>, Error> {
    if chunk.parity_parts == 0 {
        return repository.backend.load_chunk(chunk, 0);
    }

    let data_parts = chunk.data_parts as usize;
    let total = data_parts + chunk.parity_parts as usize;
    let rs = RsCodec::new(data_parts, chunk.parity_parts as usize)?;

    let mut shards: Vec<Option<Vec<u8>>> = vec![None; total];
    let mut found = 0u32;

    for i in 0..total {
        match repository.backend.load_chunk(chunk, i as u32) {
            Ok(data) => shards[i] = Some(data),
            Err(err) => {
                debug!(chunk = %chunk.sha_sum, shard = i, error = %err, "shard unavailable");
                continue;
            }
        }
        found += 1;

        if (found as usize) < data_parts {
            continue;
        }

        // Enough shards. Reconstruction mutates the array, so work on a
        // copy in case a later parity shard is needed for another try.
        let mut attempt = shards.clone();
        if attempt[..data_parts].iter().any(Option::is_none)
            && rs.reconstruct(&mut attempt).is_err()
        {
            continue;
        }
        match rs.join(&attempt, chunk.size) {
            Ok(data) => return Ok(data),
            Err(_) => continue,
        }
    }

    Err(Error::Reconstruction {
        found,
        missing: chunk.data_parts.saturating_sub(found),
        data_parts: chunk.data_parts,
    })
}
