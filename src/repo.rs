use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encryption {
    None,
    Aes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Gzip,
}

/// A content-addressed unit of backup data.
///
/// `sha_sum` is the hex SHA-256 of the stored bytes (post-compress,
/// post-encrypt) and doubles as the repository identity and cache key.
/// `decrypted_sha_sum` is the hex SHA-256 of the plaintext and is checked
/// after decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Logical index within the owning archive.
    pub num: u32,
    /// Stored byte length of the chunk blob, before shard padding. The
    /// erasure join trims its output to this.
    pub size: usize,
    pub data_parts: u32,
    /// Zero means the chunk is stored as a single opaque blob.
    pub parity_parts: u32,
    pub sha_sum: String,
    pub decrypted_sha_sum: String,
    pub encryption: Encryption,
    pub compression: Compression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    File,
    Directory,
    SymLink,
}

/// One filesystem entry inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub kind: ArchiveKind,
    /// Relative path inside the snapshot root.
    pub path: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Modification time, unix seconds.
    pub mod_time: i64,
    /// Symlink target (SymLink only).
    pub points_to: Option<String>,
    /// Logical plaintext size (File only).
    pub size: u64,
    /// On-backend size (File only).
    pub storage_size: u64,
    /// Chunk descriptors. The snapshot format may store these in any
    /// order; each chunk carries its logical `num`.
    pub chunks: Vec<Chunk>,
}

impl Archive {
    /// Storage position of the chunk with logical index `num`.
    pub fn position_of_chunk(&self, num: u32) -> Result<usize, Error> {
        self.chunks
            .iter()
            .position(|c| c.num == num)
            .ok_or(Error::ChunkNotFound { num })
    }

    /// Logical chunk index and intra-chunk offset containing `offset`.
    pub fn chunk_for_offset(&self, offset: u64) -> Result<(u32, usize), Error> {
        if offset >= self.size {
            return Err(Error::Seek { offset });
        }
        let mut consumed = 0u64;
        for num in 0..self.chunks.len() as u32 {
            let pos = self.position_of_chunk(num)?;
            let len = self.chunks[pos].size as u64;
            if offset < consumed + len {
                return Ok((num, (offset - consumed) as usize));
            }
            consumed += len;
        }
        Err(Error::Seek { offset })
    }
}

/// A named, immutable collection of archives, stored parents-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub description: String,
    pub archives: Vec<Archive>,
}

/// Handle to an open repository: the decryption password and the storage
/// backend chunks are fetched from.
#[derive(Clone)]
pub struct Repository {
    pub password: String,
    pub backend: Arc<dyn Backend>,
}

impl Repository {
    pub fn new(password: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Repository {
            password: password.into(),
            backend,
        }
    }
}
