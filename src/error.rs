use thiserror::Error;

/// Decode-pipeline error taxonomy. Display strings are part of the public
/// contract: callers (and the encrypted config store) match on them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not find chunk #{num}")]
    ChunkNotFound { num: u32 },

    #[error("Could not seek to offset {offset}")]
    Seek { offset: u64 },

    #[error("{method} mismatch, expected {expected}, got {got}")]
    Checksum {
        method: &'static str,
        expected: String,
        got: String,
    },

    #[error("Could not reconstruct data, got {found} out of {data_parts} chunks ({missing} backends missing data)")]
    Reconstruction {
        found: u32,
        missing: u32,
        data_parts: u32,
    },

    /// AEAD tag verification failed. The exact text is relied upon by the
    /// configuration store and its callers.
    #[error("cipher: message authentication failed")]
    CipherAuth,

    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
