use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::repo::{Chunk, Compression, Encryption};
use crate::{compress, crypto};

/// Decode a reassembled chunk blob into verified plaintext.
///
/// The order is fixed: authenticated decrypt first, decompress second,
/// content-hash check last. Ciphertext authentication gates the
/// decompressor, so bytes that fail the AEAD tag never reach the gzip
/// inflater.
pub fn decode_chunk(password: &str, chunk: &Chunk, data: Vec<u8>) -> Result<Vec<u8>, Error> {
    let mut data = data;
    if chunk.encryption == Encryption::Aes {
        data = crypto::decrypt(password, &data)?;
    }
    if chunk.compression == Compression::Gzip {
        data = compress::decompress(&data)?;
    }

    let digest = hex::encode(Sha256::digest(&data));
    if digest != chunk.decrypted_sha_sum {
        return Err(Error::Checksum {
            method: "sha256",
            expected: chunk.decrypted_sha_sum.clone(),
            got: digest,
        });
    }
    Ok(data)
}
