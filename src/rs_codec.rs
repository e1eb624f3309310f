use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::error::Error;

/// Thin wrapper over the GF(2^8) Reed–Solomon codec with the split/join
/// halves the chunk pipeline needs: `split` pads and fans a blob out into
/// `k` equal data shards, `join` concatenates data shards back and trims
/// the padding.
pub struct RsCodec {
    pub data_parts: usize,
    pub parity_parts: usize,
    inner: ReedSolomon,
}

impl RsCodec {
    pub fn new(data_parts: usize, parity_parts: usize) -> Result<Self, Error> {
        let inner = ReedSolomon::new(data_parts, parity_parts)
            .map_err(|e| Error::Other(format!("reed-solomon init: {e:?}")))?;
        Ok(RsCodec {
            data_parts,
            parity_parts,
            inner,
        })
    }

    /// Split `data` into `data_parts` zero-padded shards plus zeroed
    /// parity slots, ready for [`encode`](Self::encode).
    pub fn split(&self, data: &[u8]) -> Vec<Vec<u8>> {
        let shard_len = data.len().div_ceil(self.data_parts).max(1);
        let mut shards = Vec::with_capacity(self.data_parts + self.parity_parts);
        for i in 0..self.data_parts {
            let start = (i * shard_len).min(data.len());
            let end = ((i + 1) * shard_len).min(data.len());
            let mut shard = data[start..end].to_vec();
            shard.resize(shard_len, 0);
            shards.push(shard);
        }
        for _ in 0..self.parity_parts {
            shards.push(vec![0u8; shard_len]);
        }
        shards
    }

    /// Fill the parity slots from the data shards, in place.
    pub fn encode(&self, shards: &mut [Vec<u8>]) -> Result<(), Error> {
        let mut refs: Vec<&mut [u8]> = shards.iter_mut().map(|s| s.as_mut_slice()).collect();
        self.inner
            .encode(&mut refs)
            .map_err(|e| Error::Other(format!("reed-solomon encode: {e:?}")))
    }

    /// Rebuild missing shards. Needs at least `data_parts` present.
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), Error> {
        self.inner
            .reconstruct(shards)
            .map_err(|e| Error::Other(format!("reed-solomon reconstruct: {e:?}")))
    }

    /// Concatenate the data shards and trim to `size` bytes. Fails when a
    /// data shard is still missing or the shards cannot cover `size`.
    pub fn join(&self, shards: &[Option<Vec<u8>>], size: usize) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(size);
        for shard in shards.iter().take(self.data_parts) {
            let shard = shard
                .as_ref()
                .ok_or_else(|| Error::Other("data shard missing after reconstruct".into()))?;
            out.extend_from_slice(shard);
        }
        if out.len() < size {
            return Err(Error::Other(format!(
                "joined shards cover {} bytes, need {}",
                out.len(),
                size
            )));
        }
        out.truncate(size);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_encode_join_roundtrip() {
        let rs = RsCodec::new(3, 2).unwrap();
        let data: Vec<u8> = (0u8..=99).collect();
        let mut shards = rs.split(&data);
        rs.encode(&mut shards).unwrap();
        let opts: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        assert_eq!(rs.join(&opts, data.len()).unwrap(), data);
    }

    #[test]
    fn reconstruct_restores_missing_data_shards() {
        let rs = RsCodec::new(3, 2).unwrap();
        let data: Vec<u8> = (0u8..=99).collect();
        let mut shards = rs.split(&data);
        rs.encode(&mut shards).unwrap();

        let mut opts: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        opts[1] = None;
        opts[4] = None;
        rs.reconstruct(&mut opts).unwrap();
        assert_eq!(rs.join(&opts, data.len()).unwrap(), data);
    }

    #[test]
    fn join_rejects_missing_data_shard() {
        let rs = RsCodec::new(2, 1).unwrap();
        let opts = vec![Some(vec![1, 2]), None, Some(vec![5, 6])];
        assert!(rs.join(&opts, 4).is_err());
    }
}
