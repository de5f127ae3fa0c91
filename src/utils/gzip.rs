//! Gzip helpers for cached page and body blobs.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::Result;

/// Gzip-compress `data`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress gzip-compressed `data`.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_blob_is_gzip() {
        let blob = compress(b"<html>hello</html>").unwrap();
        assert_eq!(&blob[..2], &[0x1f, 0x8b]);
        assert_eq!(decompress(&blob).unwrap(), b"<html>hello</html>");
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(b"not gzip at all").is_err());
    }
}
