//! Compression utilities

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};

/// Inflate a zlib stream.
///
/// # Errors
/// Returns an error if the stream is not valid zlib data.
pub fn inflate_zlib(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::with_capacity(expected_size);

    decoder.read_to_end(&mut decompressed).map_err(|e| {
        Error::invalid(
            "zlib",
            format!(
                "failed to inflate block ({} bytes, expected {expected_size}): {e}",
                compressed.len()
            ),
        )
    })?;

    Ok(decompressed)
}
