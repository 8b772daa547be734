//! Decoder for Mozilla's mozLz4 session files.
//!
//! The format is an 8-byte `mozLz40\0` magic, a 4-byte little-endian
//! uncompressed size, then a single LZ4 block.

use anyhow::{bail, Context, Result};

const MAGIC: &[u8; 8] = b"mozLz40\x00";
const HEADER_LEN: usize = 12;

/// Decompresses a mozLz4 payload into its original bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        bail!("mozlz4 data too short: {} bytes", data.len());
    }
    if &data[..8] != MAGIC {
        bail!("invalid mozlz4 magic header");
    }

    let size = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
    let out = lz4_flex::block::decompress(&data[HEADER_LEN..], size).context("decompress mozlz4 block")?;
    Ok(out)
}
