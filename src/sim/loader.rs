//! Program image loading.
//!
//! Programs are flat little-endian images of the fixed-width test ISA.

use std::fs;
use std::io;
use std::path::Path;

/// Reads a flat binary image from disk.
pub fn read_image(path: &Path) -> io::Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "program image is empty",
        ));
    }
    Ok(bytes)
}

/// Packs instruction words into a little-endian byte image.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}
