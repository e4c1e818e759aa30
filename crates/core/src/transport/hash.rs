//! Content hashing (XXH64, seed 0).
//!
//! Hashes are rendered as 16 lowercase hex digits, zero-padded, and compared
//! as strings everywhere.

use std::hash::Hasher as _;
use std::path::Path;

use tokio::io::AsyncReadExt;
use twox_hash::XxHash64;

const CHUNK_SIZE: usize = 64 * 1024;

/// Render a 64-bit digest in the fixed-width form used by every snapshot.
pub fn format_hash(value: u64) -> String {
    format!("{:016x}", value)
}

/// Streaming XXH64 over arbitrary chunks.
pub struct ContentHasher {
    inner: XxHash64,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: XxHash64::with_seed(0),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    pub fn finish_hex(&self) -> String {
        format_hash(self.inner.finish())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(bytes);
    hasher.finish_hex()
}

/// Hash a file without loading it whole into memory.
pub async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finish_hex())
}
