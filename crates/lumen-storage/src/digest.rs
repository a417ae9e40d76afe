use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::traits::StorageResult;

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of a file as lowercase hex, read in fixed-size chunks.
pub async fn sha256_file(path: &Path) -> StorageResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
