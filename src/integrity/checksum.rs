//! Streaming content digests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// SHA-256 and MD5 of a file's full content, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    pub sha256: String,
    pub md5: String,
}

/// Hash the whole file in 64 KiB chunks.
pub fn compute(path: &Path) -> std::io::Result<Checksums> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut sha = Sha256::new();
    let mut md5 = md5::Context::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha.update(&buf[..n]);
        md5.consume(&buf[..n]);
    }

    Ok(Checksums {
        sha256: hex::encode(sha.finalize()),
        md5: format!("{:x}", md5.compute()),
    })
}
