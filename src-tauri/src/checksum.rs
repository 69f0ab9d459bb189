use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BLOCK_SIZE: usize = 4096;

/// Hex SHA-256 of a file, read in 4 KiB blocks
pub fn file_sha256(path: &Path) -> io::Result<String> {
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a file", path.display()),
        ));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BLOCK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let hex = format!("{:x}", hasher.finalize());
    log::debug!("sha256 {} = {}", path.display(), hex);
    Ok(hex)
}
