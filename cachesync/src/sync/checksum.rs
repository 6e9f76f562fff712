//! SHA-1 content digests for local files.
//!
//! The remote manifest declares each file's SHA-1 as 40 hexadecimal
//! characters. Local digests are rendered uppercase, zero-padded; comparison
//! ignores case.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use super::error::{SyncError, SyncResult};

/// Length of a hex-rendered SHA-1 digest.
pub const DIGEST_HEX_LEN: usize = 40;

/// Buffer size for reading files during digest calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Compute the SHA-1 digest of a local file.
///
/// Returns `Ok(None)` when the file does not exist, which is the normal state
/// of a file that was never downloaded. Any other I/O failure is an error.
pub fn local_digest(path: &Path) -> SyncResult<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SyncError::local_io(path, e)),
    };

    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::local_io(path, e))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Some(format!("{:X}", hasher.finalize())))
}

/// Compare two hex digests, ignoring case.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
