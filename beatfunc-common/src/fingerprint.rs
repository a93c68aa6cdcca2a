//! Content fingerprints
//!
//! A fingerprint identifies a file by its bytes alone (XXH32, seed 0). It is a
//! cache key, not an integrity check: distinct files may collide.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use xxhash_rust::xxh32::Xxh32;

/// Read block size when streaming a source through the hasher
pub const BLOCK_SIZE: usize = 512;

const SEED: u32 = 0;

/// Content-derived identifier of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u32);

impl Fingerprint {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Fingerprint everything `reader` yields until end of input.
///
/// Reads in [`BLOCK_SIZE`] blocks so the whole source never sits in memory.
/// Short reads and `Interrupted` are tolerated; the digest depends only on the
/// byte sequence, not on how the reader chunks it.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Xxh32::new(SEED);
    let mut block = [0u8; BLOCK_SIZE];

    loop {
        let read = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&block[..read]);
    }

    Ok(Fingerprint(hasher.digest()))
}

/// Fingerprint the file at `path`
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let file = File::open(path)?;
    let fingerprint = fingerprint_reader(file)?;
    tracing::debug!(path = %path.display(), fingerprint = %fingerprint, "Fingerprinted file");
    Ok(fingerprint)
}
