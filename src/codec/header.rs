//! Fixed-size buffer header
//!
//! Layout (little-endian):
//!
//! ```text
//! 0..4    magic "DFRC"
//! 4       format version
//! 5..13   argument fingerprint
//! 13..21  target id
//! ```

use crate::core::{Fingerprint, TargetId};
use crate::errors::DecodeError;

pub const MAGIC: [u8; 4] = *b"DFRC";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 21;

/// Routing information that precedes the encoded arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub fingerprint: Fingerprint,
    pub target: TargetId,
}

impl Header {
    pub fn new(fingerprint: Fingerprint, target: TargetId) -> Self {
        Self {
            version: FORMAT_VERSION,
            fingerprint,
            target,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.fingerprint.as_u64().to_le_bytes());
        out.extend_from_slice(&self.target.as_u64().to_le_bytes());
    }

    /// Parse the header at the start of `buffer`
    ///
    /// A buffer that is a strict prefix of a valid header is `Truncated`; one
    /// that already disagrees with the magic or version is `Malformed`.
    pub fn parse(buffer: &[u8]) -> Result<Self, DecodeError> {
        let magic_len = buffer.len().min(MAGIC.len());
        if buffer[..magic_len] != MAGIC[..magic_len] {
            return Err(DecodeError::Malformed("bad magic".to_string()));
        }

        if let Some(&version) = buffer.get(MAGIC.len()) {
            if version != FORMAT_VERSION {
                return Err(DecodeError::Malformed(format!(
                    "unsupported format version {}",
                    version
                )));
            }
        }

        if buffer.len() < HEADER_LEN {
            return Err(DecodeError::Truncated { available: buffer.len() });
        }

        Ok(Self {
            version: buffer[4],
            fingerprint: Fingerprint::from_u64(read_u64(&buffer[5..13])),
            target: TargetId::from_u64(read_u64(&buffer[13..21])),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_le_bytes(raw)
}
