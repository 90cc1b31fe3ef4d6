//! Memcomparable byte-string encoding.
//!
//! Encodes a byte string into a self-delimiting form whose unsigned
//! lexicographic order matches that of the originals, so encoded elements
//! can be concatenated and compared as raw bytes.
//!
//! The input is cut into groups of 8 content bytes. Each group is emitted
//! as the 8 content bytes (zero-padded in the final group) followed by one
//! marker byte: `ESCAPE_LENGTH` (9) when another group follows, or the
//! content length of the final group (0..=8) to terminate.

use crate::common::{MinirelError, Result};

pub const ESCAPE_LENGTH: usize = 9;

/// Encoded size of an element of `len` bytes. An empty element still takes
/// one terminating group.
pub fn encoded_size(len: usize) -> usize {
    let groups = ((len + ESCAPE_LENGTH - 2) / (ESCAPE_LENGTH - 1)).max(1);
    groups * ESCAPE_LENGTH
}

/// Encodes `src` and appends the encoding to `dst`.
pub fn encode(src: &[u8], dst: &mut Vec<u8>) {
    let mut rest = src;
    loop {
        let copy_len = rest.len().min(ESCAPE_LENGTH - 1);
        dst.extend_from_slice(&rest[..copy_len]);
        rest = &rest[copy_len..];
        if rest.is_empty() {
            dst.resize(dst.len() + (ESCAPE_LENGTH - 1 - copy_len), 0);
            dst.push(copy_len as u8);
            return;
        }
        dst.push(ESCAPE_LENGTH as u8);
    }
}

/// Decodes one element from the front of `src`, returning the element and
/// the remaining input so a concatenated sequence can be streamed.
pub fn decode(src: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    let mut decoded = Vec::new();
    let mut rest = src;
    loop {
        if rest.len() < ESCAPE_LENGTH {
            return Err(MinirelError::Corrupted(
                "truncated memcomparable group".to_string(),
            ));
        }
        let (group, tail) = rest.split_at(ESCAPE_LENGTH);
        let marker = group[ESCAPE_LENGTH - 1] as usize;
        if marker > ESCAPE_LENGTH {
            return Err(MinirelError::Corrupted(format!(
                "invalid memcomparable group marker {}",
                marker
            )));
        }
        let copy_len = marker.min(ESCAPE_LENGTH - 1);
        decoded.extend_from_slice(&group[..copy_len]);
        rest = tail;
        if marker < ESCAPE_LENGTH {
            return Ok((decoded, rest));
        }
    }
}
