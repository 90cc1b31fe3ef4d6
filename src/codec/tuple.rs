//! Tuple codec: a record is a list of byte-string elements, serialized as
//! the concatenation of their memcomparable encodings. Because each element
//! encoding preserves order and is self-delimiting, whole encoded tuples
//! compare element-wise as raw bytes.

use crate::common::Result;

use super::memcmp;

/// Encodes each element in order, appending to `dst`.
pub fn encode<T: AsRef<[u8]>>(elems: &[T], dst: &mut Vec<u8>) {
    for elem in elems {
        memcmp::encode(elem.as_ref(), dst);
    }
}

/// Decodes a concatenation of encoded elements, pushing each onto `elems`.
pub fn decode(bytes: &[u8], elems: &mut Vec<Vec<u8>>) -> Result<()> {
    let mut rest = bytes;
    while !rest.is_empty() {
        let (elem, tail) = memcmp::decode(rest)?;
        elems.push(elem);
        rest = tail;
    }
    Ok(())
}
