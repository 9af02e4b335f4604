//! Byte codec primitives: length-prefixed, big-endian encode/decode for the
//! handful of value shapes the wire format is built from.
//!
//! All integers are fixed-width big-endian. Floats are reinterpreted as
//! their same-width unsigned integer and byte-swapped. Variable-length data
//! (blobs, strings, arrays, maps) is prefixed with a 16-bit big-endian byte
//! count; a top-level decode additionally requires the cursor to land
//! exactly on the end of the buffer.

use std::collections::HashMap;

use thiserror::Error;

/// Maximum size of any inner length-prefixed blob (`u16` byte count).
pub const MAX_BLOB_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("value would exceed {MAX_BLOB_LEN} bytes in a length-prefixed field")]
    Overflow,
    #[error("buffer truncated while decoding")]
    Truncated,
    #[error("string field was not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} leftover byte(s) after a complete top-level decode")]
    Trailing(usize),
}

pub type WireResult<T> = Result<T, WireError>;

/// Implemented by every wire-encodable value.
pub trait Encodable {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()>;
}

/// Implemented by every wire-decodable value. `cursor` is advanced by the
/// number of bytes consumed.
pub trait Decodable: Sized {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self>;
}

/// Decode a complete top-level value, requiring every byte of `buf` to be
/// consumed. Leftover bytes are treated as a corruption signal, per the wire
/// contract.
pub fn decode_complete<T: Decodable>(buf: &[u8]) -> WireResult<T> {
    let mut cursor = 0usize;
    let value = T::decode(buf, &mut cursor)?;
    if cursor != buf.len() {
        return Err(WireError::Trailing(buf.len() - cursor));
    }
    Ok(value)
}

fn take<'a>(buf: &'a [u8], cursor: &mut usize, len: usize) -> WireResult<&'a [u8]> {
    let end = cursor.checked_add(len).ok_or(WireError::Truncated)?;
    let slice = buf.get(*cursor..end).ok_or(WireError::Truncated)?;
    *cursor = end;
    Ok(slice)
}

macro_rules! impl_int {
    ($t:ty) => {
        impl Encodable for $t {
            fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
                out.extend_from_slice(&self.to_be_bytes());
                Ok(())
            }
        }

        impl Decodable for $t {
            fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
                let bytes = take(buf, cursor, std::mem::size_of::<$t>())?;
                Ok(<$t>::from_be_bytes(bytes.try_into().expect("slice length matches")))
            }
        }
    };
}

impl_int!(u8);
impl_int!(u16);
impl_int!(u32);
impl_int!(u64);
impl_int!(i32);
impl_int!(i64);

impl Encodable for f32 {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        self.to_bits().encode(out)
    }
}

impl Decodable for f32 {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        Ok(f32::from_bits(u32::decode(buf, cursor)?))
    }
}

impl Encodable for f64 {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        self.to_bits().encode(out)
    }
}

impl Decodable for f64 {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        Ok(f64::from_bits(u64::decode(buf, cursor)?))
    }
}

impl Encodable for bool {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        (*self as u8).encode(out)
    }
}

impl Decodable for bool {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        Ok(u8::decode(buf, cursor)? != 0)
    }
}

/// UTF-8 string, `u16` byte-count prefix, never null-terminated.
impl Encodable for String {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        let bytes = self.as_bytes();
        if bytes.len() > MAX_BLOB_LEN {
            return Err(WireError::Overflow);
        }
        (bytes.len() as u16).encode(out)?;
        out.extend_from_slice(bytes);
        Ok(())
    }
}

impl Decodable for String {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        let len = u16::decode(buf, cursor)? as usize;
        let bytes = take(buf, cursor, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

/// `u16` byte-count prefix (total size of the encoded elements, not the
/// element count) followed by the elements in turn. Arrays and maps are
/// deliberately prefixed differently: a byte count here lets a reader skip
/// an array of an unrecognized element type without knowing its shape.
impl<T: Encodable> Encodable for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        let mut body = Vec::new();
        for item in self {
            item.encode(&mut body)?;
        }
        if body.len() > MAX_BLOB_LEN {
            return Err(WireError::Overflow);
        }
        (body.len() as u16).encode(out)?;
        out.extend_from_slice(&body);
        Ok(())
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        let byte_count = u16::decode(buf, cursor)? as usize;
        let end = cursor.checked_add(byte_count).ok_or(WireError::Truncated)?;
        if end > buf.len() {
            return Err(WireError::Truncated);
        }
        let mut items = Vec::new();
        while *cursor < end {
            items.push(T::decode(buf, cursor)?);
        }
        if *cursor != end {
            return Err(WireError::Truncated);
        }
        Ok(items)
    }
}

/// `u16` element-count prefix followed by `(key, value)` pairs.
impl<K: Encodable + std::hash::Hash + Eq, V: Encodable> Encodable for HashMap<K, V> {
    fn encode(&self, out: &mut Vec<u8>) -> WireResult<()> {
        if self.len() > MAX_BLOB_LEN {
            return Err(WireError::Overflow);
        }
        (self.len() as u16).encode(out)?;
        for (k, v) in self {
            k.encode(out)?;
            v.encode(out)?;
        }
        Ok(())
    }
}

impl<K: Decodable + std::hash::Hash + Eq, V: Decodable> Decodable for HashMap<K, V> {
    fn decode(buf: &[u8], cursor: &mut usize) -> WireResult<Self> {
        let count = u16::decode(buf, cursor)? as usize;
        let mut map = HashMap::with_capacity(count.min(4096));
        for _ in 0..count {
            let k = K::decode(buf, cursor)?;
            let v = V::decode(buf, cursor)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}
