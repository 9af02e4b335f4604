//! Versioned, signed, obfuscated envelope around a typed payload.
//!
//! Wire shape:
//!
//! ```text
//! u16  packet_version   (= 1, big-endian)
//! u8   algorithm_tag    (= 1 for Entropy)
//! u8   entropy_seed
//! u16  encrypted_len
//! [encrypted_len] bytes encrypted_blob
//! ```
//!
//! `encrypted_blob`, once decrypted, is `payload || sha256_signature`.

use thiserror::Error;

use crate::codec::{decode_complete, Decodable, Encodable, WireError};
use crate::hash::Sha256Hasher;
use crate::obfuscate::{entropy_apply, random_seed, ALGORITHM_TAG_ENTROPY};

/// Current packet format version. Any other value on the wire is a drop.
pub const PACKET_VERSION: u16 = 1;

/// IP datagram limit minus a 4 KiB header reserve.
pub const MAX_PACKET_BYTES: usize = 61_440;

/// Compile-time constant mixed into every signature. Binds a build to a
/// compatible peer build; not a secrecy mechanism.
const SHARED_SECRET: &str = "cardsync-wire-v1-shared-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("encoded packet would exceed {MAX_PACKET_BYTES} bytes")]
    TooLarge,
    #[error("wire encoding error: {0}")]
    Wire(#[from] WireError),
}

/// `(version, id)` tuple stamped on every message body. `id` is a stable
/// textual UUID identifying the message type; `version` is
/// application-defined per message type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadInfo {
    pub version: u16,
    pub id: String,
}

impl Encodable for PayloadInfo {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.version.encode(out)?;
        self.id.encode(out)
    }
}

impl Decodable for PayloadInfo {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let version = u16::decode(buf, cursor)?;
        let id = String::decode(buf, cursor)?;
        Ok(Self { version, id })
    }
}

/// `(info, data)`; `data.len() <= 65535` is enforced by the codec's blob
/// length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub info: PayloadInfo,
    pub data: Vec<u8>,
}

impl Encodable for Payload {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.info.encode(out)?;
        self.data.encode(out)
    }
}

impl Decodable for Payload {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let info = PayloadInfo::decode(buf, cursor)?;
        let data = Vec::<u8>::decode(buf, cursor)?;
        Ok(Self { info, data })
    }
}

/// `(algorithm_tag, seed)`. The seed is transmitted in the clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub algorithm_tag: u8,
    pub seed: u8,
}

impl CodecDescriptor {
    fn entropy(seed: u8) -> Self {
        Self { algorithm_tag: ALGORITHM_TAG_ENTROPY, seed }
    }
}

impl Encodable for CodecDescriptor {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.algorithm_tag.encode(out)?;
        self.seed.encode(out)
    }
}

impl Decodable for CodecDescriptor {
    fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let algorithm_tag = u8::decode(buf, cursor)?;
        let seed = u8::decode(buf, cursor)?;
        Ok(Self { algorithm_tag, seed })
    }
}

/// Recompute the per-packet signature digest and hash it. Never placed on
/// the wire itself.
fn signature_digest(
    codec: &CodecDescriptor,
    info: &PayloadInfo,
    data_len: u16,
) -> [u8; 32] {
    let mut hasher = Sha256Hasher::new();
    let mut scratch = Vec::new();

    PACKET_VERSION.encode(&mut scratch).expect("u16 never overflows");
    codec.algorithm_tag.encode(&mut scratch).expect("u8 never overflows");
    codec.seed.encode(&mut scratch).expect("u8 never overflows");
    info.version.encode(&mut scratch).expect("u16 never overflows");
    info.id.encode(&mut scratch).expect("message ids are short");
    data_len.encode(&mut scratch).expect("u16 never overflows");
    SHARED_SECRET.to_string().encode(&mut scratch).expect("shared secret is short");

    hasher.update(&scratch);
    hasher.finalize()
}

/// Constant-time-ish comparison: always walks the full length so timing
/// doesn't reveal the mismatching byte.
fn signatures_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Build the wire bytes for `payload`. Rejects anything that would exceed
/// [`MAX_PACKET_BYTES`] rather than truncating.
pub fn construct(payload: &Payload) -> Result<Vec<u8>, PacketError> {
    let seed = random_seed();
    let codec = CodecDescriptor::entropy(seed);

    if payload.data.len() > u16::MAX as usize {
        return Err(PacketError::Wire(WireError::Overflow));
    }
    let signature = signature_digest(&codec, &payload.info, payload.data.len() as u16);

    let mut inner = Vec::new();
    payload.encode(&mut inner)?;
    inner.extend_from_slice(&signature);

    let encrypted_blob = entropy_apply(&inner, seed);

    let mut out = Vec::new();
    PACKET_VERSION.encode(&mut out)?;
    codec.encode(&mut out)?;
    encrypted_blob.encode(&mut out)?;

    if out.len() > MAX_PACKET_BYTES {
        return Err(PacketError::TooLarge);
    }
    Ok(out)
}

/// Decode a raw UDP datagram back into its [`Payload`]. Any malformed or
/// tamper-evident input silently returns `None` — callers should log at a
/// diagnostic level, never escalate.
pub fn deconstruct(bytes: &[u8]) -> Option<Payload> {
    let mut cursor = 0usize;
    let version = u16::decode(bytes, &mut cursor).ok()?;
    if version != PACKET_VERSION {
        return None;
    }
    let codec = CodecDescriptor::decode(bytes, &mut cursor).ok()?;
    let encrypted_blob = Vec::<u8>::decode(bytes, &mut cursor).ok()?;
    if cursor != bytes.len() {
        return None;
    }
    if codec.algorithm_tag != ALGORITHM_TAG_ENTROPY {
        return None;
    }

    let inner = entropy_apply(&encrypted_blob, codec.seed);
    if inner.len() < 32 {
        return None;
    }
    let (payload_bytes, claimed_signature_bytes) = inner.split_at(inner.len() - 32);

    let mut inner_cursor = 0usize;
    let payload: Payload = Payload::decode(payload_bytes, &mut inner_cursor).ok()?;
    if inner_cursor != payload_bytes.len() {
        return None;
    }

    let mut claimed_signature = [0u8; 32];
    claimed_signature.copy_from_slice(claimed_signature_bytes);

    if payload.data.len() > u16::MAX as usize {
        return None;
    }
    let expected = signature_digest(&codec, &payload.info, payload.data.len() as u16);
    if !signatures_match(&expected, &claimed_signature) {
        log::debug!("dropping packet: signature mismatch for id {}", payload.info.id);
        return None;
    }

    Some(payload)
}

/// Decode assuming the receiver's shared secret might differ from the
/// sender's — exposed for tests that need to simulate a mismatched build.
#[cfg(test)]
pub(crate) fn deconstruct_with_secret(bytes: &[u8], secret_override: &str) -> Option<Payload> {
    let mut cursor = 0usize;
    let version = u16::decode(bytes, &mut cursor).ok()?;
    if version != PACKET_VERSION {
        return None;
    }
    let codec = CodecDescriptor::decode(bytes, &mut cursor).ok()?;
    let encrypted_blob = Vec::<u8>::decode(bytes, &mut cursor).ok()?;
    if cursor != bytes.len() {
        return None;
    }
    let inner = entropy_apply(&encrypted_blob, codec.seed);
    if inner.len() < 32 {
        return None;
    }
    let (payload_bytes, claimed_signature_bytes) = inner.split_at(inner.len() - 32);
    let mut inner_cursor = 0usize;
    let payload: Payload = Payload::decode(payload_bytes, &mut inner_cursor).ok()?;
    if inner_cursor != payload_bytes.len() {
        return None;
    }
    let mut claimed_signature = [0u8; 32];
    claimed_signature.copy_from_slice(claimed_signature_bytes);

    let mut hasher = Sha256Hasher::new();
    let mut scratch = Vec::new();
    PACKET_VERSION.encode(&mut scratch).unwrap();
    codec.algorithm_tag.encode(&mut scratch).unwrap();
    codec.seed.encode(&mut scratch).unwrap();
    payload.info.version.encode(&mut scratch).unwrap();
    payload.info.id.encode(&mut scratch).unwrap();
    (payload.data.len() as u16).encode(&mut scratch).unwrap();
    secret_override.to_string().encode(&mut scratch).unwrap();
    hasher.update(&scratch);
    let expected = hasher.finalize();

    if !signatures_match(&expected, &claimed_signature) {
        return None;
    }
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(data: Vec<u8>) -> Payload {
        Payload {
            info: PayloadInfo { version: 0, id: "11111111-1111-1111-1111-111111111111".into() },
            data,
        }
    }

    #[test]
    fn roundtrip_small_payload() {
        let payload = sample_payload(b"hello".to_vec());
        let bytes = construct(&payload).unwrap();
        assert_eq!(deconstruct(&bytes), Some(payload));
    }

    #[test]
    fn roundtrip_max_size_payload() {
        // Leave headroom for framing + the 32-byte signature.
        let payload = sample_payload(vec![0xAB; 60_000]);
        let bytes = construct(&payload).unwrap();
        assert_eq!(deconstruct(&bytes), Some(payload));
    }

    #[test]
    fn tamper_anywhere_in_encrypted_region_breaks_decode() {
        let payload = sample_payload(b"don't touch this".to_vec());
        let bytes = construct(&payload).unwrap();
        // Byte 6 falls inside the encrypted_blob (after the 6-byte header).
        for idx in 6..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[idx] ^= 0x01;
            assert_eq!(deconstruct(&tampered), None, "byte {idx} should invalidate the packet");
        }
    }

    #[test]
    fn version_mismatch_is_dropped() {
        let payload = sample_payload(b"x".to_vec());
        let mut bytes = construct(&payload).unwrap();
        bytes[0] = 0x00;
        bytes[1] = 0x02; // version = 2
        assert_eq!(deconstruct(&bytes), None);
    }

    #[test]
    fn zeroed_signature_is_rejected() {
        let payload = sample_payload(b"x".to_vec());
        let seed = 0u8;
        let codec = CodecDescriptor::entropy(seed);
        let mut inner = Vec::new();
        payload.encode(&mut inner).unwrap();
        inner.extend_from_slice(&[0u8; 32]);
        let encrypted = entropy_apply(&inner, seed);
        let mut out = Vec::new();
        PACKET_VERSION.encode(&mut out).unwrap();
        codec.encode(&mut out).unwrap();
        encrypted.encode(&mut out).unwrap();
        assert_eq!(deconstruct(&out), None);
    }

    #[test]
    fn mismatched_shared_secret_rejects_everything() {
        let payload = sample_payload(b"anything".to_vec());
        let bytes = construct(&payload).unwrap();
        assert_eq!(deconstruct_with_secret(&bytes, "a-different-secret"), None);
    }

    #[test]
    fn different_seeds_change_every_byte_but_decode_identically() {
        let payload = sample_payload(vec![0u8; 128]);
        let a = construct(&payload).unwrap();
        let b = construct(&payload).unwrap();
        // Headers (version + algorithm tag) match; seed and ciphertext
        // almost certainly differ across two independent constructions.
        assert_eq!(deconstruct(&a), Some(payload.clone()));
        assert_eq!(deconstruct(&b), Some(payload));
    }

    #[test]
    fn oversized_payload_is_rejected_not_truncated() {
        let payload = sample_payload(vec![0u8; u16::MAX as usize + 1]);
        let mut buf = Vec::new();
        assert!(payload.data.encode(&mut buf).is_err());
    }
}
