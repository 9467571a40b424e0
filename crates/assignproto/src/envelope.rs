use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use sha2::Digest;

use crate::ProtoError;
use crate::Reader;

pub const CHECKSUM_LEN: usize = 32;

/// Bytes after the tag: recipient plus checksum.
const FIXED_AFTER_TAG: usize = 8 + CHECKSUM_LEN;

/// Header length for an encoded envelope whose first byte is `tag_len`.
pub fn header_len(tag_len: u8) -> usize {
    1 + tag_len as usize + FIXED_AFTER_TAG
}

/// Wire envelope carried in every frame.
///
/// Encoding:
/// - tag_len: `u8`
/// - tag: tag_len bytes (utf-8, e.g. `EA-Allocation`)
/// - recipient: `u64` big-endian (hint only; routing is the transport's job)
/// - checksum: 32 bytes, SHA-256 of the payload
/// - payload: remaining bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tag: String,
    pub recipient: u64,
    pub checksum: [u8; CHECKSUM_LEN],
    pub payload: Bytes,
}

pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut h = sha2::Sha256::new();
    h.update(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

impl Envelope {
    /// Build an envelope with the checksum computed over `payload`.
    pub fn seal(tag: &str, recipient: u64, payload: Bytes) -> Self {
        Self {
            tag: tag.to_string(),
            recipient,
            checksum: checksum(&payload),
            payload,
        }
    }

    pub fn verify(&self) -> bool {
        checksum(&self.payload) == self.checksum
    }

    /// Everything before the payload, so writers can send header and payload
    /// as separate parts.
    pub fn header(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(1 + self.tag.len() + FIXED_AFTER_TAG);
        crate::put_str8(&mut out, &self.tag);
        out.put_u64(self.recipient);
        out.put_slice(&self.checksum);
        out
    }

    pub fn encode(&self) -> Bytes {
        let mut out = self.header();
        out.put_slice(&self.payload);
        out.freeze()
    }

    pub fn parse(p: Bytes) -> Result<Self, ProtoError> {
        let mut r = Reader::new(p);
        let tag = r.str8()?;
        if tag.is_empty() {
            return Err(ProtoError::Malformed("empty tag"));
        }
        let recipient = r.u64()?;
        let mut sum = [0u8; CHECKSUM_LEN];
        sum.copy_from_slice(&r.bytes(CHECKSUM_LEN)?);
        Ok(Self {
            tag,
            recipient,
            checksum: sum,
            payload: r.rest(),
        })
    }

    /// Parse and verify in one step. A checksum mismatch is reported as
    /// [`ProtoError::ChecksumMismatch`] and the payload must not be used.
    pub fn open(p: Bytes) -> Result<Self, ProtoError> {
        let env = Self::parse(p)?;
        if !env.verify() {
            return Err(ProtoError::ChecksumMismatch);
        }
        Ok(env)
    }
}
