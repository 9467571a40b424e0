//! `assignproto`: the binary wire protocol spoken between assignment peers.
//!
//! Every message travels as an [`envelope::Envelope`] inside a length-prefixed frame
//! (see `assignio::frame`):
//! - envelope: tag, recipient hint, SHA-256 checksum of the payload, payload
//! - payload: one of the event shapes in [`event`], selected by the tag
//!
//! Decoders take `bytes::Bytes` and slice into it; strings are validated as utf-8
//! and copied out since they outlive the frame.

pub mod envelope;
pub mod event;
pub mod tags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    TooShort { need: usize, got: usize },
    UnknownTag(String),
    Malformed(&'static str),
    ChecksumMismatch,
}

impl std::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtoError::TooShort { need, got } => {
                write!(f, "message too short: need {need}, got {got}")
            }
            ProtoError::UnknownTag(t) => write!(f, "unknown message tag: {t:?}"),
            ProtoError::Malformed(s) => write!(f, "malformed message: {s}"),
            ProtoError::ChecksumMismatch => write!(f, "payload checksum mismatch"),
        }
    }
}

impl std::error::Error for ProtoError {}

/// Bounds-checked reader over a payload. Every read reports the absolute
/// offset it needed so errors line up with the documented layouts.
#[derive(Debug)]
pub(crate) struct Reader {
    p: bytes::Bytes,
    i: usize,
}

impl Reader {
    pub(crate) fn new(p: bytes::Bytes) -> Self {
        Self { p, i: 0 }
    }

    fn need(&self, n: usize) -> Result<(), ProtoError> {
        if self.p.len() < self.i + n {
            return Err(ProtoError::TooShort {
                need: self.i + n,
                got: self.p.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtoError> {
        self.need(1)?;
        let v = self.p[self.i];
        self.i += 1;
        Ok(v)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ProtoError> {
        self.need(8)?;
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.p[self.i..self.i + 8]);
        self.i += 8;
        Ok(u64::from_be_bytes(b))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ProtoError> {
        self.need(4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.p[self.i..self.i + 4]);
        self.i += 4;
        Ok(i32::from_be_bytes(b))
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<bytes::Bytes, ProtoError> {
        self.need(n)?;
        let b = self.p.slice(self.i..self.i + n);
        self.i += n;
        Ok(b)
    }

    /// `u8` length followed by that many utf-8 bytes.
    pub(crate) fn str8(&mut self) -> Result<String, ProtoError> {
        let len = self.u8()? as usize;
        let b = self.bytes(len)?;
        utf8(b)
    }

    /// Everything left in the payload, as utf-8.
    pub(crate) fn rest_str(&mut self) -> Result<String, ProtoError> {
        let b = self.p.slice(self.i..);
        self.i = self.p.len();
        utf8(b)
    }

    pub(crate) fn rest(&mut self) -> bytes::Bytes {
        let b = self.p.slice(self.i..);
        self.i = self.p.len();
        b
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.i >= self.p.len()
    }
}

fn utf8(b: bytes::Bytes) -> Result<String, ProtoError> {
    String::from_utf8(b.to_vec()).map_err(|_| ProtoError::Malformed("invalid utf-8"))
}

/// Append a `u8`-length-prefixed string, truncating at 255 bytes on a char boundary.
pub(crate) fn put_str8(out: &mut bytes::BytesMut, s: &str) {
    use bytes::BufMut;

    let mut end = s.len().min(u8::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    out.put_u8(end as u8);
    out.put_slice(&s.as_bytes()[..end]);
}
