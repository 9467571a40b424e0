use assignproto::envelope::{Envelope, header_len};
use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

/// Envelopes are small; anything near this is a broken or hostile peer.
pub const DEFAULT_MAX_FRAME_LEN: usize = 256 * 1024;

#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_len: usize,
}

impl<R> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max.max(1);
        self
    }
}

fn invalid(msg: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

impl<R> FrameReader<R> {
    /// Pop one complete frame off the buffer, if one is there.
    ///
    /// Every frame must at least hold an envelope header; a frame that
    /// cannot is rejected here rather than queued for the tick loop.
    fn take_buffered(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let mut len_be = [0u8; 4];
        len_be.copy_from_slice(&self.buf[..4]);
        let len = u32::from_be_bytes(len_be) as usize;
        if len > self.max_frame_len {
            return Err(invalid("frame too large"));
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }

        self.buf.advance(4);
        let frame = self.buf.split_to(len).freeze();
        match frame.first() {
            Some(&tag_len) if frame.len() >= header_len(tag_len) => Ok(Some(frame)),
            _ => Err(invalid("frame shorter than envelope header")),
        }
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read one `u32` big-endian length-prefixed frame holding an encoded
    /// envelope. `Ok(None)` means clean EOF between frames.
    ///
    /// The frame comes back raw: checksum verification happens on the tick
    /// loop, not on the socket task.
    pub async fn read_frame(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.take_buffered()? {
                return Ok(Some(frame));
            }
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "eof inside a frame",
                ));
            }
        }
    }
}

#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Write an already encoded envelope as one frame.
    pub async fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.write_parts(&[frame]).await
    }

    /// Write an envelope without copying its payload next to the header.
    pub async fn write_envelope(&mut self, env: &Envelope) -> std::io::Result<()> {
        let hdr = env.header();
        self.write_parts(&[&hdr, &env.payload]).await
    }

    async fn write_parts(&mut self, parts: &[&[u8]]) -> std::io::Result<()> {
        let len: usize = parts.iter().map(|p| p.len()).sum();
        let len_u32: u32 = len
            .try_into()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too big"))?;

        self.inner.write_all(&len_u32.to_be_bytes()).await?;
        for p in parts {
            if !p.is_empty() {
                self.inner.write_all(p).await?;
            }
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }
}
