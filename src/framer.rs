use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Recovers frame boundaries from an unstructured byte stream.
///
/// `ByteFramer` implements `tokio_util::codec::Decoder` and yields one raw
/// frame (command, headers and body, NUL excluded) per item. Bytes preceding
/// the first uppercase ASCII letter of a frame are discarded, which lets the
/// broker pad frames with newlines or other filler.
///
/// Wrapped in a `FramedRead`, the resulting stream yields `Some(Ok(raw))` per
/// frame, `Some(Err(_))` on a read error and `None` once the peer closes the
/// stream, so end-of-stream is never confused with a frame boundary.
#[derive(Debug, Default)]
pub struct ByteFramer {
    /// How many bytes of the current (already aligned) frame have been
    /// scanned for a terminator without finding one.
    scanned: usize,
}

impl ByteFramer {
    pub fn new() -> Self {
        Self { scanned: 0 }
    }
}

impl Decoder for ByteFramer {
    type Item = Bytes;
    type Error = io::Error;

    /// Decode the next raw frame from `src`.
    ///
    /// Returns
    /// - `Ok(Some(raw))` when a NUL terminator was found; the frame and its
    ///   terminator are consumed from `src`.
    /// - `Ok(None)` when more bytes are needed. Leading filler is consumed
    ///   eagerly; a partial frame stays in `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.scanned == 0 {
            match src.iter().position(|b| b.is_ascii_uppercase()) {
                Some(start) => src.advance(start),
                None => {
                    src.clear();
                    return Ok(None);
                }
            }
        }

        match src[self.scanned..].iter().position(|&b| b == 0) {
            Some(rel) => {
                let end = self.scanned + rel;
                let raw = src.split_to(end).freeze();
                src.advance(1);
                self.scanned = 0;
                Ok(Some(raw))
            }
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    /// At end-of-stream a buffered partial frame is an error; trailing
    /// filler is not.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(raw) => Ok(Some(raw)),
            None if src.is_empty() => Ok(None),
            None => {
                let pending = src.len();
                src.clear();
                self.scanned = 0;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream closed inside a frame ({} bytes buffered)", pending),
                ))
            }
        }
    }
}
