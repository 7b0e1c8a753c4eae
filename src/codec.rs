use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::Encoder;

use crate::error::ConnError;
use crate::frame::{Command, Frame};

/// Encode a frame into its wire representation.
///
/// Layout: the command line, one `key:value` line per header, a blank line,
/// the body, and a single NUL terminator. Header values are written
/// verbatim: colons and newlines are not escaped, so a value containing a
/// newline produces a frame the broker will misread.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut dst = BytesMut::new();
    encode_into(frame, &mut dst);
    dst.to_vec()
}

/// Append the wire representation of `frame` to `dst`.
pub fn encode_into(frame: &Frame, dst: &mut BytesMut) {
    let header_len: usize = frame
        .headers
        .iter()
        .map(|(k, v)| k.len() + v.len() + 2)
        .sum();
    dst.reserve(frame.command.as_str().len() + header_len + frame.body.len() + 3);

    dst.extend_from_slice(frame.command.as_str().as_bytes());
    dst.put_u8(b'\n');
    for (k, v) in &frame.headers {
        dst.extend_from_slice(k.as_bytes());
        dst.put_u8(b':');
        dst.extend_from_slice(v.as_bytes());
        dst.put_u8(b'\n');
    }
    dst.put_u8(b'\n');
    dst.extend_from_slice(&frame.body);
    dst.put_u8(0);
}

/// Decode one raw frame (as produced by `ByteFramer`) into a `Frame`.
///
/// The input is split at the first blank line into the header section and
/// the body. The first header-section line names the command; each further
/// line is split at its first colon, so values may contain colons. When a
/// key repeats, the last occurrence wins. A trailing NUL on the body is
/// dropped, and a missing body decodes as empty.
///
/// Returns `ConnError::Protocol` for an empty frame, an unknown command, a
/// header line without a colon, or non-UTF-8 command/header text.
pub fn decode(raw: &[u8]) -> Result<Frame, ConnError> {
    let (head, body) = split_sections(raw);

    let mut lines = head
        .split(|&b| b == b'\n')
        .map(strip_cr)
        .filter(|line| !line.is_empty());

    let command_line = lines
        .next()
        .ok_or_else(|| ConnError::Protocol("empty frame".into()))?;
    let command: Command = utf8(command_line, "command")?.parse()?;

    let mut frame = Frame::new(command);
    for line in lines {
        let line = utf8(line, "header")?;
        let (key, value) = line.split_once(':').ok_or_else(|| {
            ConnError::Protocol(format!("malformed header line: {:?}", line))
        })?;
        frame.set_header(key, value);
    }

    let body = match body.last() {
        Some(0) => &body[..body.len() - 1],
        _ => body,
    };
    frame.body = body.to_vec();
    Ok(frame)
}

/// Split at the first empty line. Without one, everything is header text.
fn split_sections(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut start = 0usize;
    while let Some(rel) = raw[start..].iter().position(|&b| b == b'\n') {
        let end = start + rel;
        if strip_cr(&raw[start..end]).is_empty() {
            return (&raw[..start], &raw[end + 1..]);
        }
        start = end + 1;
    }
    (raw, &[])
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str, ConnError> {
    std::str::from_utf8(bytes)
        .map_err(|e| ConnError::Protocol(format!("invalid utf8 in {}: {}", what, e)))
}

/// `StompCodec` is the write half of the wire protocol: it implements
/// `tokio_util::codec::Encoder<Frame>` on top of [`encode_into`] so the
/// connection can drive a `FramedWrite` sink. The read half is
/// [`crate::framer::ByteFramer`].
#[derive(Debug, Default)]
pub struct StompCodec {}

impl StompCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Encoder<Frame> for StompCodec {
    type Error = io::Error;

    /// Append the encoded `item` to `dst`; the `FramedWrite` flushes it to
    /// the transport.
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_connect_without_headers() {
        let bytes = encode(&Frame::new(Command::Connect));
        assert_eq!(bytes, b"CONNECT\n\n\0".to_vec());
    }

    #[test]
    fn decode_tolerates_crlf_header_lines() {
        let f = decode(b"MESSAGE\r\nmessage-id:m1\r\n\r\nbody").unwrap();
        assert_eq!(f.command, Command::Message);
        assert_eq!(f.get_header("message-id"), Some("m1"));
        assert_eq!(f.body, b"body");
    }

    #[test]
    fn decode_without_blank_line_has_empty_body() {
        let f = decode(b"RECEIPT\nreceipt-id:r1").unwrap();
        assert_eq!(f.get_header("receipt-id"), Some("r1"));
        assert!(f.body.is_empty());
    }

    #[test]
    fn decode_keeps_blank_lines_inside_body() {
        let f = decode(b"MESSAGE\n\nline one\n\nline two\0").unwrap();
        assert_eq!(f.body, b"line one\n\nline two");
    }

    #[test]
    fn decode_empty_input_fails() {
        assert!(matches!(decode(b""), Err(ConnError::Protocol(_))));
    }

    #[test]
    fn decode_invalid_utf8_header_fails() {
        let raw = b"MESSAGE\nkey:\xff\xfe\n\n";
        assert!(matches!(decode(raw), Err(ConnError::Protocol(_))));
    }
}
