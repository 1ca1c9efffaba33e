//! Inbound line framing that never fails on a single bad line.
//!
//! `FramedRead` stops yielding items after the first decoder error, so lines
//! that are too long or not UTF-8 are reported as items instead.

use std::io;

use {
    bytes::BytesMut,
    tokio_util::codec::{Decoder, LinesCodec, LinesCodecError},
};

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    Text(String),
    /// Longer than the limit; the rest of the line is discarded by the codec.
    Overlong,
    /// Complete line that was not valid UTF-8; already consumed.
    NotUtf8,
}

#[derive(Debug)]
pub struct ChatLineCodec {
    lines: LinesCodec,
}

impl ChatLineCodec {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn map(result: Result<Option<String>, LinesCodecError>) -> io::Result<Option<InboundLine>> {
        match result {
            Ok(line) => Ok(line.map(InboundLine::Text)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(InboundLine::Overlong)),
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(InboundLine::NotUtf8))
            },
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for ChatLineCodec {
    type Item = InboundLine;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<InboundLine>> {
        Self::map(self.lines.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<InboundLine>> {
        Self::map(self.lines.decode_eof(src))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut ChatLineCodec, input: &[u8]) -> Vec<InboundLine> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buf).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn overlong_line_is_reported_then_skipped() {
        let mut codec = ChatLineCodec::new(8);
        let out = decode_all(&mut codec, b"short\r\nmuch too long here\r\nnext\r\n");
        assert_eq!(out, vec![
            InboundLine::Text("short".into()),
            InboundLine::Overlong,
            InboundLine::Text("next".into()),
        ]);
    }

    #[test]
    fn invalid_utf8_is_reported_then_skipped() {
        let mut codec = ChatLineCodec::new(64);
        let out = decode_all(&mut codec, b"\xff\xfe\r\nok\r\n");
        assert_eq!(out, vec![
            InboundLine::NotUtf8,
            InboundLine::Text("ok".into()),
        ]);
    }
}
