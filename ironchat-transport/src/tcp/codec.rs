//! Line framing codec for TCP.
//!
//! Frame format: `[UTF-8 text][\n]`. The decoder yields the text without its
//! delimiter and leaves any carriage return in place; interpreting the line
//! is the caller's business.

use crate::error::TransportError;
use bytes::{BufMut, Bytes, BytesMut};
use ironchat_core::{DEFAULT_MAX_LINE_LENGTH, DELIMITER};
use tokio_util::codec::{Decoder, Encoder};

/// Newline-delimited framing codec with a bounded line length.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_length: usize,
    /// Bytes of the buffer already scanned for a delimiter.
    next_index: usize,
}

impl LineCodec {
    /// Creates a new line codec with the specified maximum line length.
    ///
    /// # Arguments
    /// * `max_line_length` - Maximum line length in bytes, delimiter excluded
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    /// Returns the maximum line length.
    #[must_use]
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // One extra byte so a line of exactly max_line_length still finds its delimiter
        let read_to = src.len().min(self.max_line_length.saturating_add(1));

        match src[self.next_index..read_to]
            .iter()
            .position(|b| *b == DELIMITER)
        {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let frame = src.split_to(end + 1);
                Ok(Some(
                    String::from_utf8_lossy(&frame[..end]).into_owned(),
                ))
            }
            None if read_to > self.max_line_length => {
                let size = src.len();
                self.next_index = 0;
                Err(TransportError::line_too_long(size, self.max_line_length))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !buf.is_empty() {
                    tracing::trace!(bytes = buf.len(), "discarding unterminated line at EOF");
                    buf.clear();
                }
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

/// Pre-encoded frames (already delimiter-terminated) are written verbatim.
impl Encoder<Bytes> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        debug_assert_eq!(item.last(), Some(&DELIMITER));
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Encoder<&str> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_line_length {
            return Err(TransportError::line_too_long(
                item.len(),
                self.max_line_length,
            ));
        }
        if item.as_bytes().contains(&DELIMITER) {
            return Err(TransportError::invalid_line("embedded line delimiter"));
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

impl Encoder<String> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&str>>::encode(self, &item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_line() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::from(&b"hello\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("hello"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_keeps_carriage_return() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::from(&b"EXIT\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("EXIT\r"));
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::new();

        buf.put_slice(b"al");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"ice");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"\nhi");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("alice"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"hi");
    }

    #[test]
    fn test_multiple_lines_and_empty_line() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::from(&b"one\n\ntwo\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("one"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(""));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("two"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_line_at_exact_limit() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcd\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("abcd"));
    }

    #[test]
    fn test_line_too_long() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcde"[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            TransportError::LineTooLong { size: 5, max: 4 }
        ));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::from(&b"a\xffb\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("a\u{fffd}b")
        );
    }

    #[test]
    fn test_decode_eof_discards_unterminated() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::from(&b"done\npartial"[..]);

        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("done"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_str_appends_delimiter() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::new();

        codec.encode("hello", &mut buf).unwrap();
        codec.encode(String::from("EXIT"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"hello\nEXIT\n");
    }

    #[test]
    fn test_encode_rejects_embedded_delimiter() {
        let mut codec = LineCodec::new(1024);
        let mut buf = BytesMut::new();

        let err = codec.encode("a\nb", &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::InvalidLine { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_too_long() {
        let mut codec = LineCodec::new(3);
        let mut buf = BytesMut::new();

        assert!(codec.encode("abcd", &mut buf).is_err());
    }

    #[test]
    fn test_encode_bytes_verbatim() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::new();

        codec
            .encode(Bytes::from_static(b"alice: hi\n"), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"alice: hi\n");
        assert_eq!(codec.max_line_length(), DEFAULT_MAX_LINE_LENGTH);
    }
}
