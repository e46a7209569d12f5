//! Broadcast line formatting.

use crate::error::{CoreError, Result};
use crate::line::DELIMITER;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Separator placed between the sender name and the text.
const SEPARATOR: &str = ": ";

/// A chat line attributed to a sender, as delivered to every other participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLine<'a> {
    sender: &'a str,
    text: &'a str,
}

impl<'a> ChatLine<'a> {
    /// Creates a chat line.
    ///
    /// # Errors
    /// Returns `CoreError` if either part is empty or contains the delimiter,
    /// since the encoded form must stay a single line.
    pub fn new(sender: &'a str, text: &'a str) -> Result<Self> {
        check_field("sender", sender)?;
        check_field("text", text)?;
        Ok(Self { sender, text })
    }

    /// Returns the sender name.
    #[must_use]
    pub fn sender(&self) -> &'a str {
        self.sender
    }

    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Returns the encoded length, delimiter included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.sender.len() + SEPARATOR.len() + self.text.len() + 1
    }

    /// Encodes the line as `"<sender>: <text>\n"`.
    ///
    /// The result is cheap to clone, so one encoding can be shared by every
    /// recipient of a broadcast.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(self.sender.as_bytes());
        buf.put_slice(SEPARATOR.as_bytes());
        buf.put_slice(self.text.as_bytes());
        buf.put_u8(DELIMITER);
        buf.freeze()
    }
}

impl fmt::Display for ChatLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.sender, SEPARATOR, self.text)
    }
}

fn check_field(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::empty(field));
    }
    if value.as_bytes().contains(&DELIMITER) {
        return Err(CoreError::embedded_delimiter(field));
    }
    Ok(())
}
