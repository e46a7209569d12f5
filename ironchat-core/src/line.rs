//! Line-level protocol rules.
//!
//! Every message on the wire is a UTF-8 line terminated by [`DELIMITER`].
//! A single trailing carriage return is stripped before interpretation, empty
//! lines carry no meaning and the literal [`EXIT_SENTINEL`] ends a session.

/// Byte terminating every line on the wire.
pub const DELIMITER: u8 = b'\n';

/// Line that terminates a session. Never broadcast.
pub const EXIT_SENTINEL: &str = "EXIT";

/// Default upper bound for a single line, delimiter excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Interpretation of one inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Nothing but (optionally) a carriage return. Ignored.
    Empty,
    /// The termination sentinel.
    Exit,
    /// Anything else, taken literally.
    Text(&'a str),
}

impl<'a> Inbound<'a> {
    /// Classifies a line with its delimiter already removed.
    ///
    /// A trailing `\r` is stripped first, so `"EXIT\r"` is the sentinel and
    /// `"\r"` is empty. No other normalization happens: `" "` and `"exit"`
    /// are ordinary text.
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        match strip_carriage_return(line) {
            "" => Self::Empty,
            EXIT_SENTINEL => Self::Exit,
            text => Self::Text(text),
        }
    }

    /// Returns the text payload, if any.
    #[must_use]
    pub fn text(self) -> Option<&'a str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Empty | Self::Exit => None,
        }
    }
}

/// Removes one trailing carriage return, if present.
#[must_use]
pub fn strip_carriage_return(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Returns true if `line` is the termination sentinel.
#[must_use]
pub fn is_exit(line: &str) -> bool {
    matches!(Inbound::classify(line), Inbound::Exit)
}
