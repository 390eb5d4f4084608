//! Line delimiter scanning over a growing text buffer

/// Kind of line ending found in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `\n`
    Newline,
    /// A lone `\r`, used by progress output to redraw the current line
    CarriageReturn,
    /// `\r\n`, treated as a single true line ending
    CarriageReturnNewline,
}

impl Delimiter {
    /// Number of bytes the delimiter occupies
    pub fn width(self) -> usize {
        match self {
            Delimiter::Newline | Delimiter::CarriageReturn => 1,
            Delimiter::CarriageReturnNewline => 2,
        }
    }

    /// Whether this delimiter is a redraw rather than a real line end
    pub fn is_redraw(self) -> bool {
        matches!(self, Delimiter::CarriageReturn)
    }
}

/// Locate the earliest line ending in `buffer`
///
/// Returns the byte index where the line ends together with the delimiter found
/// there, or `None` when the buffer holds only a partial line.
///
/// # Examples
///
/// ```
/// use auntie::telemetry::{next_delimiter, Delimiter};
///
/// assert_eq!(next_delimiter("abc\rdef\n"), Some((3, Delimiter::CarriageReturn)));
/// assert_eq!(next_delimiter("abc\r\ndef"), Some((3, Delimiter::CarriageReturnNewline)));
/// assert_eq!(next_delimiter("partial"), None);
/// ```
#[must_use]
pub fn next_delimiter(buffer: &str) -> Option<(usize, Delimiter)> {
    let bytes = buffer.as_bytes();
    let index = bytes.iter().position(|&b| b == b'\n' || b == b'\r')?;
    let delimiter = match bytes[index] {
        b'\n' => Delimiter::Newline,
        _ if bytes.get(index + 1) == Some(&b'\n') => Delimiter::CarriageReturnNewline,
        _ => Delimiter::CarriageReturn,
    };
    Some((index, delimiter))
}
