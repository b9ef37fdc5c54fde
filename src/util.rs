use std::io::{ErrorKind, Read, Result};

/// Outcome of [`fill_exactish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    /// The whole buffer was filled.
    Full,
    /// The stream ended before a single byte was read.
    Empty,
    /// The stream ended after this many bytes; the buffer is incomplete.
    Partial(usize),
}

/// Reads until `buf` is full or the stream ends, retrying on EINTR.
///
/// Unlike `Read::read_exact()`, this distinguishes a "clean" EOF, where the
/// stream ends before any byte of `buf` was read, from a short read in the
/// middle of the buffer. The newc reader needs the former to recognise a
/// stream that ends on a header boundary, and the latter to report where
/// a truncated block started.
///
/// Errors from the underlying reader are returned unchanged.
pub(crate) fn fill_exactish(reader: &mut impl Read, buf: &mut [u8]) -> Result<Fill> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(Fill::Empty),
            Ok(0) => return Ok(Fill::Partial(filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(Fill::Full)
}
