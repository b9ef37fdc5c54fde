//! Sequential newc archive reader.

use std::io::Read;

use log::{debug, trace};

use crate::{
    entry::{Entry, TRAILER_NAME},
    error::{Error, Result},
    header::{pad4, HeaderFields, HEADER_SIZE},
    limits::Limits,
    util::{fill_exactish, Fill},
};

/// Initial capacity reserved for file data; the buffer grows as bytes actually arrive.
const DATA_PREALLOC_MAX: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    /// Terminal: the trailer was consumed or the stream ended on a header boundary.
    Done,
    /// Terminal: an error left the cursor inside the entry starting at `pos`.
    Failed { pos: u64 },
}

/// Streaming reader producing one [`Entry`] per call from a newc byte stream.
///
/// The reader owns its byte source and keeps a single cursor into it, so
/// entries come back strictly in archive order. Entry data is read fully
/// into memory, subject to the configured [`Limits`].
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use newc::Reader;
///
/// let mut reader = Reader::new(BufReader::new(File::open("initrd.cpio").unwrap()));
/// while let Some(entry) = reader.next_entry().unwrap() {
///     println!("{entry}");
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    reader: R,
    limits: Limits,
    header_buf: [u8; HEADER_SIZE],
    pos: u64,
    state: State,
}

impl<R: Read> Reader<R> {
    /// Create a reader with default [`Limits`].
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, Limits::default())
    }

    /// Create a reader that enforces `limits` on every header it decodes.
    pub fn with_limits(reader: R, limits: Limits) -> Self {
        Self {
            reader,
            limits,
            header_buf: [0u8; HEADER_SIZE],
            pos: 0,
            state: State::Active,
        }
    }

    /// Number of bytes consumed from the source so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether the reader has reached end of archive.
    ///
    /// Stays `false` after a failure; see [`Reader::is_failed`].
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Whether an earlier call to [`Reader::next_entry`] returned an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed { .. })
    }

    /// The limits checked against each header.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consume the reader and return the source.
    ///
    /// After the trailer has been read, the source is positioned directly
    /// behind it; anything that follows has not been touched.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next entry.
    ///
    /// Returns `Ok(None)` at end of archive: either the trailer was read, or
    /// the stream ended cleanly where a header would start. Once that has
    /// happened, every further call returns `Ok(None)` without touching the
    /// source.
    ///
    /// The first error is terminal as well: the cursor is then somewhere
    /// inside an entry, so every further call fails with
    /// [`Error::ReaderFailed`] without touching the source.
    ///
    /// # Errors
    ///
    /// [`Error::Truncated`] if the stream ends inside a header, name, data
    /// block or padding; [`Error::Format`] for an undecodable header;
    /// [`Error::NameTooLong`]/[`Error::FileTooLarge`] if a size exceeds the
    /// limits; [`Error::NonUtf8Name`] for a name that is not UTF-8. Errors from
    /// the source propagate as [`Error::Io`].
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        match self.state {
            State::Active => {}
            State::Done => return Ok(None),
            State::Failed { pos } => return Err(Error::ReaderFailed { pos }),
        }

        let start = self.pos;
        let result = self.read_entry();
        if result.is_err() {
            debug!("reader failed in the entry at {start:#x}");
            self.state = State::Failed { pos: start };
        }
        result
    }

    fn read_entry(&mut self) -> Result<Option<Entry>> {
        let start = self.pos;
        match fill_exactish(&mut self.reader, &mut self.header_buf)? {
            Fill::Full => self.pos += HEADER_SIZE as u64,
            Fill::Empty => {
                debug!("stream ended at {start:#x} without a trailer");
                self.state = State::Done;
                return Ok(None);
            }
            Fill::Partial(_) => return Err(Error::Truncated { pos: start }),
        }

        let (magic, fields) = HeaderFields::decode(&self.header_buf)?;

        if fields.namesize > self.limits.max_name_size {
            return Err(Error::NameTooLong {
                size: fields.namesize,
                limit: self.limits.max_name_size,
            });
        }

        let name_pos = self.pos;
        let mut name = vec![0u8; fields.namesize as usize];
        self.read_block(&mut name)?;
        self.skip_padding(pad4(HEADER_SIZE as u64 + u64::from(fields.namesize)))?;

        truncate_null(&mut name);
        if name == TRAILER_NAME.as_bytes() {
            debug!("trailer at {start:#x}");
            self.state = State::Done;
            return Ok(None);
        }

        let name = String::from_utf8(name).map_err(|_| Error::NonUtf8Name { pos: name_pos })?;

        if fields.filesize > self.limits.max_file_size {
            return Err(Error::FileTooLarge {
                size: fields.filesize,
                limit: self.limits.max_file_size,
            });
        }

        let data = self.read_data(fields.filesize)?;
        self.skip_padding(pad4(u64::from(fields.filesize)))?;

        debug!(
            "entry at {start:#x}: {name} mode {:o} size {} ({magic:?})",
            fields.mode, fields.filesize
        );

        Ok(Some(Entry {
            name,
            mode: fields.mode,
            uid: fields.uid,
            gid: fields.gid,
            nlink: fields.nlink,
            mtime: fields.mtime,
            filesize: fields.filesize,
            data,
        }))
    }

    /// Iterate over the remaining entries.
    ///
    /// The iterator ends after the first error.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            reader: self,
            failed: false,
        }
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Fill `buf` completely; any shortfall is a truncation at the block start.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos;
        match fill_exactish(&mut self.reader, buf)? {
            Fill::Full => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Fill::Empty | Fill::Partial(_) => Err(Error::Truncated { pos: start }),
        }
    }

    /// Read `size` data bytes without reserving them all up front.
    fn read_data(&mut self, size: u32) -> Result<Vec<u8>> {
        let start = self.pos;
        let mut data = Vec::with_capacity(size.min(DATA_PREALLOC_MAX) as usize);
        let got = (&mut self.reader)
            .take(u64::from(size))
            .read_to_end(&mut data)?;
        self.pos += got as u64;
        if got != size as usize {
            return Err(Error::Truncated { pos: start });
        }
        Ok(data)
    }

    fn skip_padding(&mut self, len: u64) -> Result<()> {
        trace!("skipping {len} padding bytes at {:#x}", self.pos);
        let mut pad = [0u8; 3];
        self.read_block(&mut pad[..len as usize])
    }
}

/// Cut a NUL-terminated name field at its first NUL.
fn truncate_null(name: &mut Vec<u8>) {
    if let Some(nul) = name.iter().position(|&b| b == 0) {
        name.truncate(nul);
    }
}

/// Iterator over the entries of a [`Reader`], see [`Reader::entries`].
#[derive(Debug)]
pub struct Entries<'a, R> {
    reader: &'a mut Reader<R>,
    failed: bool,
}

impl<R: Read> Iterator for Entries<'_, R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
