//! Sequential newc archive writer.

use std::io::{self, Write};

use log::debug;

use crate::{
    entry::{PERMISSION_MASK, S_IFDIR, S_IFREG, TRAILER_NAME},
    error::{Error, Result},
    header::{pad4, HeaderFields, HEADER_SIZE},
    path::normalize_for_archive,
};

/// Ownership and timestamp stamped on every entry a [`Writer`] emits.
///
/// The defaults (all zero) give reproducible archives that do not depend on
/// who built them or when.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    pub uid: u32,
    pub gid: u32,
    /// Modification time as a Unix timestamp.
    pub mtime: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// Terminal: the trailer has been emitted (or its emission was attempted).
    Closed,
}

/// Streaming writer appending newc entries to a byte sink.
///
/// Inode numbers start at 1 and advance by one for every directory or file.
/// The archive is only valid once [`Writer::close`] (or [`Writer::finish`])
/// has written the trailer; dropping an open writer leaves a truncated
/// archive behind.
#[derive(Debug)]
pub struct Writer<W: Write> {
    writer: W,
    options: WriterOptions,
    ino: u32,
    pos: u64,
    state: State,
}

impl<W: Write> Writer<W> {
    /// Create a writer with default [`WriterOptions`].
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    /// Create a writer that stamps `options` on every entry except the trailer.
    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        Self {
            writer,
            options,
            ino: 1,
            pos: 0,
            state: State::Open,
        }
    }

    /// Number of bytes emitted so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Ownership and timestamp stamped on each entry.
    #[must_use]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Append a directory entry.
    ///
    /// Only the low 9 bits of `permissions` are kept.
    ///
    /// # Errors
    ///
    /// [`Error::WriterClosed`] after [`Writer::close`], [`Error::InvalidName`]
    /// if `name` does not normalize to a relative path, [`Error::Io`] if the
    /// sink fails.
    pub fn add_dir(&mut self, name: &str, permissions: u32) -> Result<()> {
        let name = self.check_name(name)?;
        let mode = S_IFDIR | (permissions & PERMISSION_MASK);
        let owner = (self.options.uid, self.options.gid);
        self.write_entry(&name, mode, 2, owner, b"")?;
        self.ino = self.ino.wrapping_add(1);
        Ok(())
    }

    /// Append a regular file entry holding `data`.
    ///
    /// Only the low 9 bits of `permissions` are kept.
    ///
    /// # Errors
    ///
    /// As for [`Writer::add_dir`]; additionally fails with an `InvalidInput`
    /// I/O error if `data` is larger than the 4 GiB newc can describe.
    pub fn add_file(&mut self, name: &str, permissions: u32, data: &[u8]) -> Result<()> {
        let name = self.check_name(name)?;
        let mode = S_IFREG | (permissions & PERMISSION_MASK);
        let owner = (self.options.uid, self.options.gid);
        self.write_entry(&name, mode, 1, owner, data)?;
        self.ino = self.ino.wrapping_add(1);
        Ok(())
    }

    /// Write the trailer and flush the sink.
    ///
    /// Only the first call does anything; later calls return `Ok(())`. The
    /// writer counts as closed even if writing the trailer failed.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;

        debug!("writing trailer at {:#x} (ino {})", self.pos, self.ino);
        self.write_entry(TRAILER_NAME, 0, 1, (0, 0), b"")?;

        self.writer.flush()?;
        Ok(())
    }

    /// Close the archive and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        Ok(self.writer)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn check_name(&self, name: &str) -> Result<String> {
        if self.state == State::Closed {
            return Err(Error::WriterClosed);
        }
        normalize_for_archive(name)
    }

    fn write_entry(
        &mut self,
        name: &str,
        mode: u32,
        nlink: u32,
        (uid, gid): (u32, u32),
        data: &[u8],
    ) -> Result<()> {
        let namesize = u32::try_from(name.len() + 1)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name too long for newc"))?;
        let filesize = u32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large for newc"))?;

        let header = HeaderFields {
            ino: self.ino,
            mode,
            uid,
            gid,
            nlink,
            mtime: self.options.mtime,
            filesize,
            namesize,
            ..Default::default()
        };

        debug!(
            "entry at {:#x}: {name} mode {mode:o} size {filesize} ino {}",
            self.pos, self.ino
        );

        self.write_all(&header.encode())?;
        self.write_all(name.as_bytes())?;
        self.write_all(&[0])?;
        self.write_padding(pad4(HEADER_SIZE as u64 + u64::from(namesize)))?;

        if !data.is_empty() {
            self.write_all(data)?;
            self.write_padding(pad4(u64::from(filesize)))?;
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn write_padding(&mut self, len: u64) -> Result<()> {
        self.write_all(&[0u8; 3][..len as usize])
    }
}
