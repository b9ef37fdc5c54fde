//! Archive entries as surfaced by the reader.

use std::fmt;

/// Name of the sentinel entry that terminates every archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

/// Mask selecting the file type bits of a mode.
pub const S_IFMT: u32 = 0o170_000;
/// File type bits of a directory.
pub const S_IFDIR: u32 = 0o040_000;
/// File type bits of a regular file.
pub const S_IFREG: u32 = 0o100_000;
/// Mask selecting the POSIX permission bits of a mode.
pub const PERMISSION_MASK: u32 = 0o777;

/// The file type encoded in an entry's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    /// Anything else (symlink, device, fifo, socket); carries the raw type bits.
    Other(u32),
}

impl EntryKind {
    #[must_use]
    pub fn from_mode(mode: u32) -> EntryKind {
        match mode & S_IFMT {
            S_IFDIR => EntryKind::Directory,
            S_IFREG => EntryKind::Regular,
            other => EntryKind::Other(other),
        }
    }
}

/// One archived file or directory.
///
/// `data` holds the bytes that followed the header; it is empty for
/// directories and its length always equals `filesize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    /// Normalized, slash-separated, relative path.
    pub name: String,
    /// File type and permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    /// Modification time as a Unix timestamp.
    pub mtime: u32,
    pub filesize: u32,
    pub data: Vec<u8>,
}

impl Entry {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind() == EntryKind::Regular
    }

    /// The low 9 permission bits of the mode.
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_MASK
    }
}

fn type_char(kind: EntryKind) -> char {
    match kind {
        EntryKind::Directory => 'd',
        EntryKind::Regular => '-',
        EntryKind::Other(0o120_000) => 'l',
        EntryKind::Other(0o020_000) => 'c',
        EntryKind::Other(0o060_000) => 'b',
        EntryKind::Other(0o010_000) => 'p',
        EntryKind::Other(0o140_000) => 's',
        EntryKind::Other(_) => '?',
    }
}

impl fmt::Display for Entry {
    /// Renders an `ls -l` style line: `drwxr-xr-x 0/0 0 name`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut perms = String::with_capacity(10);
        perms.push(type_char(self.kind()));
        for shift in [6, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            perms.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            perms.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            perms.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        write!(
            f,
            "{perms} {}/{} {:>8} {}",
            self.uid, self.gid, self.filesize, self.name
        )
    }
}
