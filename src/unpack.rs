//! Extracting a newc archive into a directory.

use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Component, Path},
};

use log::{debug, trace};
use rustix::{
    fd::OwnedFd,
    fs::{mkdirat, openat, Mode, OFlags, CWD},
    io::Errno,
};

use crate::{
    entry::{Entry, PERMISSION_MASK},
    error::{Error, Result},
    limits::Limits,
    path::resolve_for_extraction,
    reader::Reader,
};

/// Mode for every directory the unpacker creates.
const DIR_MODE: u32 = 0o755;

struct Unpacker<'a> {
    dest: &'a Path,
    dest_fd: OwnedFd,
}

impl Unpacker<'_> {
    fn unpack_entry(&self, entry: &Entry) -> Result<()> {
        let resolved = resolve_for_extraction(self.dest, &entry.name)?;
        let components = resolved
            .strip_prefix(self.dest)
            .map_err(|_| Error::PathTraversal {
                name: entry.name.clone(),
            })?
            .components()
            .map(|c| match c {
                Component::Normal(name) => Ok(name),
                _ => Err(Error::PathTraversal {
                    name: entry.name.clone(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let Some((last, parents)) = components.split_last() else {
            return Err(Error::PathTraversal {
                name: entry.name.clone(),
            });
        };

        if entry.is_dir() {
            trace!("mkdir {}", resolved.display());
            self.mkdir_all(&components)?;
            return Ok(());
        }

        trace!(
            "write {} ({} bytes, mode {:o})",
            resolved.display(),
            entry.data.len(),
            entry.permissions()
        );
        let parent = self.mkdir_all(parents)?;
        let fd = openat(
            &parent,
            *last,
            OFlags::CREATE | OFlags::TRUNC | OFlags::WRONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::from_raw_mode(entry.mode & PERMISSION_MASK),
        )?;
        File::from(fd).write_all(&entry.data)?;
        Ok(())
    }

    /// Create each directory in `components` below the destination, treating
    /// existing directories as success, and return an fd for the last one.
    fn mkdir_all(&self, components: &[&std::ffi::OsStr]) -> Result<OwnedFd> {
        let mut dirfd = open_dir(&self.dest_fd, ".")?;
        for name in components {
            match mkdirat(&dirfd, *name, Mode::from_raw_mode(DIR_MODE)) {
                Ok(()) | Err(Errno::EXIST) => {}
                Err(e) => Err(e)?,
            }
            dirfd = open_dir(&dirfd, *name)?;
        }
        Ok(dirfd)
    }
}

// Existing symlinks are not followed, so an archive cannot redirect later
// entries out of the destination by planting a link first.
fn open_dir(dirfd: &OwnedFd, name: impl rustix::path::Arg) -> Result<OwnedFd> {
    Ok(openat(
        dirfd,
        name,
        OFlags::PATH | OFlags::DIRECTORY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
        Mode::empty(),
    )?)
}

/// Extract every entry of `reader` below `dest`, in archive order.
///
/// Returns the number of entries materialised. Directories are created with
/// mode 0755 (existing ones are fine); every other entry is written as a
/// regular file carrying the low 9 bits of its mode, with missing parent
/// directories created on the way.
///
/// # Errors
///
/// The first failure aborts extraction. Entries extracted before it are left
/// in place. A name that would land outside `dest` fails with
/// [`Error::PathTraversal`] before anything is created for it.
pub fn unpack_reader<R: Read>(reader: &mut Reader<R>, dest: impl AsRef<Path>) -> Result<usize> {
    let dest = dest.as_ref();
    debug!("unpacking into {}", dest.display());

    fs::create_dir_all(dest)?;
    let dest_fd = openat(
        CWD,
        dest,
        OFlags::PATH | OFlags::DIRECTORY | OFlags::CLOEXEC,
        Mode::empty(),
    )?;
    let unpacker = Unpacker { dest, dest_fd };

    let mut count = 0;
    while let Some(entry) = reader.next_entry()? {
        unpacker.unpack_entry(&entry)?;
        count += 1;
    }
    debug!("unpacked {count} entries");
    Ok(count)
}

/// Extract the archive read from `source` below `dest` with default [`Limits`].
///
/// See [`unpack_reader`].
pub fn unpack_to_dir<R: Read>(source: R, dest: impl AsRef<Path>) -> Result<usize> {
    unpack_with_limits(source, dest, Limits::default())
}

/// Extract the archive read from `source` below `dest`, rejecting headers
/// that exceed `limits`.
///
/// See [`unpack_reader`].
pub fn unpack_with_limits<R: Read>(
    source: R,
    dest: impl AsRef<Path>,
    limits: Limits,
) -> Result<usize> {
    unpack_reader(&mut Reader::with_limits(source, limits), dest)
}
