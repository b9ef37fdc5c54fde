//! Packing a directory tree into a newc archive.
//!
//! The walk is done with `*at()` syscalls relative to an open directory fd,
//! so the tree is never resolved through symlinks below the root. Children
//! are visited in byte order of their names and every directory is emitted
//! before its contents, which makes the output a pure function of the tree.

use std::{
    ffi::{CStr, OsStr},
    fs::File,
    io::{Read, Write},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use rustix::{
    fd::{AsFd, OwnedFd},
    fs::{openat, statat, AtFlags, Dir, FileType, Mode, OFlags, CWD},
};

use crate::{
    error::{Error, Result},
    writer::{Writer, WriterOptions},
};

/// Permission bits used for directories and executable files.
const EXEC_PERMISSIONS: u32 = 0o755;
/// Permission bits used for everything else.
const PLAIN_PERMISSIONS: u32 = 0o644;

fn file_type_name(ifmt: FileType) -> &'static str {
    match ifmt {
        FileType::RegularFile => "regular file",
        FileType::Directory => "directory",
        FileType::Symlink => "symlink",
        FileType::Fifo => "fifo",
        FileType::Socket => "socket",
        FileType::CharacterDevice => "character device",
        FileType::BlockDevice => "block device",
        FileType::Unknown => "unknown",
    }
}

struct Packer<'a, W: Write> {
    writer: &'a mut Writer<W>,
    root: &'a Path,
}

impl<W: Write> Packer<'_, W> {
    fn pack_directory(&mut self, fd: &OwnedFd, prefix: &str) -> Result<()> {
        let mut names: Vec<Box<CStr>> = Vec::new();
        for item in Dir::read_from(fd)? {
            let entry = item?;
            let name = entry.file_name();
            if name == c"." || name == c".." {
                continue;
            }
            names.push(name.into());
        }
        names.sort();

        for name in &names {
            let name = OsStr::from_bytes(name.to_bytes());
            let archive_name = self.archive_name(prefix, name)?;
            self.pack_inode(fd, name, &archive_name)?;
        }
        Ok(())
    }

    fn pack_inode(&mut self, dirfd: &OwnedFd, name: &OsStr, archive_name: &str) -> Result<()> {
        let stat = statat(dirfd, name, AtFlags::SYMLINK_NOFOLLOW)?;

        match FileType::from_raw_mode(stat.st_mode) {
            FileType::Directory => {
                trace!("dir {archive_name}");
                self.writer.add_dir(archive_name, EXEC_PERMISSIONS)?;
                let fd = open_dir(dirfd, name)?;
                self.pack_directory(&fd, archive_name)
            }
            FileType::RegularFile => {
                let fd = openat(
                    dirfd,
                    name,
                    OFlags::RDONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
                    Mode::empty(),
                )?;
                let mut data = Vec::with_capacity(stat.st_size as usize);
                File::from(fd).read_to_end(&mut data)?;

                let permissions = if stat.st_mode & 0o111 != 0 {
                    EXEC_PERMISSIONS
                } else {
                    PLAIN_PERMISSIONS
                };
                trace!("file {archive_name} ({} bytes)", data.len());
                self.writer.add_file(archive_name, permissions, &data)
            }
            other => Err(Error::UnsupportedEntryType {
                path: self.root.join(archive_name),
                kind: file_type_name(other),
            }),
        }
    }

    fn archive_name(&self, prefix: &str, name: &OsStr) -> Result<String> {
        let Some(name) = name.to_str() else {
            let path: PathBuf = [Path::new(prefix), Path::new(name)].iter().collect();
            return Err(Error::InvalidName {
                name: path.to_string_lossy().into_owned(),
                reason: "file name is not valid UTF-8",
            });
        };
        if prefix.is_empty() {
            Ok(name.to_owned())
        } else {
            Ok(format!("{prefix}/{name}"))
        }
    }
}

fn open_dir(dirfd: impl AsFd, name: impl rustix::path::Arg) -> Result<OwnedFd> {
    Ok(openat(
        dirfd,
        name,
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
        Mode::empty(),
    )?)
}

/// Walk `root` and append every directory and regular file below it to
/// `writer`, without writing the trailer.
///
/// The root itself is not recorded. Directories are stored with permissions
/// 0755; files get 0755 if any execute bit is set on disk and 0644 otherwise.
///
/// # Errors
///
/// Anything other than a directory or regular file (symlinks, devices,
/// sockets, fifos) fails with [`Error::UnsupportedEntryType`]. A file name
/// that is not UTF-8 fails with [`Error::InvalidName`]. Entries appended
/// before the failure stay in the writer.
pub fn pack_dir_into<W: Write>(root: impl AsRef<Path>, writer: &mut Writer<W>) -> Result<()> {
    let root = root.as_ref();
    debug!("packing {}", root.display());

    // The root may itself be reached through a symlink.
    let fd = openat(
        CWD,
        root,
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
        Mode::empty(),
    )?;

    Packer { writer, root }.pack_directory(&fd, "")
}

/// Pack `root` into a complete archive written to `sink`.
///
/// The trailer is written even when the walk fails part way; in that case
/// the walk error is returned and the sink is dropped.
///
/// ```no_run
/// use newc::{pack_dir, WriterOptions};
///
/// let archive = pack_dir("rootfs", Vec::new(), WriterOptions::default())?;
/// # Ok::<(), newc::Error>(())
/// ```
pub fn pack_dir<W: Write>(
    root: impl AsRef<Path>,
    sink: W,
    options: WriterOptions,
) -> Result<W> {
    let mut writer = Writer::with_options(sink, options);
    let walked = pack_dir_into(root, &mut writer);
    let closed = writer.close();
    walked?;
    closed?;
    writer.finish()
}
