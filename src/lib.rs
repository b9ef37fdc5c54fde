//! Streaming reader and writer for the newc ("new ASCII", SVR4) cpio format.
//!
//! newc is the format the Linux kernel expects for initramfs images. Every
//! entry is a 110 byte ASCII header with fields in hexadecimal, followed by
//! the NUL terminated name and the file data, each padded to a multiple of 4
//! bytes. The archive ends with an entry called `TRAILER!!!`.
//!
//! # Layers
//!
//! - [`header`]: encoding and decoding of the fixed 110 byte header.
//! - [`Reader`] and [`Writer`]: sequential entry level access to a byte
//!   stream.
//! - [`normalize_for_archive`] and [`resolve_for_extraction`]: the name checks
//!   applied on the way into and out of an archive.
//! - [`pack_dir`] and [`unpack_to_dir`]: whole directory trees.
//!
//! Only directories and regular files are supported. Hard links, symlinks,
//! device nodes and checksums are not written; the checksum magic `070702`
//! is accepted on read and its check field ignored.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use newc::{Reader, Writer};
//!
//! let mut writer = Writer::new(Vec::new());
//! writer.add_dir("bin", 0o755)?;
//! writer.add_file("bin/hello.txt", 0o644, b"hello")?;
//! let archive = writer.finish()?;
//!
//! let mut reader = Reader::new(Cursor::new(archive));
//! let dir = reader.next_entry()?.unwrap();
//! assert!(dir.is_dir());
//! let file = reader.next_entry()?.unwrap();
//! assert_eq!(file.name, "bin/hello.txt");
//! assert_eq!(file.data, b"hello");
//! assert!(reader.next_entry()?.is_none());
//! # Ok::<(), newc::Error>(())
//! ```

pub mod entry;
pub mod error;
pub mod header;
pub mod limits;
pub mod pack;
pub mod path;
pub mod reader;
pub mod unpack;
pub mod writer;

mod util;


pub use entry::{Entry, EntryKind, TRAILER_NAME};
pub use error::{Error, Result};
pub use header::{pad4, HeaderError, HeaderFields, Magic, HEADER_SIZE};
pub use limits::Limits;
pub use pack::{pack_dir, pack_dir_into};
pub use path::{normalize_for_archive, resolve_for_extraction};
pub use reader::{Entries, Reader};
pub use unpack::{unpack_reader, unpack_to_dir, unpack_with_limits};
pub use writer::{Writer, WriterOptions};
