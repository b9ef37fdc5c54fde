//! Fixed-layout newc header encoding and decoding.
//!
//! Every entry in a newc archive starts with a 110 byte ASCII header:
//!
//! | Offset | Size | Field     | Description                                  |
//! |--------|------|-----------|----------------------------------------------|
//! | 0      | 6    | magic     | `"070701"` (newc) or `"070702"` (newc + crc) |
//! | 6      | 8    | ino       | Inode number                                 |
//! | 14     | 8    | mode      | File type and permission bits                |
//! | 22     | 8    | uid       | Owner user ID                                |
//! | 30     | 8    | gid       | Owner group ID                               |
//! | 38     | 8    | nlink     | Number of links                              |
//! | 46     | 8    | mtime     | Modification time (Unix epoch)               |
//! | 54     | 8    | filesize  | Length of the data that follows the name     |
//! | 62     | 8    | devmajor  | Device containing the file                   |
//! | 70     | 8    | devminor  |                                              |
//! | 78     | 8    | rdevmajor | Device number for special files              |
//! | 86     | 8    | rdevminor |                                              |
//! | 94     | 8    | namesize  | Length of the name including its NUL         |
//! | 102    | 8    | check     | Checksum, always zero for plain newc         |
//!
//! All numeric fields are 8 hexadecimal ASCII digits. They are written in
//! uppercase and accepted in either case.

use std::fmt;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of a newc header in bytes.
pub const HEADER_SIZE: usize = 110;

/// Magic for plain newc headers. This is the only magic ever written.
pub const NEWC_MAGIC: &[u8; 6] = b"070701";

/// Magic for newc headers carrying a checksum. Accepted on read, never verified.
pub const CRC_MAGIC: &[u8; 6] = b"070702";

/// Errors that can occur when decoding a newc header.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The provided data is too short to contain a header.
    #[error("insufficient data: expected {HEADER_SIZE} bytes, got {0}")]
    InsufficientData(usize),

    /// The first six bytes are not a recognised newc magic.
    #[error("invalid magic {:?}", String::from_utf8_lossy(.0))]
    BadMagic([u8; 6]),

    /// A numeric field contains a character outside `[0-9A-Fa-f]`.
    #[error("invalid hex in {field} field: {:?}", String::from_utf8_lossy(.value))]
    InvalidHex {
        /// Name of the offending field.
        field: &'static str,
        /// The raw field bytes.
        value: [u8; 8],
    },

    /// The namesize field is zero, so the entry has no name (not even a NUL).
    #[error("namesize is zero")]
    ZeroNameSize,
}

/// Result type for header decoding.
pub type Result<T> = std::result::Result<T, HeaderError>;

/// The header variant, as identified by its magic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Magic {
    /// `"070701"`
    #[default]
    Newc,
    /// `"070702"`
    Crc,
}

impl Magic {
    /// Identify a magic, returning `None` for anything unrecognised.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 6]) -> Option<Magic> {
        match bytes {
            NEWC_MAGIC => Some(Magic::Newc),
            CRC_MAGIC => Some(Magic::Crc),
            _ => None,
        }
    }

    /// The six magic bytes for this variant.
    #[must_use]
    pub fn as_bytes(self) -> &'static [u8; 6] {
        match self {
            Magic::Newc => NEWC_MAGIC,
            Magic::Crc => CRC_MAGIC,
        }
    }
}

/// Raw 110-byte newc header with named fields.
///
/// Each numeric field is kept in its on-disk form: 8 hexadecimal ASCII digits.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawHeader {
    pub magic: [u8; 6],
    pub ino: [u8; 8],
    pub mode: [u8; 8],
    pub uid: [u8; 8],
    pub gid: [u8; 8],
    pub nlink: [u8; 8],
    pub mtime: [u8; 8],
    pub filesize: [u8; 8],
    pub devmajor: [u8; 8],
    pub devminor: [u8; 8],
    pub rdevmajor: [u8; 8],
    pub rdevminor: [u8; 8],
    pub namesize: [u8; 8],
    pub check: [u8; 8],
}

impl fmt::Debug for RawHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHeader")
            .field("magic", &String::from_utf8_lossy(&self.magic))
            .field("mode", &String::from_utf8_lossy(&self.mode))
            .field("filesize", &String::from_utf8_lossy(&self.filesize))
            .field("namesize", &String::from_utf8_lossy(&self.namesize))
            .finish_non_exhaustive()
    }
}

/// Decoded numeric header fields.
///
/// The checksum field is not represented: it is always written as zero and
/// ignored on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub devmajor: u32,
    pub devminor: u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    pub namesize: u32,
}

impl HeaderFields {
    /// Encode into a complete header with the plain newc magic and a zero checksum.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let raw = RawHeader {
            magic: *Magic::Newc.as_bytes(),
            ino: format_hex8(self.ino),
            mode: format_hex8(self.mode),
            uid: format_hex8(self.uid),
            gid: format_hex8(self.gid),
            nlink: format_hex8(self.nlink),
            mtime: format_hex8(self.mtime),
            filesize: format_hex8(self.filesize),
            devmajor: format_hex8(self.devmajor),
            devminor: format_hex8(self.devminor),
            rdevmajor: format_hex8(self.rdevmajor),
            rdevminor: format_hex8(self.rdevminor),
            namesize: format_hex8(self.namesize),
            check: format_hex8(0),
        };

        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Decode a header, returning the magic variant alongside the fields.
    ///
    /// # Errors
    ///
    /// Fails if the slice is shorter than [`HEADER_SIZE`], the magic is not
    /// recognised, any numeric field (including the checksum) is not
    /// hexadecimal, or the namesize is zero.
    pub fn decode(bytes: &[u8]) -> Result<(Magic, HeaderFields)> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::InsufficientData(bytes.len()));
        }
        let raw = RawHeader::ref_from_bytes(&bytes[..HEADER_SIZE])
            .map_err(|_| HeaderError::InsufficientData(bytes.len()))?;

        let magic = Magic::from_bytes(&raw.magic).ok_or(HeaderError::BadMagic(raw.magic))?;

        let fields = HeaderFields {
            ino: parse_hex8("ino", &raw.ino)?,
            mode: parse_hex8("mode", &raw.mode)?,
            uid: parse_hex8("uid", &raw.uid)?,
            gid: parse_hex8("gid", &raw.gid)?,
            nlink: parse_hex8("nlink", &raw.nlink)?,
            mtime: parse_hex8("mtime", &raw.mtime)?,
            filesize: parse_hex8("filesize", &raw.filesize)?,
            devmajor: parse_hex8("devmajor", &raw.devmajor)?,
            devminor: parse_hex8("devminor", &raw.devminor)?,
            rdevmajor: parse_hex8("rdevmajor", &raw.rdevmajor)?,
            rdevminor: parse_hex8("rdevminor", &raw.rdevminor)?,
            namesize: parse_hex8("namesize", &raw.namesize)?,
        };
        parse_hex8("check", &raw.check)?;

        if fields.namesize == 0 {
            return Err(HeaderError::ZeroNameSize);
        }

        Ok((magic, fields))
    }
}

/// Format a value as 8 zero-padded uppercase hexadecimal ASCII digits.
#[must_use]
pub fn format_hex8(value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(hex::encode_upper(value.to_be_bytes()).as_bytes());
    out
}

/// Parse exactly 8 hexadecimal ASCII digits, in either case.
///
/// # Errors
///
/// Returns [`HeaderError::InvalidHex`] naming `field` if any byte is not a hex digit.
pub fn parse_hex8(field: &'static str, bytes: &[u8; 8]) -> Result<u32> {
    let mut value = [0u8; 4];
    hex::decode_to_slice(bytes, &mut value).map_err(|_| HeaderError::InvalidHex {
        field,
        value: *bytes,
    })?;
    Ok(u32::from_be_bytes(value))
}

/// Number of zero bytes needed to bring `n` up to the next multiple of 4.
#[must_use]
pub const fn pad4(n: u64) -> u64 {
    (4 - (n & 3)) & 3
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn sample() -> HeaderFields {
        HeaderFields {
            ino: 1,
            mode: 0o100644,
            uid: 1000,
            gid: 100,
            nlink: 1,
            mtime: 0x5f5e_1000,
            filesize: 5,
            namesize: 14,
            ..Default::default()
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<RawHeader>(), HEADER_SIZE);
    }

    #[test]
    fn test_format_hex8() {
        assert_eq!(&format_hex8(0), b"00000000");
        assert_eq!(&format_hex8(0o100644), b"000081A4");
        assert_eq!(&format_hex8(0xdead_beef), b"DEADBEEF");
        assert_eq!(&format_hex8(u32::MAX), b"FFFFFFFF");
    }

    #[test]
    fn test_parse_hex8() {
        assert_eq!(parse_hex8("x", b"000081A4").unwrap(), 0o100644);
        assert_eq!(parse_hex8("x", b"000081a4").unwrap(), 0o100644);
        assert_eq!(parse_hex8("x", b"DeAdBeEf").unwrap(), 0xdead_beef);
        assert_eq!(parse_hex8("x", b"FFFFFFFF").unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_hex8_invalid() {
        for bad in [b"0000000G", b" 0000000", b"0000000\0", b"-0000001"] {
            let err = parse_hex8("mode", bad).unwrap_err();
            assert!(
                matches!(err, HeaderError::InvalidHex { field: "mode", value } if &value == bad),
                "{err:?}"
            );
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode();
        let expected = concat!(
            "070701",
            "00000001", // ino
            "000081A4", // mode
            "000003E8", // uid
            "00000064", // gid
            "00000001", // nlink
            "5F5E1000", // mtime
            "00000005", // filesize
            "00000000", // devmajor
            "00000000", // devminor
            "00000000", // rdevmajor
            "00000000", // rdevminor
            "0000000E", // namesize
            "00000000", // check
        );
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), expected);
    }

    #[test]
    fn test_decode_encoded() {
        let (magic, fields) = HeaderFields::decode(&sample().encode()).unwrap();
        assert_eq!(magic, Magic::Newc);
        assert_eq!(fields, sample());
    }

    #[test]
    fn test_decode_crc_magic() {
        let mut bytes = sample().encode();
        bytes[..6].copy_from_slice(Magic::Crc.as_bytes());
        // a nonzero checksum is not verified
        bytes[102..110].copy_from_slice(b"0000abcd");
        let (magic, fields) = HeaderFields::decode(&bytes).unwrap();
        assert_eq!(magic, Magic::Crc);
        assert_eq!(fields, sample());
    }

    #[test]
    fn test_magic_bytes() {
        for magic in [Magic::Newc, Magic::Crc] {
            assert_eq!(Magic::from_bytes(magic.as_bytes()), Some(magic));
        }
        assert_eq!(Magic::Newc.as_bytes(), NEWC_MAGIC);
        assert_eq!(Magic::Crc.as_bytes(), CRC_MAGIC);
        assert_eq!(Magic::from_bytes(b"070707"), None);
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut bytes = sample().encode();
        bytes[..6].copy_from_slice(b"070707");
        assert!(matches!(
            HeaderFields::decode(&bytes),
            Err(HeaderError::BadMagic(m)) if &m == b"070707"
        ));
    }

    #[test]
    fn test_decode_bad_hex() {
        let mut bytes = sample().encode();
        bytes[54] = b'x';
        assert!(matches!(
            HeaderFields::decode(&bytes),
            Err(HeaderError::InvalidHex {
                field: "filesize",
                ..
            })
        ));

        let mut bytes = sample().encode();
        bytes[109] = b'z';
        assert!(matches!(
            HeaderFields::decode(&bytes),
            Err(HeaderError::InvalidHex { field: "check", .. })
        ));
    }

    #[test]
    fn test_decode_zero_namesize() {
        let fields = HeaderFields {
            namesize: 0,
            ..sample()
        };
        assert!(matches!(
            HeaderFields::decode(&fields.encode()),
            Err(HeaderError::ZeroNameSize)
        ));
    }

    #[test]
    fn test_decode_insufficient() {
        let bytes = sample().encode();
        assert!(matches!(
            HeaderFields::decode(&bytes[..100]),
            Err(HeaderError::InsufficientData(100))
        ));
    }

    #[test]
    fn test_pad4() {
        assert_eq!(pad4(0), 0);
        assert_eq!(pad4(1), 3);
        assert_eq!(pad4(2), 2);
        assert_eq!(pad4(3), 1);
        assert_eq!(pad4(4), 0);
        assert_eq!(pad4(110 + 14), 0);
        assert_eq!(pad4(110 + 11), 3);
        assert_eq!(pad4(u64::from(u32::MAX)), 1);
    }
}
