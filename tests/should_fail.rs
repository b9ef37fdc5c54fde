//! Hostile and damaged archives.

use std::{fs, io::Cursor};

use newc::{
    pad4, unpack_to_dir, Error, HeaderError, HeaderFields, Limits, Reader, Writer, HEADER_SIZE,
    TRAILER_NAME,
};

fn entry(name: &[u8], mode: u32, data: &[u8]) -> Vec<u8> {
    let fields = HeaderFields {
        mode,
        nlink: 1,
        filesize: data.len() as u32,
        namesize: name.len() as u32 + 1,
        ..Default::default()
    };
    let mut out = fields.encode().to_vec();
    out.extend_from_slice(name);
    out.push(0);
    out.resize(out.len() + pad4(out.len() as u64) as usize, 0);
    out.extend_from_slice(data);
    out.resize(out.len() + pad4(data.len() as u64) as usize, 0);
    out
}

fn archive(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut out = entries.concat();
    out.extend(entry(TRAILER_NAME.as_bytes(), 0, b""));
    out
}

fn first_error(data: Vec<u8>) -> Error {
    let mut reader = Reader::new(Cursor::new(data));
    loop {
        match reader.next_entry() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("archive read without error"),
            Err(e) => return e,
        }
    }
}

#[test]
fn test_traversal_leaves_nothing_behind() {
    let outer = tempfile::tempdir().unwrap();
    let dest = outer.path().join("dest");

    for name in ["../escape", "sub/../../escape", "sub/../.."] {
        let data = archive(&[
            entry(b"sub", 0o040755, b""),
            entry(name.as_bytes(), 0o100644, b"gotcha"),
        ]);
        let err = unpack_to_dir(Cursor::new(data), &dest).unwrap_err();
        assert!(
            matches!(&err, Error::PathTraversal { name: n } if n == name),
            "{name}: {err:?}"
        );
    }
    let mut names: Vec<_> = fs::read_dir(outer.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert_eq!(names, ["dest"]);
}

#[test]
fn test_writer_refuses_escaping_names() {
    let mut writer = Writer::new(Vec::new());
    for name in ["../x", "a/../../x", "..", ""] {
        assert!(matches!(
            writer.add_file(name, 0o644, b""),
            Err(Error::InvalidName { .. })
        ));
    }
    assert_eq!(writer.position(), 0);
}

#[test]
fn test_truncated_everywhere() {
    let full = archive(&[
        entry(b"dir", 0o040755, b""),
        entry(b"dir/file", 0o100644, b"some file data"),
    ]);
    // every proper prefix that does not end on an entry boundary is truncated
    let boundaries = {
        let first = entry(b"dir", 0o040755, b"").len();
        let second = first + entry(b"dir/file", 0o100644, b"some file data").len();
        [0, first, second]
    };
    for len in 0..full.len() {
        let data = full[..len].to_vec();
        let mut reader = Reader::new(Cursor::new(data));
        let result: newc::Result<Vec<_>> = reader.entries().collect();
        if boundaries.contains(&len) {
            assert!(result.is_ok(), "prefix {len}: {result:?}");
        } else {
            assert!(
                matches!(result, Err(Error::Truncated { .. })),
                "prefix {len}: {result:?}"
            );
        }
    }
}

#[test]
fn test_bad_magic() {
    let mut data = archive(&[entry(b"f", 0o100644, b"x")]);
    data[..6].copy_from_slice(b"070707");
    assert!(matches!(
        first_error(data),
        Error::Format(HeaderError::BadMagic(m)) if &m == b"070707"
    ));
}

#[test]
fn test_bad_magic_in_second_header() {
    let mut data = archive(&[entry(b"f", 0o100644, b"x")]);
    let second = entry(b"f", 0o100644, b"x").len();
    data[second..second + 6].copy_from_slice(b"GARBAG");
    assert!(matches!(
        first_error(data),
        Error::Format(HeaderError::BadMagic(_))
    ));
}

#[test]
fn test_bad_hex_digit() {
    let mut data = archive(&[entry(b"f", 0o100644, b"x")]);
    // last digit of the filesize field
    data[6 + 6 * 8 + 7] = b'g';
    assert!(matches!(
        first_error(data),
        Error::Format(HeaderError::InvalidHex { field: "filesize", .. })
    ));
}

#[test]
fn test_zero_namesize() {
    let fields = HeaderFields::default();
    let mut data = fields.encode().to_vec();
    data.extend(archive(&[]));
    assert!(matches!(
        first_error(data),
        Error::Format(HeaderError::ZeroNameSize)
    ));
}

#[test]
fn test_oversized_fields() {
    let huge = HeaderFields {
        mode: 0o100644,
        filesize: u32::MAX,
        namesize: 2,
        ..Default::default()
    };
    let mut data = huge.encode().to_vec();
    data.extend_from_slice(b"f\0");
    let mut reader = Reader::with_limits(Cursor::new(data), Limits::strict());
    assert!(matches!(
        reader.next_entry(),
        Err(Error::FileTooLarge { size: u32::MAX, .. })
    ));

    let long_name = HeaderFields {
        namesize: u32::MAX,
        ..Default::default()
    };
    let mut reader = Reader::new(Cursor::new(long_name.encode().to_vec()));
    assert!(matches!(
        reader.next_entry(),
        Err(Error::NameTooLong { size: u32::MAX, .. })
    ));
}

#[test]
fn test_missing_trailer_is_clean_eof() {
    // no trailer, but the stream ends on an entry boundary
    let data = entry(b"f", 0o100644, b"x");
    let mut reader = Reader::new(Cursor::new(data));
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.is_done());
}

#[test]
fn test_short_header_at_start() {
    assert!(matches!(
        first_error(b"0707".to_vec()),
        Error::Truncated { pos: 0 }
    ));
    assert_eq!(HEADER_SIZE, 110);
}
