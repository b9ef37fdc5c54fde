//! Name normalization for archive entries and safe resolution on extraction.
//!
//! Every name that crosses the archive/filesystem boundary goes through one
//! of the two functions here. [`normalize_for_archive`] runs on the way in
//! (writer side), [`resolve_for_extraction`] on the way out (unpacker side).
//! The extraction check never relies on the writer having run the first one:
//! an archive from elsewhere is untrusted.

use std::{
    borrow::Cow,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};

use log::trace;

use crate::error::{Error, Result};

/// Convert platform separators to `/`. A no-op on Unix.
fn to_slash(raw: &str) -> Cow<'_, str> {
    if MAIN_SEPARATOR == '/' {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(raw.replace(MAIN_SEPARATOR, "/"))
    }
}

/// Lexically clean a slash-separated relative path.
///
/// Empty and `.` components are dropped, `..` cancels the preceding normal
/// component. A `..` with nothing left to cancel is kept, so a path that
/// climbs out of its root still starts with `..` afterwards. An empty
/// result is returned as `"."`.
fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            normal => parts.push(normal),
        }
    }

    if parts.is_empty() {
        ".".into()
    } else {
        parts.join("/")
    }
}

/// Whether a cleaned path refers to the root itself or lies outside it.
fn escapes_root(clean: &str) -> bool {
    clean == "."
        || clean.is_empty()
        || clean == ".."
        || clean.starts_with("../")
        || clean.contains("/../")
}

/// Normalize a caller-supplied name into the form stored in the archive.
///
/// Separators become `/`, one leading `./` and all leading `/` are removed,
/// surrounding whitespace is trimmed and redundant `.`/empty components are
/// collapsed. The result is a non-empty relative path that never starts with
/// `/` or `../` and never contains `/../`.
///
/// # Errors
///
/// [`Error::InvalidName`] if nothing is left after normalization, the name
/// contains a NUL byte, or the name refers to the root or climbs out of it.
pub fn normalize_for_archive(raw: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidName {
        name: raw.to_string(),
        reason,
    };

    let slashed = to_slash(raw);
    let name = slashed.strip_prefix("./").unwrap_or(&slashed);
    let name = name.trim_start_matches('/').trim();
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.contains('\0') {
        return Err(invalid("name contains a NUL byte"));
    }

    let clean = clean(name);
    if escapes_root(&clean) {
        return Err(invalid("name is not inside the archive root"));
    }
    Ok(clean)
}

/// Resolve an archive entry name to a path below `dest`.
///
/// Applies the same separator conversion and leading-slash stripping as
/// [`normalize_for_archive`], so an absolute name such as `/etc/passwd` lands
/// at `dest/etc/passwd`.
///
/// # Errors
///
/// [`Error::PathTraversal`] if the cleaned name is empty, refers to `dest`
/// itself, or would resolve outside of `dest`.
pub fn resolve_for_extraction(dest: &Path, raw: &str) -> Result<PathBuf> {
    let slashed = to_slash(raw);
    let clean = clean(slashed.trim_start_matches('/'));
    if escapes_root(&clean) {
        return Err(Error::PathTraversal {
            name: raw.to_string(),
        });
    }
    trace!("resolved {raw:?} to {clean:?}");
    Ok(dest.join(clean))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("a/b"), "a/b");
        assert_eq!(clean("a//b/"), "a/b");
        assert_eq!(clean("a/./b/."), "a/b");
        assert_eq!(clean("a/../b"), "b");
        assert_eq!(clean("a/b/../../.."), "..");
        assert_eq!(clean("../../a"), "../../a");
        assert_eq!(clean(""), ".");
        assert_eq!(clean("./."), ".");
    }

    #[test]
    fn test_normalize_accepts() {
        let cases = [
            ("bin/hello.txt", "bin/hello.txt"),
            ("./etc/conf", "etc/conf"),
            ("/usr/bin", "usr/bin"),
            ("///🧊/🧊", "🧊/🧊"),
            ("  spaced  ", "spaced"),
            ("cant/hate//the/path", "cant/hate/the/path"),
            ("a/./b/", "a/b"),
            ("a/../b", "b"),
            ("..foo/bar", "..foo/bar"),
            ("this is now العَرَبِيَّة.txt", "this is now العَرَبِيَّة.txt"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_for_archive(raw).unwrap(), expected, "{raw:?}");
        }
    }

    #[test]
    fn test_normalize_rejects() {
        for raw in [
            "", "/", "   ", "./", ".", "..", "../x", "a/../../x", "x/..", "/../etc", "a\0b",
        ] {
            let err = normalize_for_archive(raw).unwrap_err();
            assert!(
                matches!(&err, Error::InvalidName { name, .. } if name == raw),
                "{raw:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_normalize_never_escapes() {
        for raw in ["a/b/c", "/a", "./a/./b", "a/b/../c", "x//y"] {
            let name = normalize_for_archive(raw).unwrap();
            assert!(!name.is_empty());
            assert!(!name.starts_with('/'));
            assert!(!name.starts_with("../"));
            assert!(!name.contains("/../"));
        }
    }

    #[test]
    fn test_resolve() {
        let dest = Path::new("/srv/out");
        let cases = [
            ("etc/conf", "/srv/out/etc/conf"),
            ("/etc/passwd", "/srv/out/etc/passwd"),
            ("./bin//sh", "/srv/out/bin/sh"),
            ("a/../b", "/srv/out/b"),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                resolve_for_extraction(dest, raw).unwrap(),
                PathBuf::from(expected),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dest = Path::new("/srv/out");
        for raw in ["../etc/passwd", "..", "a/../../x", "/../../root", ".", "", "x/.."] {
            assert!(
                matches!(
                    resolve_for_extraction(dest, raw),
                    Err(Error::PathTraversal { .. })
                ),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_resolve_does_not_trim() {
        // whitespace is significant in archived names
        let dest = Path::new("/srv/out");
        assert_eq!(
            resolve_for_extraction(dest, " x ").unwrap(),
            PathBuf::from("/srv/out/ x ")
        );
    }
}
