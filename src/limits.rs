//! Allocation limits applied while reading untrusted archives.

/// Upper bounds on header fields that drive allocations in the reader.
///
/// A newc header declares the size of the name and data that follow it,
/// and the reader buffers both in memory. These limits are checked before
/// anything is allocated, so a hostile header cannot make the reader
/// reserve gigabytes for a stream that is only a few bytes long.
///
/// # Example
///
/// ```
/// use newc::Limits;
///
/// let limits = Limits {
///     max_file_size: 64 * 1024,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_name_size, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum namesize in bytes, including the terminating NUL.
    ///
    /// Default: 4096 bytes (Linux PATH_MAX).
    pub max_name_size: u32,

    /// Maximum filesize in bytes.
    ///
    /// Default: 1 GiB.
    pub max_file_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_size: 4096,
            max_file_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits that accept anything the format can express.
    ///
    /// Only use this for archives from trusted sources.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_name_size: u32::MAX,
            max_file_size: u32::MAX,
        }
    }

    /// Conservative limits for untrusted archives.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_name_size: 1024,
            max_file_size: 16 * 1024 * 1024, // 16 MiB
        }
    }
}
