//! On-disk format constants and safety limits.

/// Magic bytes at offset 0 of every archive file.
pub const MAGIC: [u8; 4] = *b"MTA1";

/// Version of the container layout itself (header + tree blob), independent of
/// the schema [`FileVersion`](crate::types::FileVersion) stored inside it.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed byte length of the on-disk header.
pub const HEADER_LEN: usize = 64;

/// Conventional file extension for archive files.
pub const FILE_EXTENSION: &str = "mta";

/// Upper bound on the encoded tree blob. Rejects absurd lengths read from a
/// corrupt header before any allocation happens.
pub const MAX_TREE_BYTES: u64 = 1 << 34;

/// Upper bound on a group, dataset, or filter identifier.
pub const MAX_ID_LEN: usize = 256;

/// Reserved name of the container-level group holding the persisted channel
/// summary table.
pub const SUMMARY_GROUP: &str = "channel_summary";

/// Reserved name of the per-survey group holding filter records.
pub const FILTERS_GROUP: &str = "filters";
