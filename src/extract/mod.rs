//! Multi-part archive extraction.
//!
//! Zip files at the top level of the output directory are grouped by their
//! name (see [`group_key`]) and each group is extracted into a directory
//! named after its key.

mod archive;
mod error;
mod group;

pub use archive::{ExtractStats, extract_all, extract_archive, resolve_entry_path};
pub use error::ExtractError;
pub use group::{ArchiveGroup, group_archives, group_key, is_zip_name, scan_archives};
