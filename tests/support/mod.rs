pub mod socket_guard;

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::FileOptions;

/// Builds an in-memory zip archive from `(name, content)` pairs.
///
/// Names ending in `/` become directory entries.
#[allow(dead_code)]
#[must_use]
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, FileOptions::default()).unwrap();
        } else {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}
