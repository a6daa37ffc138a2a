//! Disk cache for assembled roidbs.
//!
//! One JSON file per split under `<root>/cache/`. The cache contract is
//! existence-based: if the file is there it is deserialized and returned
//! as-is, with no staleness check against the annotation files. Delete the
//! file to force a rebuild after changing annotations.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::model::RoiRecord;
use crate::error::SearchsetError;

/// Reads a cached roidb from a JSON file.
pub fn read_roidb_cache(path: &Path) -> Result<Vec<RoiRecord>, SearchsetError> {
    let file = File::open(path).map_err(SearchsetError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| SearchsetError::CacheRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a roidb to a JSON cache file.
pub fn write_roidb_cache(path: &Path, roidb: &[RoiRecord]) -> Result<(), SearchsetError> {
    let file = File::create(path).map_err(SearchsetError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, roidb).map_err(|source| SearchsetError::CacheWrite {
        path: path.to_path_buf(),
        source,
    })
}
