//! On-disk naming of a metric store.
//!
//! ```text
//! <root>/<seg1-seg2>/index.json       metadata
//! <root>/<seg1-seg2>/<bucket>.jsonl   entry log, bucket = leading timestamp digits
//! <root>/<seg1-seg2>.lock             per-metric lock marker
//! ```

use std::path::{Path, PathBuf};

use tshrag_core::{MetricId, Time};

pub const INDEX_FILE: &str = "index.json";
pub const DATA_EXTENSION: &str = "jsonl";
pub const LOCK_EXTENSION: &str = "lock";
/// Joins metric id segments into a directory name.
pub const FS_SEPARATOR: &str = "-";

pub fn fs_name(id: &MetricId) -> String {
    id.keys().join(FS_SEPARATOR)
}

pub fn metric_dir(root: &Path, id: &MetricId) -> PathBuf {
    root.join(fs_name(id))
}

pub fn index_file(root: &Path, id: &MetricId) -> PathBuf {
    metric_dir(root, id).join(INDEX_FILE)
}

pub fn lock_file(root: &Path, id: &MetricId) -> PathBuf {
    root.join(format!("{}.{}", fs_name(id), LOCK_EXTENSION))
}

pub fn bucket_name(time: &Time, accuracy: usize) -> String {
    time.truncated(accuracy)
}

pub fn data_file(root: &Path, id: &MetricId, time: &Time, accuracy: usize) -> PathBuf {
    metric_dir(root, id).join(format!("{}.{}", bucket_name(time, accuracy), DATA_EXTENSION))
}

/// Bucket key of a data file, if the name has the expected shape.
pub fn bucket_of(path: &Path) -> Option<&str> {
    if path.extension()? != DATA_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    (!stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit())).then_some(stem)
}

/// Whether a bucket can hold entries within `[start, end]`.
///
/// Bounds are truncated to the bucket's own width, so stores written with a
/// different accuracy still prune correctly.
pub fn bucket_in_range(bucket: &str, start: &Time, end: &Time) -> bool {
    let width = bucket.len();
    start.truncated(width).as_str() <= bucket && bucket <= end.truncated(width).as_str()
}
