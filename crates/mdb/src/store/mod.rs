use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use tshrag_core::{
    MdbConfig, Metric, MetricEntry, MetricId, MetricIdPattern, Result, ScopedLock, Time,
    TshragError,
};

use crate::layout;


/// Durable append-only time series store, one directory per metric.
///
/// Mutations on one metric serialize through that metric's lock file. Reads
/// take no lock and may observe a bucket that is being appended to; partial
/// trailing lines are skipped.
#[derive(Debug, Clone)]
pub struct Mdb {
    root: PathBuf,
    time_accuracy: usize,
    lock_timeout: Duration,
}

impl Mdb {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, config: &MdbConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), accuracy = config.time_accuracy, "Mdb opened");
        Ok(Self {
            root,
            time_accuracy: config.time_accuracy.clamp(1, tshrag_core::time::TIME_WIDTH),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn time_accuracy(&self) -> usize {
        self.time_accuracy
    }

    fn lock(&self, id: &MetricId) -> Result<ScopedLock> {
        ScopedLock::acquire(layout::lock_file(&self.root, id), self.lock_timeout)
    }

    /// Create a metric. Returns false when it already exists or on failure.
    pub fn create(&self, metric: &Metric) -> bool {
        match self.try_create(metric) {
            Ok(created) => created,
            Err(e) => {
                warn!(metric = %metric.id, error = %e, "Failed to create metric");
                false
            }
        }
    }

    fn try_create(&self, metric: &Metric) -> Result<bool> {
        let _lock = self.lock(&metric.id)?;
        let dir = layout::metric_dir(&self.root, &metric.id);
        if dir.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&dir)?;
        write_index(&layout::index_file(&self.root, &metric.id), metric)?;
        info!(metric = %metric.id, "Metric created");
        Ok(true)
    }

    /// Create or overwrite a metric's metadata, keeping its entries.
    pub fn update(&self, metric: &Metric) -> bool {
        let result = self.lock(&metric.id).and_then(|_lock| {
            fs::create_dir_all(layout::metric_dir(&self.root, &metric.id))?;
            write_index(&layout::index_file(&self.root, &metric.id), metric)
        });
        match result {
            Ok(()) => {
                debug!(metric = %metric.id, "Metric metadata updated");
                true
            }
            Err(e) => {
                warn!(metric = %metric.id, error = %e, "Failed to update metric");
                false
            }
        }
    }

    /// Remove a metric and all of its entries. Returns false if absent.
    pub fn delete(&self, id: &MetricId) -> bool {
        let result = self.lock(id).and_then(|_lock| {
            let dir = layout::metric_dir(&self.root, id);
            if !dir.exists() {
                return Ok(false);
            }
            fs::remove_dir_all(&dir)?;
            Ok(true)
        });
        match result {
            Ok(deleted) => {
                if deleted {
                    info!(metric = %id, "Metric deleted");
                }
                deleted
            }
            Err(e) => {
                warn!(metric = %id, error = %e, "Failed to delete metric");
                false
            }
        }
    }

    /// Metric metadata, or `None` when absent or unreadable.
    pub fn get(&self, id: &MetricId) -> Option<Metric> {
        read_index(&layout::index_file(&self.root, id))
    }

    /// Every metric whose id matches `pattern`, sorted by id.
    ///
    /// A metric is only reported when its directory name reproduces its own
    /// id, which filters out stale or hand-renamed directories.
    pub fn list(&self, pattern: &MetricIdPattern) -> Vec<Metric> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Failed to list metrics");
                return Vec::new();
            }
        };

        let mut metrics: Vec<Metric> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let dir_name = entry.file_name().to_str()?.to_string();
                let keys: Vec<&str> = dir_name.split(layout::FS_SEPARATOR).collect();
                if !pattern.matches_keys(&keys) {
                    return None;
                }
                let metric = read_index(&entry.path().join(layout::INDEX_FILE))?;
                if layout::fs_name(&metric.id) != dir_name {
                    debug!(dir = %dir_name, metric = %metric.id, "Skipping metric with mismatched directory");
                    return None;
                }
                Some(metric)
            })
            .collect();

        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Entries of `id` with `start <= time <= end`, sorted by time.
    ///
    /// Only buckets that can hold such entries are opened. Unreadable files and
    /// malformed lines are skipped.
    pub fn read(&self, id: &MetricId, start: Time, end: Time) -> Vec<MetricEntry> {
        let mut entries = Vec::new();
        if start > end {
            return entries;
        }

        let dir = layout::metric_dir(&self.root, id);
        let Ok(dir_entries) = fs::read_dir(&dir) else {
            return entries;
        };

        let mut files: Vec<PathBuf> = dir_entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                layout::bucket_of(path).is_some_and(|b| layout::bucket_in_range(b, &start, &end))
            })
            .collect();
        files.sort();

        for path in &files {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable bucket");
                    continue;
                }
            };
            // Raw lines, so bad bytes only cost the line they are on.
            for line in BufReader::new(file).split(b'\n') {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Bucket read interrupted");
                        break;
                    }
                };
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<MetricEntry>(&line) {
                    Ok(entry) if start <= entry.time && entry.time <= end => entries.push(entry),
                    Ok(_) => {}
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Skipping malformed entry");
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.time.cmp(&b.time));
        debug!(metric = %id, buckets = files.len(), results = entries.len(), "Read completed");
        entries
    }

    /// Append one entry. Returns false on any failure, including a missing
    /// metric directory.
    pub fn write(&self, id: &MetricId, entry: &MetricEntry) -> bool {
        match self.try_write(id, entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(metric = %id, time = %entry.time, error = %e, "Failed to write entry");
                false
            }
        }
    }

    fn try_write(&self, id: &MetricId, entry: &MetricEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _lock = self.lock(id)?;
        let dir = layout::metric_dir(&self.root, id);
        if !dir.is_dir() {
            return Err(TshragError::NotFound(id.to_string()));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(layout::data_file(&self.root, id, &entry.time, self.time_accuracy))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

fn write_index(path: &Path, metric: &Metric) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(metric, &mut ser)?;
    fs::write(path, buf)?;
    Ok(())
}

fn read_index(path: &Path) -> Option<Metric> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(metric) => Some(metric),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt metric index");
            None
        }
    }
}
