//! Record filters.
//!
//! A [`Filter`] is a predicate over a [`FileRecord`] used in two places:
//! gating insertion into a store's collection, and gating replication to
//! a secondary store. All filters configured on a store must accept a
//! record for it to be inserted; a replication target copies a record
//! only when every one of its filters accepts it.

use crate::record::FileRecord;
use thiserror::Error;

/// Why a filter rejected a record.
#[derive(Debug, Clone, Error)]
#[error("filter rejected {name}: {reason}")]
pub struct FilterRejection {
    /// Name of the rejected record.
    pub name: String,
    /// Human-readable rejection reason.
    pub reason: String,
}

impl FilterRejection {
    /// Build a rejection for a record.
    pub fn new(record: &FileRecord, reason: impl Into<String>) -> Self {
        Self {
            name: record.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Predicate over a file record.
pub trait Filter: Send + Sync {
    /// Accept or reject a record.
    fn check(&self, record: &FileRecord) -> Result<(), FilterRejection>;

    /// Convenience boolean form used by the replication gate.
    fn accepts(&self, record: &FileRecord) -> bool {
        self.check(record).is_ok()
    }
}

impl<F> Filter for F
where
    F: Fn(&FileRecord) -> Result<(), FilterRejection> + Send + Sync,
{
    fn check(&self, record: &FileRecord) -> Result<(), FilterRejection> {
        self(record)
    }
}

/// Built-in filter over size bounds and an extension allow-list.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    min_size: Option<u64>,
    max_size: Option<u64>,
    extensions: Option<Vec<String>>,
}

impl FileFilter {
    /// Filter accepting everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject records smaller than `bytes` once their size is known.
    #[must_use]
    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    /// Reject records larger than `bytes` once their size is known.
    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Only accept records whose extension appears in `extensions`.
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.into().to_ascii_lowercase())
                .collect(),
        );
        self
    }
}

impl Filter for FileFilter {
    fn check(&self, record: &FileRecord) -> Result<(), FilterRejection> {
        // A fresh record carries size 0 until its bytes are verified, so
        // size bounds wait for either a nonzero size or a finalized record
        // (a finalized zero-byte file must still face min_size).
        if record.complete || record.size > 0 {
            if let Some(min) = self.min_size {
                if record.size < min {
                    return Err(FilterRejection::new(
                        record,
                        format!("size {} below minimum {}", record.size, min),
                    ));
                }
            }
            if let Some(max) = self.max_size {
                if record.size > max {
                    return Err(FilterRejection::new(
                        record,
                        format!("size {} above maximum {}", record.size, max),
                    ));
                }
            }
        }
        if let Some(allowed) = &self.extensions {
            if !allowed.iter().any(|e| e == &record.extension) {
                return Err(FilterRejection::new(
                    record,
                    format!("extension {:?} not allowed", record.extension),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size: u64) -> FileRecord {
        let mut r = FileRecord::new(name);
        r.size = size;
        r
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = FileFilter::new();
        assert!(filter.accepts(&record("a.bin", 0)));
        assert!(filter.accepts(&record("b", u64::MAX)));
    }

    #[test]
    fn extension_allow_list() {
        let filter = FileFilter::new().extensions(["PNG", "jpg"]);
        assert!(filter.accepts(&record("photo.png", 10)));
        assert!(filter.accepts(&record("photo.JPG", 10)));
        assert!(!filter.accepts(&record("doc.pdf", 10)));
        assert!(!filter.accepts(&record("noext", 10)));
    }

    #[test]
    fn size_bounds_skip_unsized_records() {
        let filter = FileFilter::new().min_size(100).max_size(1000);
        // Fresh uploads have no size yet and must pass insertion.
        assert!(filter.accepts(&record("a.bin", 0)));
        assert!(!filter.accepts(&record("a.bin", 50)));
        assert!(filter.accepts(&record("a.bin", 500)));
        assert!(!filter.accepts(&record("a.bin", 5000)));
    }

    #[test]
    fn finalized_zero_byte_records_face_size_bounds() {
        let filter = FileFilter::new().min_size(1);
        let mut finalized = record("a.bin", 0);
        finalized.complete = true;
        assert!(!filter.accepts(&finalized));
        // A fresh zero-size record still passes while the size is unknown.
        assert!(filter.accepts(&record("a.bin", 0)));
    }

    #[test]
    fn closure_filters() {
        let only_images = |r: &FileRecord| {
            if r.extension == "png" {
                Ok(())
            } else {
                Err(FilterRejection::new(r, "not an image"))
            }
        };
        assert!(only_images.accepts(&record("x.png", 1)));
        assert!(!only_images.accepts(&record("x.txt", 1)));
    }
}
