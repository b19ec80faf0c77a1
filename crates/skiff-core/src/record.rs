//! Persisted file record model.
//!
//! A [`FileRecord`] describes one logical file owned by a named store. The
//! serialized field names form the durable contract other tooling reads
//! (`name, extension, size, store, complete, uploading, progress, token,
//! uploadedAt, url, userId, originalStore, originalId, versions`), so the
//! serde casing here must never change silently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-storage-target state of one record.
///
/// `versions` keys are fixed at creation time to the full set of storage
/// targets configured on the owning store and never shrink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
    /// A write stream to this target is currently open.
    pub processing: bool,
    /// The target holds the verified bytes of this file.
    pub stored: bool,
}

/// Metadata for one logical file, identified by an opaque id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Opaque record id, assigned at insertion.
    #[serde(rename = "_id")]
    pub id: String,
    /// Original file name.
    pub name: String,
    /// Lower-cased suffix of `name`, empty when the name has no dot.
    pub extension: String,
    /// Verified byte count; known only after upload completes.
    pub size: u64,
    /// Name of the owning store. Immutable after creation.
    pub store: String,
    /// Upload finished and the size was verified by a read-back pass.
    pub complete: bool,
    /// An upload session currently owns this record.
    pub uploading: bool,
    /// Upload progress in `0.0..=1.0`.
    pub progress: f64,
    /// Opaque access token, regenerated at each finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Completion timestamp, milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<u64>,
    /// Derived serving URL, set at completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Owning user, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Name of the store this record was replicated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_store: Option<String>,
    /// Id of the source record this record was replicated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// One entry per storage target configured on the owning store.
    pub versions: BTreeMap<String, VersionState>,
}

impl FileRecord {
    /// Create a record for a fresh upload. The store name, extension and
    /// `versions` map are filled in by the owning store at insertion.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: String::new(),
            extension: extension_of(&name),
            name,
            size: 0,
            store: String::new(),
            complete: false,
            uploading: true,
            progress: 0.0,
            token: None,
            uploaded_at: None,
            url: None,
            user_id: None,
            original_store: None,
            original_id: None,
            versions: BTreeMap::new(),
        }
    }

    /// Set the owning user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Prepare a replication copy of this record for a target store.
    ///
    /// The copy drops the id and url, records the source lineage, and
    /// starts over as an in-progress upload on the target.
    #[must_use]
    pub fn replica_for(&self, target_store: &str) -> FileRecord {
        let mut copy = self.clone();
        copy.id = String::new();
        copy.url = None;
        copy.original_store = Some(self.store.clone());
        copy.original_id = Some(self.id.clone());
        copy.store = target_store.to_string();
        copy.complete = false;
        copy.uploading = true;
        copy.progress = 0.0;
        copy.token = None;
        copy.uploaded_at = None;
        copy.versions = BTreeMap::new();
        copy
    }
}

/// Partial field set applied atomically to a persisted record.
///
/// Finalize must update exactly its seven fields and leave everything
/// else (notably `versions`) untouched, so updates are expressed as an
/// explicit set of changed fields rather than a record replace.
#[derive(Debug, Clone, Default)]
pub struct FileRecordUpdate {
    /// New `complete` flag.
    pub complete: Option<bool>,
    /// New `uploading` flag.
    pub uploading: Option<bool>,
    /// New progress fraction.
    pub progress: Option<f64>,
    /// New verified size.
    pub size: Option<u64>,
    /// New access token.
    pub token: Option<String>,
    /// New completion timestamp.
    pub uploaded_at: Option<u64>,
    /// New serving URL.
    pub url: Option<String>,
    /// Per-target version states to overwrite.
    pub versions: Vec<(String, VersionState)>,
}

impl FileRecordUpdate {
    /// Empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update only the `uploading` flag (resume and stop paths).
    #[must_use]
    pub fn uploading(value: bool) -> Self {
        Self {
            uploading: Some(value),
            ..Self::default()
        }
    }

    /// Update a single storage target's version state.
    #[must_use]
    pub fn version(target: impl Into<String>, state: VersionState) -> Self {
        Self {
            versions: vec![(target.into(), state)],
            ..Self::default()
        }
    }

    /// The finalize update: the seven fields of a completed upload.
    #[must_use]
    pub fn finalize(size: u64, token: String, url: Option<String>) -> Self {
        Self {
            complete: Some(true),
            uploading: Some(false),
            progress: Some(1.0),
            size: Some(size),
            token: Some(token),
            uploaded_at: Some(now_millis()),
            url,
            versions: Vec::new(),
        }
    }

    /// Apply this update to a record in place.
    pub fn apply(&self, record: &mut FileRecord) {
        if let Some(complete) = self.complete {
            record.complete = complete;
        }
        if let Some(uploading) = self.uploading {
            record.uploading = uploading;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(size) = self.size {
            record.size = size;
        }
        if let Some(token) = &self.token {
            record.token = Some(token.clone());
        }
        if let Some(uploaded_at) = self.uploaded_at {
            record.uploaded_at = Some(uploaded_at);
        }
        if let Some(url) = &self.url {
            record.url = Some(url.clone());
        }
        for (target, state) in &self.versions {
            record.versions.insert(target.clone(), *state);
        }
    }
}

/// Generate a fresh opaque record id (32 hex chars).
///
/// # Panics
///
/// Panics if the system CSPRNG fails (extremely unlikely).
#[must_use]
pub fn new_record_id() -> String {
    random_hex(16)
}

/// Generate a fresh opaque access token (32 hex chars).
///
/// # Panics
///
/// Panics if the system CSPRNG fails (extremely unlikely).
#[must_use]
pub fn generate_token() -> String {
    random_hex(16)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf).expect("system CSPRNG unavailable");
    hex::encode(buf)
}

/// Lower-cased extension of a file name, empty when there is no dot.
#[must_use]
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((prefix, ext)) if !prefix.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Derive the serving URL for a record: `<base>/<store>/<id>/<name>`.
#[must_use]
pub fn derive_url(base_url: &str, store: &str, id: &str, name: &str) -> String {
    format!("{}/{}/{}/{}", base_url.trim_end_matches('/'), store, id, name)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let record = FileRecord::new("photo.JPG");
        assert_eq!(record.extension, "jpg");
        assert!(!record.complete);
        assert!(record.uploading);
        assert_eq!(record.progress, 0.0);
        assert_eq!(record.size, 0);
        assert!(record.versions.is_empty());
    }

    #[test]
    fn extension_edge_cases() {
        assert_eq!(extension_of("archive.tar.GZ"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(".bashrc"), "");
    }

    #[test]
    fn ids_and_tokens_are_unique_hex() {
        let a = new_record_id();
        let b = new_record_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn finalize_update_touches_only_its_fields() {
        let mut record = FileRecord::new("data.bin");
        record.versions.insert("primary".into(), VersionState::default());
        record.user_id = Some("u1".into());

        let update = FileRecordUpdate::finalize(1234, "tok".into(), Some("http://x/f".into()));
        update.apply(&mut record);

        assert!(record.complete);
        assert!(!record.uploading);
        assert_eq!(record.progress, 1.0);
        assert_eq!(record.size, 1234);
        assert_eq!(record.token.as_deref(), Some("tok"));
        assert!(record.uploaded_at.is_some());
        // Untouched fields survive.
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.versions.len(), 1);
        assert!(!record.versions["primary"].stored);
    }

    #[test]
    fn version_update_overwrites_single_target() {
        let mut record = FileRecord::new("data.bin");
        record.versions.insert("a".into(), VersionState::default());
        record.versions.insert("b".into(), VersionState::default());

        let stored = VersionState {
            processing: false,
            stored: true,
        };
        FileRecordUpdate::version("a", stored).apply(&mut record);

        assert!(record.versions["a"].stored);
        assert!(!record.versions["b"].stored);
    }

    #[test]
    fn replica_strips_identity_and_records_lineage() {
        let mut source = FileRecord::new("img.png");
        source.id = "abc".into();
        source.store = "primary".into();
        source.complete = true;
        source.size = 99;
        source.url = Some("http://x/primary/abc/img.png".into());

        let copy = source.replica_for("backup");
        assert!(copy.id.is_empty());
        assert!(copy.url.is_none());
        assert_eq!(copy.original_store.as_deref(), Some("primary"));
        assert_eq!(copy.original_id.as_deref(), Some("abc"));
        assert_eq!(copy.store, "backup");
        assert!(!copy.complete);
        assert_eq!(copy.size, 99);
    }

    #[test]
    fn serialized_contract_field_names() {
        let mut record = FileRecord::new("a.txt");
        record.id = "id1".into();
        record.uploaded_at = Some(5);
        record.original_store = Some("p".into());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("uploadedAt").is_some());
        assert!(json.get("originalStore").is_some());
        assert!(json.get("_id").is_some());
        assert!(json.get("versions").is_some());
    }
}
