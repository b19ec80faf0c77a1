//! # skiff-core
//!
//! Shared data model for the skiff upload and replication engine.
//!
//! This crate provides:
//! - The persisted [`FileRecord`] model with per-store version states
//! - Partial record updates applied atomically by record collections
//! - The [`Filter`] predicate trait gating insertion and replication
//! - A name-to-store registry passed explicitly to collaborators
//! - The numeric error-code model shared by transports and stores
//! - The [`UploadTransport`] RPC seam between uploaders and stores

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod record;
pub mod registry;
pub mod transport;

pub use error::{ErrorCode, CODE_BAD_REQUEST, CODE_NOT_FOUND};
pub use filter::{FileFilter, Filter, FilterRejection};
pub use record::{FileRecord, FileRecordUpdate, VersionState};
pub use registry::StoreRegistry;
pub use transport::{TransportError, UploadTransport};
