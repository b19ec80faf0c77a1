//! # skiff-store
//!
//! Server side of the skiff upload engine.
//!
//! This crate provides:
//! - The [`StorageAdapter`] capability trait with filesystem and
//!   in-memory implementations
//! - The [`RecordStore`] collection trait with an in-memory
//!   implementation
//! - The [`Transform`] byte pipeline invoked on write and read
//! - The [`Store`] orchestrator: create, write/finalize, copy, remove
//! - Replication fan-out to secondary stores behind filter predicates
//! - An in-process [`LocalTransport`] loopback for uploaders

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod collection;
pub mod error;
pub mod local;
pub mod loopback;
pub mod memory;
pub mod store;
pub mod transform;

pub use adapter::{ByteReader, ByteWriter, StorageAdapter};
pub use collection::{MemoryCollection, RecordStore};
pub use error::StoreError;
pub use local::LocalAdapter;
pub use loopback::LocalTransport;
pub use memory::MemoryAdapter;
pub use store::{CopyOutcome, Store, StoreBuilder};
pub use transform::{Passthrough, Transform};

/// Registry type used throughout the server side.
pub type Registry = skiff_core::StoreRegistry<Store>;
