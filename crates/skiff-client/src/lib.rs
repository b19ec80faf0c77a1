//! # skiff-client
//!
//! Client side of the skiff upload engine.
//!
//! This crate provides:
//! - The [`Uploader`] state machine driving one resumable upload
//!   session: strict sequential chunking, retry with a fixed delay,
//!   stop/resume, abort with record cleanup
//! - Throughput-adaptive chunk sizing via [`ChunkSizer`]
//! - Lifecycle callbacks plus a watch-based progress subscription

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunking;
pub mod uploader;

pub use chunking::ChunkSizer;
pub use uploader::{UploadError, UploadState, Uploader, UploaderConfig};
