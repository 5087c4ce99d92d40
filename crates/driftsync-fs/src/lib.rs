//! Filesystem layer for driftsync
//!
//! Provides the two primitives everything above it is built on:
//!
//! - **Content identity**: canonical `sha256:<hex>` digests for file
//!   contents and whole directory trees ([`checksum`]).
//! - **Safe mutation**: atomic write-to-temp-then-rename with advisory
//!   locking, and a scoped read-modify-write transaction helper ([`io`]).
//!
//! This crate knows nothing about sync semantics; it only guarantees that
//! identical content always hashes identically and that no reader can ever
//! observe a partially written file.

pub mod checksum;
pub mod error;
pub mod io;

pub use checksum::{
    DirectoryHashJob, HashProgress, hash_content, hash_directory, hash_file, spawn_directory_hash,
};
pub use error::{Error, Result};
pub use io::{copy_file_atomic, locked_update, remove_path, write_atomic};
