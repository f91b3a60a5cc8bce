//! Stowage Storage Library
//!
//! Placement of uploaded files on disk: the [`Storage`] trait, the local filesystem
//! implementation and the background sweeper for the decode directory.
//!
//! # Upload id format
//!
//! Every promoted file lives under `{path}/{year}/{month}/{day}/{hour}/{minute}/{second}/{uuid}/{filename}`.
//! The calendar prefix keeps directory fan-out bounded; the UUID v4 keeps concurrent
//! uploads of the same file name apart. Id generation is centralized in the `keys`
//! module.

pub mod keys;
pub mod local;
pub mod sweeper;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use sweeper::{ScratchSweeper, SweeperHandle};
pub use traits::{Storage, StorageError, StorageResult, StoredFile};
