//! Physical storage backends.
//!
//! - [`MemoryBackend`] keeps records in a sharded in-process map.
//! - [`FileBackend`] keeps one file per record under a root directory and
//!   also locks each record's lock file, so processes sharing the directory
//!   serialize too.
//!
//! Both take the per-path lock from [`PathLocks`] for every mutation,
//! deletes and purges included.

mod file;
mod file_lock;
mod locks;
mod memory;

pub use file::FileBackend;
pub use locks::PathLocks;
pub use memory::MemoryBackend;
