//! Token cache storage engine with Swift and Kotlin bindings.
//!
//! This crate re-exports [`tokencache_core`] with its `ffi` feature enabled
//! and carries the `UniFFI` scaffolding, so it is the library bindings are
//! generated from.

pub use tokencache_core::*;

tokencache_core::uniffi_reexport_scaffolding!();
