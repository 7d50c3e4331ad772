//! Object storage abstraction.
//!
//! This module provides an `ObjectStorage` trait for the container/blob
//! operations a translation run needs, and a local directory-backed
//! implementation.

mod local;
mod types;

pub use local::LocalObjectStorage;
pub use types::*;
