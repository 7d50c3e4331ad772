//! Translation service abstraction.
//!
//! This module provides a `TranslationBackend` trait for submitting batch
//! document translation jobs and checking on them, the JSON wire types the
//! service expects, and an HTTP implementation.

mod http;
mod types;

pub use http::HttpTranslator;
pub use types::*;
