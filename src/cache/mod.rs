//! Caching of trained artifacts
//!
//! - [`OnceCache`]: generic keyed compute-once map
//! - [`ArtifactCache`]: trained pipeline artifacts keyed by dataset and configuration

mod artifact;
mod once;

pub use artifact::{ArtifactCache, ArtifactKey};
pub use once::{CacheStats, OnceCache};
