//! yt-resolve library
//!
//! Resolves video watch URLs into directly fetchable stream URLs and
//! downloads them.

pub mod core;
pub mod decoder;
pub mod error;
pub mod storage;
pub mod types;
pub mod ui;
pub mod utils;

pub use crate::core::catalog::FormatCatalog;
pub use crate::core::pipeline::{Resolution, Resolver};
pub use crate::error::{Result, YtResolveError};
