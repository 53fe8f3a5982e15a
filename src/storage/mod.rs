//! Storage modules: config, player script cache, diagnostic snapshots

pub mod cache;
pub mod config;
pub mod snapshots;
