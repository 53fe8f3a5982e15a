//! Core pipeline: transport, extraction, cipher resolution and download

pub mod catalog;
pub mod cipher;
pub mod downloader;
pub mod harvester;
pub mod innertube;
pub mod pipeline;
pub mod player_script;
pub mod transport;
