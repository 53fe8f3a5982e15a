//! Utilities: paths and video id handling

pub mod paths;
pub mod video_id;
