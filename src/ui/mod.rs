//! Terminal UI: format table and interactive picker

pub mod format_picker;
pub mod format_table;
