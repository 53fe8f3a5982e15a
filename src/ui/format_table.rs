//! Colored format listing

use colored::Colorize;

use crate::core::catalog::FormatCatalog;
use crate::types::{MediaKind, NParamStatus, ResolvedFormat};

/// One-line description of a format, also used as the picker label
pub fn format_label(format: &ResolvedFormat) -> String {
    let kind = match format.kind {
        MediaKind::Audio => "audio".green(),
        MediaKind::Video => "video".cyan(),
        MediaKind::Unclassified => "other".dimmed(),
    };

    let quality = format
        .quality_label
        .clone()
        .or_else(|| format.audio_quality.clone())
        .or_else(|| format.quality.clone())
        .unwrap_or_default();

    let bitrate = format
        .bitrate
        .map(|b| format!("{}k", b / 1000))
        .unwrap_or_default();

    let mime = format.mime_type.split(';').next().unwrap_or("").trim();

    let mut label = format!(
        "{:>4}  {:<5}  {:<10}  {:<22}  {:>6}  {:>10}",
        format.itag,
        kind,
        mime,
        quality,
        bitrate,
        format.filesize_str
    );

    if format.n_param == NParamStatus::Unresolved {
        label.push_str(&format!("  {}", "(throttled)".yellow()));
    }
    label
}

/// Render the whole catalog as a table
pub fn render_catalog(catalog: &FormatCatalog) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        format!(
            "{:>4}  {:<5}  {:<10}  {:<22}  {:>6}  {:>10}",
            "itag", "kind", "mime", "quality", "rate", "size"
        )
        .bold()
    ));
    for format in &catalog.formats {
        out.push_str(&format_label(format));
        out.push('\n');
    }
    out
}
