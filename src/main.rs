//! yt-resolve - resolve and download video streams from the terminal

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use yt_resolve::core::downloader::{progress_bar, update_progress_bar};
use yt_resolve::core::pipeline::{Resolution, Resolver, default_file_name};
use yt_resolve::storage::config;
use yt_resolve::types::{Config, ResolvedFormat};
use yt_resolve::ui::{format_picker, format_table};

/// Resolve a video URL into playable streams and download one.
#[derive(Parser, Debug)]
#[command(name = "yt-resolve")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Watch URL, short link or video id
    url: String,

    /// List available formats and exit
    #[arg(short = 'F', long)]
    list_formats: bool,

    /// Download the format with this itag
    #[arg(short = 'f', long)]
    itag: Option<u32>,

    /// Prefer the best audio-only format
    #[arg(short, long)]
    audio_only: bool,

    /// Download directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Output file (overrides --dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pick the format interactively
    #[arg(short, long)]
    interactive: bool,

    /// Decoder program speaking JSON over stdin/stdout
    #[arg(long)]
    decoder_cmd: Option<String>,

    /// Argument for the decoder program (repeatable)
    #[arg(long = "decoder-arg")]
    decoder_args: Vec<String>,

    /// Base URL of a remote decode service
    #[arg(long)]
    decoder_url: Option<String>,

    /// Write diagnostic snapshots under this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Do not read or write the player script cache
    #[arg(long)]
    no_cache: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// CLI flags take precedence over the config file
fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.dir {
        cfg.download_dir = dir.to_string_lossy().to_string();
    }
    if let Some(cmd) = &cli.decoder_cmd {
        cfg.decoder.command = Some(cmd.clone());
    }
    if !cli.decoder_args.is_empty() {
        cfg.decoder.args = cli.decoder_args.clone();
    }
    if let Some(url) = &cli.decoder_url {
        cfg.decoder.url = Some(url.clone());
    }
    if let Some(dir) = &cli.snapshot_dir {
        cfg.snapshot_dir = Some(dir.to_string_lossy().to_string());
    }
    if cli.no_cache {
        cfg.cache_player_scripts = false;
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "yt_resolve=debug"
    } else {
        "yt_resolve=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Format chosen by flags: explicit itag, interactive, or best default
fn choose_format(cli: &Cli, resolution: &Resolution) -> anyhow::Result<Option<ResolvedFormat>> {
    let catalog = &resolution.catalog;

    if let Some(itag) = cli.itag {
        return Ok(Some(catalog.require_itag(itag)?.clone()));
    }

    let preferred = if cli.audio_only {
        catalog.best_audio()
    } else {
        catalog.best_muxed().or_else(|| catalog.best_audio())
    };

    if cli.interactive {
        return Ok(format_picker::pick_format(catalog, preferred.map(|f| f.itag)));
    }

    Ok(preferred.cloned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load config
    let mut cfg = config::load_config().await?;
    apply_overrides(&mut cfg, &cli);
    if cli.save_config {
        config::save_config(&cfg).await?;
        println!("{}", "Settings saved.".green());
    }

    let mut resolver = Resolver::new(cfg.clone())?;

    println!("{}", "Resolving...".dimmed());
    let resolution = resolver.resolve(&cli.url).await?;

    if let Some(title) = resolution.title() {
        println!("{} {}", "Title:".green(), title);
    }

    if resolution.catalog.is_empty() {
        bail!("No playable formats (is a decoder configured?)");
    }

    if cli.list_formats {
        print!("{}", format_table::render_catalog(&resolution.catalog));
        return Ok(());
    }

    let Some(format) = choose_format(&cli, &resolution)? else {
        println!("{}", "Nothing selected.".yellow());
        return Ok(());
    };

    let dest = match &cli.output {
        Some(path) => path.clone(),
        None => PathBuf::from(&cfg.download_dir)
            .join(default_file_name(&resolution.video_id, &format)),
    };
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Ctrl-C stops the download at the next chunk
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let bar = progress_bar(&format!("itag {}", format.itag));
    let report = resolver
        .download(&format, &dest, Some(cancel.as_ref()), |p| update_progress_bar(&bar, p))
        .await;
    bar.finish_and_clear();

    match report {
        Ok(report) => {
            println!(
                "{} {} ({})",
                "✓ Saved".green(),
                report.path.display(),
                format.filesize_str
            );
            Ok(())
        }
        Err(e) => Err(e).context(format!("Download of itag {} failed", format.itag)),
    }
}
