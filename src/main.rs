use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use wxr2md::config::Config;
use wxr2md::content::{sanitize_document, HtmlImageScanner, HttpImageFetcher, MarkdownConverter};
use wxr2md::export::{EmitError, EmitOptions, Emitter, ResolveError};
use wxr2md::feed;

#[derive(Parser, Debug)]
#[command(name = "wxr2md", about = "Convert WordPress exports into Markdown files")]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Directory containing the *.xml exports (overrides config)
    #[arg(long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Download images referenced by item bodies
    #[arg(long)]
    download_images: bool,

    /// Write all items at the top level instead of nesting under parents
    #[arg(long)]
    flat_output: bool,
}

/// `*.xml` files directly inside `dir`, sorted by name.
fn find_exports(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read source directory '{}'", dir.display()))?;

    let mut exports = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "xml") {
            exports.push(path);
        }
    }
    exports.sort();
    Ok(exports)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    if let Some(dir) = args.source_dir {
        config.source_dir = dir;
    }
    if let Some(dir) = args.build_dir {
        config.build_dir = dir;
    }
    config.download_images |= args.download_images;
    config.flat_output |= args.flat_output;

    let substitutions = config.substitutions()?;
    let scanner = HtmlImageScanner;
    let converter = MarkdownConverter::new();
    let fetcher = if config.download_images {
        Some(HttpImageFetcher::new().context("Failed to create HTTP client")?)
    } else {
        None
    };

    let mut emitter = Emitter::new(EmitOptions::from(&config), &converter)?;
    if let Some(fetcher) = &fetcher {
        emitter = emitter.with_fetcher(fetcher);
    }

    let exports = find_exports(&config.source_dir)?;
    for path in &exports {
        println!("reading: {}", path.display());
        let doc = feed::parse(path)
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        let doc = sanitize_document(doc, &substitutions, &scanner);

        match emitter.emit(&doc) {
            Ok(report) => {
                if report.failed > 0 || report.images_failed > 0 {
                    println!(
                        "{}: {} written, {} failed, {} image(s) not downloaded",
                        path.display(),
                        report.written,
                        report.failed,
                        report.images_failed
                    );
                }
            }
            Err(EmitError::Resolve(ResolveError::UnrecognizedItemType { post_type, item, .. })) => {
                eprintln!("Unknown item type :: {}", post_type);
                eprintln!("{:?}", item);
                std::process::exit(1);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to convert '{}'", path.display()));
            }
        }
    }

    let n = exports.len();
    println!("{} book{} converted.", n, if n == 1 { "" } else { "s" });
    Ok(())
}
