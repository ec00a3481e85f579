use anyhow::{Context, Result};
use clap::Parser;
use feedpost::config::Config;
use feedpost::feed::{self, Feed, FeedSource, HttpTransport, Query};
use std::io::Write;
use std::path::PathBuf;

/// Largest local feed file accepted by `--input` (10 MB).
const MAX_INPUT_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    name = "feedpost",
    version,
    about = "Fetch RSS/RDF feeds and print normalized entries as JSON"
)]
struct Args {
    /// Config file (defaults to ~/.config/feedpost/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Take thumbnails from media elements only, never from item bodies
    #[arg(long)]
    no_thumbnails: bool,

    /// Process a local feed file instead of fetching
    #[arg(long, value_name = "FILE", conflicts_with = "urls")]
    input: Option<PathBuf>,

    /// Feed URLs, or pages that link to a feed
    #[arg(value_name = "URL", required_unless_present = "input")]
    urls: Vec<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display())),
        None => match Config::default_path() {
            Some(path) => Config::load(&path)
                .with_context(|| format!("Failed to load config file '{}'", path.display())),
            None => {
                tracing::debug!("HOME not set, using default configuration");
                Ok(Config::default())
            }
        },
    }
}

fn read_input(path: &PathBuf) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve input file: {}", path.display()))?;

    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        anyhow::bail!("Input path must be a regular file");
    }
    if metadata.len() > MAX_INPUT_SIZE {
        anyhow::bail!(
            "Input file is {} bytes (max {} bytes)",
            metadata.len(),
            MAX_INPUT_SIZE
        );
    }

    let bytes = std::fs::read(&canonical)
        .with_context(|| format!("Failed to read input file: {}", canonical.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("Failed to write JSON output")?;
    writeln!(out)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let source = FeedSource::new(transport)
        .disable_thumbnails(args.no_thumbnails || config.disable_thumbnail_extraction);

    if let Some(input) = &args.input {
        let text = read_input(input)?;
        let feed = source
            .process(&text, &Query::default())
            .with_context(|| format!("Failed to extract entries from '{}'", input.display()))?;
        return print_json(&feed);
    }

    let queries: Vec<Query> = args.urls.iter().map(Query::for_url).collect();
    match queries.as_slice() {
        [query] => {
            let feed: Feed = source
                .find(query)
                .await
                .with_context(|| format!("Failed to fetch feed '{}'", args.urls[0]))?;
            print_json(&feed)
        }
        _ => {
            let feeds = feed::find_many(&source, &queries)
                .await
                .context("Failed to fetch feeds")?;
            print_json(&feeds)
        }
    }
}
