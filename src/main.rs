//! trackstream command line
//!
//! Inspects and produces framed tree streams:
//!
//! ```text
//! trackstream decode run.bin            # dotted.key: value lines
//! trackstream decode --grouped run.bin  # one JSON object per top-level key
//! trackstream encode doc.json > run.bin
//! ```
//!
//! Input defaults to stdin when no file is given. Logs go to stderr so they
//! never mix with stream output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use trackstream::{
    config::StreamConfig,
    encoding::{Decoder, Tree, TreeEncoder},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "trackstream", version, about = "Framed tree streams for experiment tracking data")]
struct Cli {
    /// Config file (TOML, or JSON by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tracing filter, overrides the config and RUST_LOG
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the contents of a binary stream
    Decode {
        /// Stream file, stdin when omitted
        #[arg()]
        file: Option<PathBuf>,

        /// Emit a single JSON object keyed by dotted path
        #[arg(long, conflicts_with = "grouped")]
        json: bool,

        /// Emit one JSON object per top-level key as it completes
        #[arg(long)]
        grouped: bool,
    },
    /// Encode a JSON document as a binary stream on stdout
    Encode {
        /// JSON file, stdin when omitted
        #[arg()]
        file: Option<PathBuf>,
    },
}

/// `--log-filter` wins, then `RUST_LOG`, then the configured filter.
fn init_logging(flag: Option<&str>, configured: &str) {
    let env_filter = match flag {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn Read>> {
    match file {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn decode(file: Option<&Path>, json: bool, grouped: bool) -> Result<()> {
    let mut decoder = Decoder::new(open_input(file)?);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut objects = 0u64;

    if json {
        let table = decoder.decode().context("decoding stream")?.table;
        let doc: serde_json::Map<String, serde_json::Value> =
            table.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        serde_json::to_writer_pretty(&mut out, &doc)?;
        writeln!(out)?;
        out.flush()?;
        return Ok(());
    }

    while let Some((root, table)) = decoder.next_object().context("decoding stream")? {
        objects += 1;
        if grouped {
            let body: serde_json::Map<String, serde_json::Value> =
                table.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
            let mut line = serde_json::Map::new();
            line.insert(root, serde_json::Value::Object(body));
            serde_json::to_writer(&mut out, &line)?;
            writeln!(out)?;
        } else {
            for (key, value) in &table {
                writeln!(out, "{}: {}", key, value)?;
            }
        }
    }

    out.flush()?;
    tracing::debug!("Decoded {} top-level objects", objects);
    Ok(())
}

fn encode(file: Option<&Path>) -> Result<()> {
    let input = open_input(file)?;
    let doc: serde_json::Value =
        serde_json::from_reader(io::BufReader::new(input)).context("parsing JSON input")?;

    let stdout = io::stdout();
    let mut encoder = TreeEncoder::new(BufWriter::new(stdout.lock()));
    encoder.encode(&Tree::from(doc))?;
    encoder.flush()?;
    tracing::debug!(
        "Encoded {} frames ({} bytes)",
        encoder.frames_written(),
        encoder.bytes_written()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = match StreamConfig::try_load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (StreamConfig::default(), Some(e)),
    };
    init_logging(cli.log_filter.as_deref(), &config.logging.filter);
    if let Some(e) = load_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    let result = match &cli.command {
        Commands::Decode { file, json, grouped } => decode(file.as_deref(), *json, *grouped),
        Commands::Encode { file } => encode(file.as_deref()),
    };

    match result {
        Err(e) if is_broken_pipe(&e) => Ok(()),
        other => other,
    }
}

/// A closed downstream pipe (`trackstream decode | head`) ends output quietly.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
