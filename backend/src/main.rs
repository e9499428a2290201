//! sheetapi CLI - Turn tabular files into typed JSON APIs
//!
//! # Commands
//!
//! ```bash
//! sheetapi serve --file people.csv      # Ingest in the background and serve on 127.0.0.1:5000
//! sheetapi serve --artifact people.json # Serve a saved artifact
//! sheetapi ingest people.csv -o out.json # Write the artifact JSON
//! sheetapi inspect people.csv           # Show detected encoding, layout and columns
//! ```
//!
//! Every option also reads a `SHEETAPI_*` environment variable; a `.env`
//! file in the working directory is loaded first.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use sheetapi::api::EVENTS;
use sheetapi::logging::{init_logging, LogConfig, LogFormat};
use sheetapi::server::{start_server, AppState};
use sheetapi::{
    detect_format, ingest_file, parse_rows, ArtifactStore, DetectedFormat, IngestEvent,
    IngestOptions, QueryEngine, ServerConfig,
};

#[derive(Parser)]
#[command(name = "sheetapi", version)]
#[command(about = "Turn CSV and spreadsheet files into typed JSON APIs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "SHEETAPI_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct PreviewArgs {
    /// Publish at most --preview-limit records
    #[arg(long, env = "SHEETAPI_PREVIEW_ONLY")]
    preview_only: bool,

    /// Record cap used with --preview-only (10..=10000)
    #[arg(long, default_value_t = sheetapi::config::DEFAULT_PREVIEW_LIMIT, value_parser = parse_preview_limit, env = "SHEETAPI_PREVIEW_LIMIT")]
    preview_limit: usize,
}

impl From<PreviewArgs> for IngestOptions {
    fn from(args: PreviewArgs) -> Self {
        IngestOptions {
            preview_only: args.preview_only,
            preview_limit: args.preview_limit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP query API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1", env = "SHEETAPI_HOST")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, default_value_t = sheetapi::config::DEFAULT_PORT, env = "SHEETAPI_PORT")]
        port: u16,

        /// File to ingest in the background at startup
        #[arg(short, long, env = "SHEETAPI_FILE")]
        file: Option<PathBuf>,

        /// Saved artifact to serve until an ingest replaces it
        #[arg(short, long, env = "SHEETAPI_ARTIFACT")]
        artifact: Option<PathBuf>,

        #[command(flatten)]
        preview: PreviewArgs,
    },

    /// Run the ingest pipeline and write the artifact JSON
    Ingest {
        /// Input file (.csv, .tsv, .txt, .dat, .xlsx, .xls, .ods)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        preview: PreviewArgs,
    },

    /// Show how a file would be read
    Inspect {
        /// Input file
        input: PathBuf,
    },
}

fn parse_preview_limit(s: &str) -> Result<usize, String> {
    let limit: usize = s.parse().map_err(|e| format!("{}", e))?;
    IngestOptions::preview(limit).validate()?;
    Ok(limit)
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Could not initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            file,
            artifact,
            preview,
        } => {
            cmd_serve(
                ServerConfig { host, port },
                file,
                artifact.as_deref(),
                preview.into(),
            )
            .await
        }

        Commands::Ingest {
            input,
            output,
            preview,
        } => cmd_ingest(&input, output.as_deref(), &preview.into()),

        Commands::Inspect { input } => cmd_inspect(&input),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(
    config: ServerConfig,
    file: Option<PathBuf>,
    artifact: Option<&Path>,
    options: IngestOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(ArtifactStore::new());
    if let Some(path) = artifact {
        store.load_file(path)?;
    }

    let state = AppState::new(QueryEngine::new(store));
    if let Some(path) = file {
        let job = state.worker.spawn(path.clone(), options);
        tracing::info!(job_id = %job.id, path = %path.display(), "startup ingest scheduled");
    }

    start_server(&config, state).await?;
    Ok(())
}

fn cmd_ingest(
    input: &Path,
    output: Option<&Path>,
    options: &IngestOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let job_id = Uuid::new_v4();
    let artifact = ingest_file(input, options, &mut |stage| {
        EVENTS.publish(IngestEvent { job_id, stage })
    })?;

    match output {
        Some(path) => {
            artifact.save(path)?;
            tracing::info!(
                path = %path.display(),
                records = artifact.data.len(),
                "artifact written"
            );
        }
        None => println!("{}", artifact.to_json_pretty()?),
    }

    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let detected = detect_format(input)?;
    let table = parse_rows(&detected)?;

    println!("File:     {}", input.display());
    match &detected {
        DetectedFormat::Text { format, .. } => {
            println!("Encoding: {}", format.encoding);
            println!("Layout:   {}", format.layout);
        }
        DetectedFormat::Sheet(selection) => {
            println!("Sheet:    {}", selection.sheet);
            println!("Reader:   {}", selection.reader);
        }
    }
    println!("Rows:     {}", table.rows.len());
    println!("Columns:  {}", table.headers.len());
    for (i, header) in table.headers.iter().enumerate() {
        println!("  [{:2}] {}", i + 1, header);
    }

    Ok(())
}
