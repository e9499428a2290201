//! Ingest pipeline: detect, parse, normalize, synthesize, build.
//!
//! [`ingest_file`] runs the stages synchronously and reports progress through
//! a callback. [`IngestWorker`] runs it on tokio's blocking pool, one ingest
//! at a time in submission order, publishing every event and the finished
//! artifact.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetapi::transform::pipeline::ingest_file;
//! use sheetapi::IngestOptions;
//! use std::path::Path;
//!
//! let artifact = ingest_file(Path::new("people.csv"), &IngestOptions::default(), &mut |_| {})?;
//! println!("{} records", artifact.data.len());
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::api::events::EVENTS;
use crate::artifact::build_artifact;
use crate::config::IngestOptions;
use crate::error::{IngestError, IngestErrorKind, IngestResult};
use crate::models::{Artifact, Dataset};
use crate::parser::{detect_format, format_delimiter, parse_rows, DetectedFormat, Layout};
use crate::store::ArtifactStore;
use crate::transform::normalize::normalize;
use crate::transform::synthesize::synthesize;

/// Rows shown in the preview event.
pub const PREVIEW_ROWS: usize = 10;

// =============================================================================
// Events
// =============================================================================

/// What one stage of an ingest reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    Progress { percent: u8 },
    Status { message: String },
    /// First rows of the normalized dataset, stringified.
    Preview {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Finished { records: usize, fields: usize },
    Failed { kind: IngestErrorKind, message: String },
}

impl Stage {
    fn status(message: impl Into<String>) -> Self {
        Stage::Status {
            message: message.into(),
        }
    }
}

/// A [`Stage`] tagged with the ingest it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestEvent {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub stage: Stage,
}

// =============================================================================
// Orchestration
// =============================================================================

/// Run every stage on `path`. Progress goes to `on_stage`; the terminal
/// outcome is the return value.
pub fn ingest_file(
    path: &Path,
    options: &IngestOptions,
    on_stage: &mut dyn FnMut(Stage),
) -> IngestResult<Artifact> {
    on_stage(Stage::status("Starting file processing..."));
    on_stage(Stage::Progress { percent: 5 });

    on_stage(Stage::status("Analyzing file structure..."));
    let detected = detect_format(path)?;
    tracing::debug!(path = %path.display(), format = %detected.describe(), "format detected");
    on_stage(Stage::status(loaded_message(&detected)));
    let table = parse_rows(&detected)?;
    tracing::debug!(path = %path.display(), table = %table, "rows parsed");
    on_stage(Stage::Progress { percent: 30 });

    on_stage(Stage::status("Cleaning data..."));
    let dataset = normalize(&table);
    on_stage(Stage::status(format!(
        "Data cleaned: {} rows, {} columns",
        dataset.row_count(),
        dataset.column_count()
    )));
    on_stage(Stage::Progress { percent: 60 });

    on_stage(preview(&dataset));
    on_stage(Stage::Progress { percent: 80 });

    on_stage(Stage::status("Generating JSON API..."));
    let artifact = build_artifact(&dataset, synthesize(&dataset), path, options);
    on_stage(Stage::Progress { percent: 100 });
    on_stage(Stage::status("Processing completed successfully!"));

    Ok(artifact)
}

fn loaded_message(detected: &DetectedFormat) -> String {
    match detected {
        DetectedFormat::Text { format, .. } => match &format.layout {
            Layout::Delimited(d) => format!(
                "CSV loaded with {} encoding and '{}' delimiter",
                format.encoding,
                format_delimiter(*d)
            ),
            Layout::FixedWidth(spans) => format!(
                "Fixed-width file loaded with {} encoding and {} columns",
                format.encoding,
                spans.len()
            ),
        },
        DetectedFormat::Sheet(selection) => format!("Using sheet: {}", selection.sheet),
    }
}

/// Preview stage over the first [`PREVIEW_ROWS`] rows.
pub fn preview(dataset: &Dataset) -> Stage {
    Stage::Preview {
        headers: dataset.columns.clone(),
        rows: dataset
            .rows
            .iter()
            .take(PREVIEW_ROWS)
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect(),
    }
}

// =============================================================================
// Background worker
// =============================================================================

/// Handle on one scheduled ingest.
#[derive(Debug)]
pub struct IngestJob {
    pub id: Uuid,
    /// Every stage of this ingest, in order.
    pub progress: mpsc::UnboundedReceiver<Stage>,
    /// Terminal outcome. On success the artifact is already published.
    pub outcome: oneshot::Receiver<IngestResult<Arc<Artifact>>>,
}

/// Runs ingests in the background, one at a time in submission order, and
/// publishes each finished artifact to the store.
#[derive(Debug, Clone)]
pub struct IngestWorker {
    queue: mpsc::UnboundedSender<QueuedIngest>,
}

#[derive(Debug)]
struct QueuedIngest {
    id: Uuid,
    path: PathBuf,
    options: IngestOptions,
    progress: mpsc::UnboundedSender<Stage>,
    outcome: oneshot::Sender<IngestResult<Arc<Artifact>>>,
}

impl IngestWorker {
    /// Start the worker task. Must be called inside a Tokio runtime.
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        let (queue, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(store, jobs));
        Self { queue }
    }

    /// Schedule an ingest of `path`. Returns immediately; the job waits for
    /// every ingest submitted before it.
    pub fn spawn(&self, path: PathBuf, options: IngestOptions) -> IngestJob {
        let id = Uuid::new_v4();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let job = QueuedIngest {
            id,
            path,
            options,
            progress: progress_tx,
            outcome: outcome_tx,
        };
        if let Err(mpsc::error::SendError(job)) = self.queue.send(job) {
            let err = IngestError::Internal("Ingest worker is not running".into());
            report_failure(job.id, &job.progress, &err);
            let _ = job.outcome.send(Err(err));
        }

        IngestJob {
            id,
            progress: progress_rx,
            outcome: outcome_rx,
        }
    }
}

async fn run_queue(store: Arc<ArtifactStore>, mut jobs: mpsc::UnboundedReceiver<QueuedIngest>) {
    while let Some(job) = jobs.recv().await {
        run_job(&store, job, ingest_file).await;
    }
    tracing::debug!("ingest queue closed");
}

async fn run_job<F>(store: &Arc<ArtifactStore>, job: QueuedIngest, work: F)
where
    F: FnOnce(&Path, &IngestOptions, &mut dyn FnMut(Stage)) -> IngestResult<Artifact>
        + Send
        + 'static,
{
    let QueuedIngest {
        id,
        path,
        options,
        progress,
        outcome,
    } = job;
    tracing::info!(job_id = %id, path = %path.display(), "ingest started");

    let store = Arc::clone(store);
    let progress_tx = progress.clone();
    let run = tokio::task::spawn_blocking(move || {
        let mut emit = |stage: Stage| {
            EVENTS.publish(IngestEvent { job_id: id, stage: stage.clone() });
            // The job handle may have been dropped.
            let _ = progress_tx.send(stage);
        };

        match work(&path, &options, &mut emit) {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                store.publish(Arc::clone(&artifact));
                emit(Stage::Finished {
                    records: artifact.data.len(),
                    fields: artifact.metadata.total_fields,
                });
                Ok(artifact)
            }
            Err(err) => {
                emit(failed(&err));
                Err(err)
            }
        }
    })
    .await;

    let result = run.unwrap_or_else(|e| {
        tracing::error!(job_id = %id, error = %e, "ingest task panicked");
        let err = IngestError::Internal(format!("Ingest task failed: {}", e));
        report_failure(id, &progress, &err);
        Err(err)
    });
    let _ = outcome.send(result);
}

fn failed(err: &IngestError) -> Stage {
    Stage::Failed {
        kind: err.kind(),
        message: format!("Error processing file: {}", err),
    }
}

fn report_failure(job_id: Uuid, progress: &mpsc::UnboundedSender<Stage>, err: &IngestError) {
    let stage = failed(err);
    EVENTS.publish(IngestEvent { job_id, stage: stage.clone() });
    let _ = progress.send(stage);
}
