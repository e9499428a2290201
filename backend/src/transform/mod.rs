//! Transformation module.
//!
//! This module turns raw tables into artifacts:
//! - Normalize: Header sanitization, cell typing, empty row/column pruning
//! - Synthesize: Field metadata and quality metrics
//! - Pipeline: Stage orchestration and the background ingest worker

pub mod normalize;
pub mod pipeline;
pub mod synthesize;

pub use normalize::{coerce_cell, normalize, sanitize_header, sanitize_headers};
pub use pipeline::{ingest_file, IngestEvent, IngestJob, IngestWorker, Stage};
pub use synthesize::{synthesize, Synthesis};
