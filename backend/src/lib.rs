//! # sheetapi - Tabular files to typed JSON APIs
//!
//! sheetapi ingests CSV, delimited text, fixed-width text and spreadsheet
//! files, infers a typed schema, and serves the records through a read-only
//! HTTP query API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    File     │────▶│   Parser    │────▶│  Normalize  │────▶│  Synthesize │────▶│  Artifact   │
//! │ (CSV/XLSX)  │     │ (auto-enc)  │     │  (typing)   │     │ (metadata)  │     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                                        │
//!                                                              ┌─────────────┐     ┌─────▼───────┐
//!                                                              │  HTTP API   │◀────│    Store    │
//!                                                              └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetapi::{ingest_file, IngestOptions};
//! use std::path::Path;
//!
//! let artifact = ingest_file(Path::new("people.csv"), &IngestOptions::default(), &mut |_| {})?;
//! artifact.save(Path::new("people.json"))?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Typed values, datasets and the artifact
//! - [`parser`] - Format detection and row parsing
//! - [`transform`] - Normalization, synthesis and the ingest pipeline
//! - [`artifact`] - Artifact assembly and persistence
//! - [`validation`] - Artifact JSON Schema validation
//! - [`store`] - Current artifact holder
//! - [`query`] - Query operations
//! - [`api`] - HTTP API server
//! - [`config`] - Ingest and server options
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Artifact
pub mod artifact;
pub mod validation;

// Serving
pub mod query;
pub mod store;

// HTTP API
pub mod api;

pub mod logging;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ArtifactError, IngestError, IngestErrorKind, ParseError, QueryError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ApiInfo, Artifact, ArtifactMetadata, DataQuality, Dataset, Endpoints, FieldInfo, FieldType,
    Record, TypedValue,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{IngestOptions, ServerConfig};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{detect_format, parse_rows, DetectedFormat, Layout, RawTable, TextEncoding};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{ingest_file, IngestEvent, IngestJob, IngestWorker, Stage};

// =============================================================================
// Re-exports - Serving
// =============================================================================

pub use query::QueryEngine;
pub use store::ArtifactStore;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
