//! Uploader Core Library
//!
//! This library provides the batch pipeline behind the uploader tool, which
//! takes a manifest of named asset links, posts every asset into a
//! topic-organised destination and keeps a durable index from each topic to
//! the permalinks of its items.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`manifest`] - Manifest parsing into ordered link entries
//! - [`topics`] - Topic labels from entry names
//! - [`naming`] - Display names, snapshot file names, HTML escaping
//! - [`params`] - Run parameter conversation with timeouts
//! - [`destination`] - Destination platform seam, references, sub-threads, permalinks
//! - [`download`] - Asset download collaborator with streaming HTTP support
//! - [`index`] - Topic index store and its persistence sinks
//! - [`db`] - Database connection and schema management
//! - [`report`] - Summary and paginated index rendering
//! - [`pipeline`] - Item processing, rate-limit retry and the run entry point
//! - [`config`] - File configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod destination;
pub mod download;
pub mod index;
pub mod manifest;
pub mod naming;
pub mod params;
pub mod pipeline;
pub mod report;
pub mod topics;

// Re-export commonly used types
pub use db::{Database, DatabaseOptions, DbError};
pub use destination::{
    Destination, DestinationId, DirectoryDestination, MessageId, MessageRef, PlatformError,
    ThreadId, UploadRequest,
};
pub use download::{AssetDownloader, DownloadError, HttpDownloader};
pub use index::{
    IndexSink, PersistError, SnapshotFileSink, SqliteIndexSink, TopicIndex, TopicIndexEntry,
    TopicIndexStore,
};
pub use manifest::{LinkEntry, ManifestError, ManifestSource, parse_manifest};
pub use params::{ChannelEventSource, EventSource, EventSourceError, Prompt, RunParameters};
pub use pipeline::{
    BatchRunner, ItemOutcome, NoopObserver, Pacer, RetryPolicy, RunError, RunObserver, RunResult,
    RunServices, RunSettings, run_batch,
};
pub use report::RunCounts;
pub use topics::{DEFAULT_TOPIC, extract_topic};
