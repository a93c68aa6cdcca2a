//! Request-processing services
//!
//! - `pipeline`: per-song orchestration
//! - `result_cache`: fingerprint-keyed analysis cache with single-flight
//! - `metadata`: duration checks before any heavy work
//! - `downloader`: remote audio retrieval
//! - `temp_files`: request-scoped source files

pub mod downloader;
pub mod metadata;
pub mod pipeline;
pub mod result_cache;
pub mod temp_files;

pub use downloader::{AudioDownloader, DownloadError, YtDlpDownloader};
pub use metadata::MetadataError;
pub use pipeline::{Pipeline, PipelineError, PipelineLimits, SongJob};
pub use result_cache::{CacheError, CacheStats, Resolution, ResultCache};
pub use temp_files::{sweep_orphans, TempSource};
