//! Bulk article generation and quality-control pipeline.
//!
//! Reads rows of article metadata from CSV, drives a configurable
//! multi-stage generation pipeline (outline, then one or more rewrite
//! stages) against OpenAI-compatible chat endpoints, scores the output
//! with a deterministic QC battery, and writes an annotated CSV plus a
//! JSON QC report.

pub mod config;
pub mod csv_io;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod qc;
pub mod rate_limit;
pub mod report;
pub mod row;

pub use config::{Config, RetryConfig, StageConfig, StageKind};
pub use error::{ConfigError, UpstreamError};
pub use generate::{ChatClient, Generate};
pub use pipeline::{PipelineRunner, RowProcessor, Stage};
pub use qc::{CheckResult, QcConfig, QcResult, QualityController};
pub use rate_limit::RateLimiter;
pub use report::{aggregate, Report};
pub use row::{Row, RowMeta, RowState};
