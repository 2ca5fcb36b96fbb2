//! # InsightHub Common Library
//!
//! Shared code for the InsightHub services:
//! - Detection records produced by model passes
//! - Severity classification and auto tagging of detection sets
//! - Analysis result assembly (score, summary, location metadata)
//! - Configuration loading
//! - Common error types

pub mod classify;
pub mod config;
pub mod detection;
pub mod error;
pub mod report;
pub mod tagger;

pub use classify::{classify, Severity, SeverityAssessment};
pub use detection::{BoundingBox, Detection};
pub use error::{Error, Result};
pub use report::{AnalysisResult, GeoLocation};
pub use tagger::generate_tags;
