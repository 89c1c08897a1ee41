//! Domain types and primitives for Steam engagement analytics.
//!
//! Holds the event and summary models, the error taxonomy, the pipeline
//! configuration and CLI settings, and the statistics the pipeline stages
//! are built from (percentiles, Gini, Lorenz curves, rank percentiles).

pub mod config;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;

pub use error::{EngagementError, Result};
