//! Data pipeline for Steam engagement analytics.
//!
//! Reads the purchase/play event log, splits it into ownership and usage
//! facts, aggregates per game and per user, derives metrics and renders
//! ranked reports.

pub mod aggregator;
pub mod analysis;
pub mod metrics;
pub mod reader;
pub mod report;
pub mod splitter;

pub use engagement_core as core;
