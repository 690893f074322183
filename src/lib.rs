//! Derived metrics and per-view selection state for a retention analytics
//! dashboard backed by a pre-aggregating HTTP API.

pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod models;
pub mod payloads;
pub mod provider;
pub mod quality;
pub mod record_set;
pub mod refresh;
pub mod report;
pub mod risk;
pub mod sort;
pub mod summary;
pub mod view_state;

pub use error::{DashboardError, Result};
