//! Operator console for multi-agent automation pipelines.
//!
//! The console drives a pipeline run over a server-sent event stream, falls
//! back to a scripted sandbox run when no backend is reachable, keeps the
//! dashboard aggregates in step with finished runs, and lets an operator
//! resolve escalated review items.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod escalation;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod stream;
pub mod utils;
