//! # cx_app
//!
//! Application glue for exchange API clients: tracing setup, layered configuration,
//! and assembly of a ready-to-use request pipeline.

pub mod config_loader;
pub mod pipeline;
pub mod tracing_setup;
