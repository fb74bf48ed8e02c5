//! Faultline server library
//!
//! Error event ingestion and issue grouping. The binary in `main.rs` wires
//! these modules into an HTTP server; tests use them directly.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
