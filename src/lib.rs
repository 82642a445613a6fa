//! # dealer-sync
//!
//! Reconciles dealer codes and product codes against a backing store: for
//! every valid (dealer, product) pair it makes sure a product-dealer link
//! exists, commits the pair for integration, verifies the commit left its
//! staging marker, and reports per-pair success or failure.
//!
//! The [`engine`] is store-agnostic and consumes the capability traits in
//! [`ports`]; [`db`] provides the Postgres (sqlx + pgmq) implementation.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod input;
pub mod model;
pub mod ports;
pub mod telemetry;
