//! services/api/src/lib.rs
//!
//! The HTTP service for the CIM analyzer: adapters for the core ports,
//! configuration, and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
