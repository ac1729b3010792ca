//! Reader use-case services.
//!
//! # Responsibility
//! - Orchestrate store, client and state into reader-level APIs.
//! - Keep the CLI and other front ends away from storage details.

pub mod backup_service;
pub mod batch;
pub mod reader_service;
