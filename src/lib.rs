//! shaare-store: a single-file bookmark datastore.
//!
//! The whole collection lives in one checksummed file that is replaced
//! atomically on every mutation. Reads are served from an in-memory snapshot
//! with id, URL, tag and short-code indexes; search combines tag, visibility
//! and full-text filters with pagination.
//!
//! This library crate exposes all modules for use by the binaries and integration tests.

pub mod app;
pub mod datastore;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;
