// Shared type definitions
// Records, search requests/results, render payloads, settings and errors.

pub mod bookmark;
pub mod collection;
pub mod errors;
pub mod render;
pub mod search;
pub mod settings;
