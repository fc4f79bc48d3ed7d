// State managers
// Managers own mutable state: the in-memory bookmark index and the store lifecycle.

pub mod bookmark_index;
pub mod bookmark_manager;
