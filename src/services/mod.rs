// Services
// Stateless engines: search/filter over a loaded collection, and settings persistence.

pub mod search_engine;
pub mod settings_engine;
