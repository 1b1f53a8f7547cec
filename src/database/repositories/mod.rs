mod fallback;
mod memory;
mod postgres;

pub use fallback::FallbackStore;
pub use memory::{FALLBACK_ID_START, MemoryStore};
pub use postgres::PgStore;
