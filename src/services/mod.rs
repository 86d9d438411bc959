// Service exports
pub mod cache;
pub mod history;
pub mod memory;
pub mod postgres;

pub use cache::CachedHistory;
pub use history::{HistoryError, HistoryProvider, RecommendationStore};
pub use memory::InMemoryHistory;
pub use postgres::PostgresClient;
