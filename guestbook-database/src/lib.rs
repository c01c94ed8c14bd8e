pub mod cache;
pub mod database;
pub mod impls;
pub mod model;
pub mod store;

pub use cache::CacheService;
pub use database::Database;
pub use store::KvStore;
