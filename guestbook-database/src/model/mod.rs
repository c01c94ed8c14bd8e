pub mod entry;
pub mod rate_limit;
