pub mod entries;
pub mod rate_limit;
