/// Shared formatting helpers (wait hints, durations).
pub mod formatting;
/// Index-window helpers for paginated reads.
pub mod pagination;
/// Pure parser helpers.
pub mod parse;
/// Shared time helpers.
pub mod time;
