/// Upper bound on how many entries a single page may request.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Convert an `(offset, limit)` pair into an inclusive `(start, end)` index window.
///
/// `limit` is clamped to `1..=MAX_PAGE_SIZE`, so the window is never empty.
pub fn inclusive_window(offset: u64, limit: u64) -> (u64, u64) {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    (offset, offset.saturating_add(limit - 1))
}
