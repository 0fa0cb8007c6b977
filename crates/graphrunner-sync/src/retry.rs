//! Exact retry parameters (spec §9: "reimplementations should preserve
//! these numbers for behavioral parity").

use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 5;
pub const BASE_DELAY_MS: f64 = 200.0;
pub const BACKOFF_FACTOR: f64 = 1.05;

/// Delay before the (1-indexed) `attempt`th retry.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let ms = BASE_DELAY_MS * BACKOFF_FACTOR.powi(attempt as i32 - 1);
    Duration::from_millis(ms.round() as u64)
}
