//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall-clock time (history timestamps only, never the simulation)
//! - Entropy for unseeded trays
//! - The JavaScript-facing API on web

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Unix time in milliseconds
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Unix time in milliseconds
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Seed for trays created without an explicit one
#[cfg(target_arch = "wasm32")]
pub fn entropy_seed() -> u64 {
    let time = js_sys::Date::now() as u64;
    let noise = (js_sys::Math::random() * u32::MAX as f64) as u64;
    time ^ (noise << 32)
}

/// Seed for trays created without an explicit one
#[cfg(not(target_arch = "wasm32"))]
pub fn entropy_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ (u64::from(std::process::id()) << 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_past_epoch() {
        assert!(now_ms() > 0.0);
    }
}
