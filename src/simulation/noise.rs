//! Deterministic per-device power noise.
//!
//! Time is cut into fixed windows; within a window a device draws a constant
//! power. The value for a window is derived from a generator seeded by the
//! device key, the window number and the load profile, so the same inputs
//! always reproduce the same draw.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::domain::LoadProfile;

/// Relative standard deviation of always-on devices.
const FLAT_SIGMA: f64 = 0.03;
/// Fraction of windows during which a cyclic device runs.
const CYCLIC_ON_PROBABILITY: f64 = 1.0 / 3.0;
/// Standby draw of a cyclic device between cycles, relative to its average.
const CYCLIC_STANDBY: f64 = 0.05;

/// Stable 64-bit FNV-1a hash, used to key devices by id.
pub fn device_key(id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    id.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

fn window_seed(key: u64, window: i64, profile: LoadProfile) -> u64 {
    // splitmix64 finaliser over the combined inputs
    let mut z = key
        ^ (window as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ profile.seed_tag().rotate_left(32);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Instantaneous power of a device at `t_seconds`.
pub fn power_at(
    avg_power: f64,
    profile: LoadProfile,
    key: u64,
    t_seconds: f64,
    block_seconds: u64,
) -> f64 {
    if avg_power <= 0.0 || !avg_power.is_finite() {
        return 0.0;
    }
    let block = block_seconds.max(1) as f64;
    let window = (t_seconds / block).floor() as i64;
    let mut rng = StdRng::seed_from_u64(window_seed(key, window, profile));

    match profile {
        LoadProfile::Flat => {
            let jitter = Normal::new(0.0, FLAT_SIGMA)
                .map(|normal| normal.sample(&mut rng))
                .unwrap_or(0.0);
            (avg_power * (1.0 + jitter)).max(0.0)
        }
        LoadProfile::Cyclic => {
            if rng.gen_bool(CYCLIC_ON_PROBABILITY) {
                avg_power * rng.gen_range(1.0..=1.2)
            } else {
                avg_power * CYCLIC_STANDBY
            }
        }
        LoadProfile::Intermittent { duty } => {
            if rng.gen_bool(duty.clamp(0.0, 1.0)) {
                avg_power
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: u64 = 60;

    #[test]
    fn test_pure_and_constant_within_window() {
        let key = device_key("C_0-D1");
        let a = power_at(0.1, LoadProfile::Flat, key, 5.0, BLOCK);
        let b = power_at(0.1, LoadProfile::Flat, key, 5.0, BLOCK);
        let c = power_at(0.1, LoadProfile::Flat, key, 59.9, BLOCK);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_changes_across_windows() {
        let key = device_key("C_0-D1");
        let at_start = power_at(0.1, LoadProfile::Flat, key, 0.0, BLOCK);
        let later = power_at(0.1, LoadProfile::Flat, key, 100.0, BLOCK);
        assert_ne!(at_start, later);
    }

    #[test]
    fn test_flat_stays_near_average() {
        let key = device_key("fridge");
        for window in 0..200 {
            let p = power_at(1.0, LoadProfile::Flat, key, window as f64 * 60.0, BLOCK);
            assert!((0.8..=1.2).contains(&p), "flat draw {p} drifted too far");
        }
    }

    #[test]
    fn test_intermittent_is_on_or_off() {
        let key = device_key("shower");
        let profile = LoadProfile::Intermittent { duty: 0.5 };
        let draws: Vec<f64> = (0..100)
            .map(|w| power_at(6.5, profile, key, w as f64 * 60.0, BLOCK))
            .collect();
        assert!(draws.iter().all(|p| *p == 0.0 || *p == 6.5));
        assert!(draws.iter().any(|p| *p == 0.0));
        assert!(draws.iter().any(|p| *p == 6.5));
    }

    #[test]
    fn test_cyclic_bounds() {
        let key = device_key("ac");
        for w in 0..100 {
            let p = power_at(1.4, LoadProfile::Cyclic, key, w as f64 * 60.0, BLOCK);
            let standby = 1.4 * CYCLIC_STANDBY;
            assert!((p - standby).abs() < 1e-9 || (1.4..=1.4 * 1.2 + 1e-9).contains(&p));
        }
    }

    #[test]
    fn test_distinct_devices_do_not_move_in_lockstep() {
        let a = power_at(0.1, LoadProfile::Flat, device_key("C_1-D1"), 0.0, BLOCK);
        let b = power_at(0.1, LoadProfile::Flat, device_key("C_2-D1"), 0.0, BLOCK);
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_positive_average_draws_nothing() {
        assert_eq!(power_at(0.0, LoadProfile::Flat, 1, 0.0, BLOCK), 0.0);
        assert_eq!(power_at(-1.0, LoadProfile::Cyclic, 1, 0.0, BLOCK), 0.0);
    }
}
