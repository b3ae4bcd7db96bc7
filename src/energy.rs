//! Energy spent by active skills.
//!
//! Regenerates `regen_per_sec` for every whole second that passed since the
//! last regeneration, but only once the post-use delay has run out. Time is
//! micros since the unix epoch, the same unit as `Timestamp`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ENERGY: u32 = 20;
pub const DEFAULT_REGEN_PER_SEC: u32 = 1;
/// Regeneration pauses this long after energy is spent.
pub const REGEN_DELAY_MICROS: i64 = 3_000_000;

const MICROS_PER_SEC: i64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyPool {
    pub current: u32,
    pub max: u32,
    pub regen_per_sec: u32,
    pub regen_resume_at: i64,
    pub last_regen_at: i64,
}

impl Default for EnergyPool {
    fn default() -> Self {
        Self {
            current: DEFAULT_MAX_ENERGY,
            max: DEFAULT_MAX_ENERGY,
            regen_per_sec: DEFAULT_REGEN_PER_SEC,
            regen_resume_at: 0,
            last_regen_at: 0,
        }
    }
}

impl EnergyPool {
    pub fn has(&self, amount: u32) -> bool {
        self.current >= amount
    }

    /// Takes `amount` and pauses regeneration. False (and no change) if short.
    pub fn consume(&mut self, amount: u32, now: i64) -> bool {
        if !self.has(amount) {
            return false;
        }
        self.current -= amount;
        if amount > 0 {
            self.regen_resume_at = now.saturating_add(REGEN_DELAY_MICROS);
            self.last_regen_at = self.regen_resume_at;
        }
        true
    }

    pub fn restore(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    pub fn set_max(&mut self, max: u32) {
        self.max = max.max(1);
        self.current = self.current.min(self.max);
    }

    /// Regenerates for the time elapsed up to `now`. Returns true if the
    /// pool changed.
    pub fn tick(&mut self, now: i64) -> bool {
        if now < self.regen_resume_at {
            return false;
        }
        if self.current >= self.max {
            return false;
        }
        let whole_secs = (now - self.last_regen_at.max(self.regen_resume_at)) / MICROS_PER_SEC;
        if whole_secs <= 0 {
            return false;
        }
        let before = self.current;
        let gained = (whole_secs as u64).saturating_mul(u64::from(self.regen_per_sec));
        self.restore(gained.min(u64::from(u32::MAX)) as u32);
        self.last_regen_at = self.last_regen_at.max(self.regen_resume_at) + whole_secs * MICROS_PER_SEC;
        self.current != before
    }

    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            return 0.0;
        }
        self.current as f32 / self.max as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1_000_000;

    #[test]
    fn consume_pauses_regeneration() {
        let mut pool = EnergyPool::default();
        assert!(pool.consume(5, 10 * SEC));
        assert_eq!(pool.current, 15);

        assert!(!pool.tick(12 * SEC));
        assert_eq!(pool.current, 15);

        // delay ends at 13s, two whole seconds later
        assert!(pool.tick(15 * SEC));
        assert_eq!(pool.current, 17);
    }

    #[test]
    fn fractional_seconds_carry_over() {
        let mut pool = EnergyPool::default();
        pool.consume(10, 0);
        pool.tick(3 * SEC + SEC / 2);
        assert_eq!(pool.current, 10);
        pool.tick(4 * SEC);
        assert_eq!(pool.current, 11);
        pool.tick(4 * SEC + SEC / 2);
        assert_eq!(pool.current, 11);
    }

    #[test]
    fn never_exceeds_max() {
        let mut pool = EnergyPool::default();
        pool.consume(2, 0);
        pool.tick(1_000 * SEC);
        assert_eq!(pool.current, DEFAULT_MAX_ENERGY);
        pool.restore(50);
        assert_eq!(pool.current, DEFAULT_MAX_ENERGY);
    }

    #[test]
    fn refuses_when_short() {
        let mut pool = EnergyPool::default();
        assert!(!pool.consume(21, 0));
        assert_eq!(pool.current, 20);
        assert_eq!(pool.regen_resume_at, 0);
    }

    #[test]
    fn shrinking_max_clamps_current() {
        let mut pool = EnergyPool::default();
        pool.set_max(5);
        assert_eq!(pool.current, 5);
        pool.set_max(0);
        assert_eq!(pool.max, 1);
    }
}
