/******************************************************************************
 *                                                                            *
 * Experience Curve                                                           *
 *                                                                            *
 * Geometric level thresholds shared by every profession and origin track.    *
 * Level 2 costs `base` experience, every following level costs the previous  *
 * threshold times `growth`, rounded.                                         *
 *                                                                            *
 ******************************************************************************/

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_EXPERIENCE: u64 = 100;
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.2;
pub const DEFAULT_MAX_LEVEL: u32 = 50;
/// Highest max level a curve accepts; the tables are precomputed per level.
pub const MAX_SUPPORTED_LEVEL: u32 = 1000;

/// Curve parameters as they appear in the catalog document (`"curve": {...}`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    #[serde(default = "default_base")]
    pub base: u64,
    #[serde(default = "default_growth")]
    pub growth: f64,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
}

fn default_base() -> u64 {
    DEFAULT_BASE_EXPERIENCE
}

fn default_growth() -> f64 {
    DEFAULT_GROWTH_FACTOR
}

fn default_max_level() -> u32 {
    DEFAULT_MAX_LEVEL
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_EXPERIENCE,
            growth: DEFAULT_GROWTH_FACTOR,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

/// Precomputed per-level thresholds.
///
/// `thresholds[i]` is the experience needed to go from level `i + 1` to
/// level `i + 2`; `cumulative[i]` is the total experience needed to stand
/// at level `i + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperienceCurve {
    config: CurveConfig,
    thresholds: Vec<u64>,
    cumulative: Vec<u64>,
}

impl ExperienceCurve {
    /// Builds the curve. Returns `None` for parameters that would not give a
    /// strictly increasing curve (base 0, growth below 1) and for a max level
    /// outside `1..=MAX_SUPPORTED_LEVEL`.
    pub fn new(config: CurveConfig) -> Option<Self> {
        if config.base == 0 || !(config.growth >= 1.0) || !config.growth.is_finite() {
            return None;
        }
        if config.max_level == 0 || config.max_level > MAX_SUPPORTED_LEVEL {
            return None;
        }

        let steps = config.max_level.saturating_sub(1) as usize;
        let mut thresholds = Vec::with_capacity(steps);
        let mut cumulative = Vec::with_capacity(steps + 1);
        cumulative.push(0u64);

        let mut previous = config.base;
        for step in 0..steps {
            let threshold = if step == 0 {
                config.base
            } else {
                // Keep the curve strictly increasing even when rounding would stall it.
                let grown = (previous as f64 * config.growth).round() as u64;
                grown.max(previous.saturating_add(1))
            };
            thresholds.push(threshold);
            let total = cumulative[step].saturating_add(threshold);
            cumulative.push(total);
            previous = threshold;
        }

        Some(Self { config, thresholds, cumulative })
    }

    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    pub fn max_level(&self) -> u32 {
        self.config.max_level
    }

    /// Experience needed to reach `level` from `level - 1`. Zero for level 1
    /// and below; zero above the max level (there is nothing left to reach).
    pub fn experience_for_level(&self, level: u32) -> u64 {
        if level <= 1 || level > self.config.max_level {
            return 0;
        }
        self.thresholds[(level - 2) as usize]
    }

    /// Total experience needed to stand at `level`, starting from level 1.
    pub fn cumulative_experience(&self, level: u32) -> u64 {
        let level = level.clamp(1, self.config.max_level);
        self.cumulative[(level - 1) as usize]
    }

    /// Largest level whose cumulative requirement fits in `total_experience`,
    /// capped at the max level.
    pub fn level_for_experience(&self, total_experience: i64) -> u32 {
        self.experience_into_level(total_experience).0
    }

    /// Splits a total into `(level, experience toward the next level)`.
    /// At the max level the remainder is whatever exceeds the cap.
    pub fn experience_into_level(&self, total_experience: i64) -> (u32, u64) {
        if total_experience <= 0 {
            return (1, 0);
        }
        let total = total_experience as u64;
        // cumulative is sorted, so the partition point is the first level we cannot afford.
        let reachable = self.cumulative.partition_point(|needed| *needed <= total);
        let level = (reachable as u32).clamp(1, self.config.max_level);
        (level, total - self.cumulative_experience(level))
    }

    /// Fraction of the way from `level` to `level + 1` in [0, 1].
    pub fn progress_to_next_level(&self, level: u32, experience: u64) -> f64 {
        if level >= self.config.max_level {
            return 1.0;
        }
        let needed = self.experience_for_level(level + 1);
        if needed == 0 {
            return 1.0;
        }
        (experience as f64 / needed as f64).min(1.0)
    }
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        Self::new(CurveConfig::default()).expect("default curve parameters are valid")
    }
}
