//! Crafted item quality for the blacksmith track.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::ItemQuality;

impl ItemQuality {
    /// Multiplier applied to the item's base max durability.
    pub fn durability_multiplier(&self) -> f32 {
        match self {
            ItemQuality::Poor => 0.75,
            ItemQuality::Normal => 1.0,
            ItemQuality::Good => 1.5,
            ItemQuality::Legendary => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemQuality::Poor => "poor",
            ItemQuality::Normal => "normal",
            ItemQuality::Good => "good",
            ItemQuality::Legendary => "legendary",
        }
    }
}

/// Roll weights. Whatever `poor + normal + good` leaves is legendary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityChances {
    pub poor: f32,
    pub normal: f32,
    pub good: f32,
}

impl Default for QualityChances {
    fn default() -> Self {
        Self { poor: 0.10, normal: 0.60, good: 0.25 }
    }
}

impl QualityChances {
    pub fn legendary(&self) -> f32 {
        (1.0 - self.poor - self.normal - self.good).max(0.0)
    }

    pub fn is_valid(&self) -> bool {
        let parts = [self.poor, self.normal, self.good];
        parts.iter().all(|p| p.is_finite() && *p >= 0.0) && parts.iter().sum::<f32>() <= 1.0 + f32::EPSILON
    }

    /// Maps a uniform roll in [0, 1) onto a quality, checking
    /// poor, normal, good, legendary in that order.
    pub fn quality_for_roll(&self, roll: f32) -> ItemQuality {
        if roll < self.poor {
            ItemQuality::Poor
        } else if roll < self.poor + self.normal {
            ItemQuality::Normal
        } else if roll < self.poor + self.normal + self.good {
            ItemQuality::Good
        } else {
            ItemQuality::Legendary
        }
    }
}

pub fn roll_quality<R: Rng + ?Sized>(chances: &QualityChances, rng: &mut R) -> ItemQuality {
    chances.quality_for_roll(rng.gen::<f32>())
}

/// Max durability after applying quality, never below 1.
pub fn enhanced_durability(base_max_durability: u32, quality: ItemQuality) -> u32 {
    ((base_max_durability as f32 * quality.durability_multiplier()).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn roll_boundaries() {
        let chances = QualityChances::default();
        assert_eq!(chances.quality_for_roll(0.0), ItemQuality::Poor);
        assert_eq!(chances.quality_for_roll(0.10), ItemQuality::Normal);
        assert_eq!(chances.quality_for_roll(0.69), ItemQuality::Normal);
        assert_eq!(chances.quality_for_roll(0.80), ItemQuality::Good);
        assert_eq!(chances.quality_for_roll(0.96), ItemQuality::Legendary);
    }

    #[test]
    fn seeded_rolls_follow_weights() {
        let chances = QualityChances { poor: 0.0, normal: 0.0, good: 0.0 };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(roll_quality(&chances, &mut rng), ItemQuality::Legendary);
        }

        let all_poor = QualityChances { poor: 1.0, normal: 0.0, good: 0.0 };
        for _ in 0..100 {
            assert_eq!(roll_quality(&all_poor, &mut rng), ItemQuality::Poor);
        }
    }

    #[test]
    fn validation() {
        assert!(QualityChances::default().is_valid());
        assert!(!QualityChances { poor: 0.5, normal: 0.5, good: 0.5 }.is_valid());
        assert!(!QualityChances { poor: -0.1, normal: 0.5, good: 0.1 }.is_valid());
        assert!(!QualityChances { poor: f32::NAN, normal: 0.5, good: 0.1 }.is_valid());
        assert!((QualityChances::default().legendary() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn durability_scaling() {
        assert_eq!(enhanced_durability(250, ItemQuality::Poor), 188);
        assert_eq!(enhanced_durability(250, ItemQuality::Legendary), 500);
        assert_eq!(enhanced_durability(1, ItemQuality::Poor), 1);
    }
}
