//! Quest offers: the handful of quests a player is shown on each track.
//!
//! Offers are drawn at random from what the player can accept, quests close
//! to their level first, and redrawn by the progression tick once they go
//! stale. A quest has to be on offer before it can be accepted.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::Catalog;
use crate::profile::PlayerProfile;
use crate::quest::Quest;

/// Offers drawn per track on every refresh.
pub const OFFERS_PER_TRACK: usize = 3;
/// A quest whose minimum level is at most this far below the player's
/// level counts as level-appropriate.
pub const OFFER_LEVEL_SPREAD: u32 = 5;
pub const QUEST_OFFER_REFRESH_SECS: u64 = 60;

const MICROS_PER_SEC: i64 = 1_000_000;

/// Picks up to `count` acceptable quests for `track` at `level`, skipping
/// ids in `exclude`. Level-appropriate quests are shuffled and taken first;
/// lower-level ones only fill what is left.
pub fn select_offers<R: Rng + ?Sized>(
    catalog: &Catalog,
    track: &str,
    level: u32,
    count: usize,
    exclude: &[&str],
    rng: &mut R,
) -> Vec<Arc<Quest>> {
    if count == 0 {
        return Vec::new();
    }
    let (mut offers, mut fallback): (Vec<_>, Vec<_>) = catalog
        .quests_for(track, level)
        .into_iter()
        .filter(|quest| !exclude.contains(&quest.id.as_str()))
        .partition(|quest| level.saturating_sub(quest.min_level) <= OFFER_LEVEL_SPREAD);

    offers.shuffle(rng);
    offers.truncate(count);
    if offers.len() < count {
        fallback.shuffle(rng);
        let missing = count - offers.len();
        offers.extend(fallback.into_iter().take(missing));
    }
    offers
}

/// True when offers handed out at `oldest_offered_at` should be redrawn.
/// A player with no offers is always due.
pub fn offers_due(oldest_offered_at: Option<i64>, now: i64) -> bool {
    match oldest_offered_at {
        Some(offered_at) => now.saturating_sub(offered_at) >= QUEST_OFFER_REFRESH_SECS as i64 * MICROS_PER_SEC,
        None => true,
    }
}

impl PlayerProfile {
    /// Fresh offers for `track`, leaving out quests the player is running.
    pub fn draw_offers<R: Rng + ?Sized>(&self, catalog: &Catalog, track: &str, rng: &mut R) -> Vec<Arc<Quest>> {
        if catalog.track(track).is_none() {
            return Vec::new();
        }
        let running: Vec<&str> = self.active_quests().map(|slot| slot.quest.quest_id()).collect();
        select_offers(catalog, track, self.level(track), OFFERS_PER_TRACK, &running, rng)
    }
}
