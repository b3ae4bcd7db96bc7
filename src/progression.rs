/******************************************************************************
 *                                                                            *
 * Progression Tables & Reducers                                              *
 *                                                                            *
 * Host side of the progression core. Each player's profile lives as one     *
 * JSON document in `player_progression`; every reducer loads the catalog    *
 * and the caller's profile, applies one operation, turns the reported       *
 * events into notification rows and writes the profile back. A reducer      *
 * that returns Err rolls all of it back.                                     *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{Identity, ReducerContext, Table, Timestamp};
use log;

use crate::catalog::{Catalog, DEFAULT_CATALOG_JSON};
use crate::events::ProgressionEvents;
use crate::models::{ItemQuality, ObjectiveKind, RewardKind};
use crate::profile::{AcceptError, PlayerProfile};
use crate::quality::{enhanced_durability, roll_quality};
use crate::quest::QuestReward;
use crate::quest_board::offers_due;
use crate::skill_registry::{ActivationError, SkillRejection};

// Import table traits
use crate::progression::catalog_document as CatalogDocumentTableTrait;
use crate::progression::crafted_quality_roll as CraftedQualityRollTableTrait;
use crate::progression::level_up_notification as LevelUpNotificationTableTrait;
use crate::progression::player_progression as PlayerProgressionTableTrait;
use crate::progression::progression_admin as ProgressionAdminTableTrait;
use crate::progression::progression_reporter as ProgressionReporterTableTrait;
use crate::progression::quest_completion_notification as QuestCompletionNotificationTableTrait;
use crate::progression::quest_offer as QuestOfferTableTrait;

/// The catalog table holds a single row under this key.
pub(crate) const CATALOG_ROW_ID: u32 = 0;

// ============================================================================
// TABLES
// ============================================================================

/// Serialized `PlayerProfile`, one row per player.
#[spacetimedb::table(accessor = player_progression, public)]
#[derive(Clone, Debug)]
pub struct PlayerProgression {
    #[primary_key]
    pub player_id: Identity,
    pub state_json: String,
    pub updated_at: Timestamp,
}

#[spacetimedb::table(accessor = catalog_document, public)]
#[derive(Clone, Debug)]
pub struct CatalogDocument {
    #[primary_key]
    pub id: u32,
    pub document_json: String,
    pub updated_at: Timestamp,
}

/// Identities allowed to run the administrative reducers.
#[spacetimedb::table(accessor = progression_admin)]
#[derive(Clone, Debug)]
pub struct ProgressionAdmin {
    #[primary_key]
    pub identity: Identity,
}

/// Trusted game-server identities that report what players did (mining,
/// kills, crafting). Experience and quest progress only arrive through them.
#[spacetimedb::table(accessor = progression_reporter)]
#[derive(Clone, Debug)]
pub struct ProgressionReporter {
    #[primary_key]
    pub identity: Identity,
    pub registered_at: Timestamp,
}

#[spacetimedb::table(accessor = level_up_notification, public)]
#[derive(Clone, Debug)]
pub struct LevelUpNotification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub player_id: Identity,
    pub track: String,
    pub new_level: u32,
    pub notified_at: Timestamp,
}

/// Sent to the client for the celebration UI. Items are JSON,
/// `[{"item": ..., "amount": ...}]`, and handed out by the client-facing
/// inventory code.
#[spacetimedb::table(accessor = quest_completion_notification, public)]
#[derive(Clone, Debug)]
pub struct QuestCompletionNotification {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub player_id: Identity,
    pub quest_id: String,
    pub quest_title: String,
    pub reward_kind: RewardKind,
    pub reward_tier: u8,
    pub reward_quantity: u32,
    pub token_item: Option<String>,
    pub reward_items_json: String,
    pub completed_at: Timestamp,
}

/// A quest currently offered to a player on one track. Redrawn by the
/// progression tick; `accept_quest` only takes quests listed here.
#[spacetimedb::table(accessor = quest_offer, public)]
#[derive(Clone, Debug)]
pub struct QuestOffer {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub player_id: Identity,
    pub track: String,
    pub quest_id: String,
    pub offered_at: Timestamp,
}

/// Result of a quality roll for a freshly crafted item.
#[spacetimedb::table(accessor = crafted_quality_roll, public)]
#[derive(Clone, Debug)]
pub struct CraftedQualityRoll {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub player_id: Identity,
    pub track: String,
    pub item_name: String,
    pub quality: ItemQuality,
    pub max_durability: u32,
    pub rolled_at: Timestamp,
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Turns core events into notification rows for one player.
struct NotificationSink<'a> {
    ctx: &'a ReducerContext,
    player_id: Identity,
    catalog: &'a Catalog,
}

impl ProgressionEvents for NotificationSink<'_> {
    fn on_level_up(&mut self, track: &str, new_level: u32) {
        self.ctx.db.level_up_notification().insert(LevelUpNotification {
            id: 0,
            player_id: self.player_id,
            track: track.to_string(),
            new_level,
            notified_at: self.ctx.timestamp,
        });
    }

    fn on_experience_gained(&mut self, track: &str, amount: u64) {
        log::debug!("[Progression] {:?} gained {} xp on '{}'", self.player_id, amount, track);
    }

    fn on_quest_completed(&mut self, quest_id: &str, reward: &QuestReward) {
        let quest_title = self
            .catalog
            .quest(quest_id)
            .map(|q| q.title.clone())
            .unwrap_or_else(|| quest_id.to_string());
        let token_item = (reward.kind == RewardKind::SkillPointToken).then(|| reward.token_item().to_string());
        let reward_items_json = serde_json::to_string(&reward.items).unwrap_or_else(|_| "[]".to_string());

        self.ctx.db.quest_completion_notification().insert(QuestCompletionNotification {
            id: 0,
            player_id: self.player_id,
            quest_id: quest_id.to_string(),
            quest_title,
            reward_kind: reward.kind,
            reward_tier: reward.tier,
            reward_quantity: reward.quantity,
            token_item,
            reward_items_json,
            completed_at: self.ctx.timestamp,
        });
    }

    fn on_quest_expired(&mut self, quest_id: &str) {
        log::info!("[Quests] Quest '{}' expired for {:?}", quest_id, self.player_id);
    }
}

// ============================================================================
// LOAD / SAVE
// ============================================================================

/// Seeds the bundled catalog if none is stored yet. Called from `init_module`.
pub fn seed_catalog(ctx: &ReducerContext) -> Result<(), String> {
    let table = ctx.db.catalog_document();
    if table.id().find(&CATALOG_ROW_ID).is_some() {
        log::debug!("[Catalog] Catalog document already present.");
        return Ok(());
    }
    // Refuse to seed a document that would not load.
    Catalog::from_json(DEFAULT_CATALOG_JSON).map_err(|e| e.to_string())?;
    table.insert(CatalogDocument {
        id: CATALOG_ROW_ID,
        document_json: DEFAULT_CATALOG_JSON.to_string(),
        updated_at: ctx.timestamp,
    });
    log::info!("[Catalog] Seeded default catalog");
    Ok(())
}

pub fn register_admin(ctx: &ReducerContext, identity: Identity) {
    let table = ctx.db.progression_admin();
    if table.identity().find(&identity).is_none() {
        table.insert(ProgressionAdmin { identity });
        log::info!("[Progression] Registered admin {:?}", identity);
    }
}

/// What the sender of a reducer call may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallerRole {
    /// The module itself (scheduled reducers, init).
    Module,
    Admin,
    /// A registered game server reporting player activity.
    Reporter,
    Player,
}

impl CallerRole {
    fn resolve(sender: Identity, module: Identity, is_admin: bool, is_reporter: bool) -> Self {
        if sender == module {
            CallerRole::Module
        } else if is_admin {
            CallerRole::Admin
        } else if is_reporter {
            CallerRole::Reporter
        } else {
            CallerRole::Player
        }
    }

    fn may_administer(self) -> bool {
        matches!(self, CallerRole::Module | CallerRole::Admin)
    }

    fn may_report_progress(self) -> bool {
        self != CallerRole::Player
    }
}

fn caller_role(ctx: &ReducerContext) -> CallerRole {
    CallerRole::resolve(
        ctx.sender(),
        ctx.identity(),
        ctx.db.progression_admin().identity().find(&ctx.sender()).is_some(),
        ctx.db.progression_reporter().identity().find(&ctx.sender()).is_some(),
    )
}

fn require_admin(ctx: &ReducerContext) -> Result<(), String> {
    if caller_role(ctx).may_administer() {
        return Ok(());
    }
    Err("Only progression admins may do that.".to_string())
}

fn require_reporter(ctx: &ReducerContext) -> Result<(), String> {
    if caller_role(ctx).may_report_progress() {
        return Ok(());
    }
    log::warn!("[Progression] Rejected progress report from untrusted {:?}", ctx.sender());
    Err("Only trusted reporters may report player progress.".to_string())
}

pub(crate) fn load_catalog(ctx: &ReducerContext) -> Result<Catalog, String> {
    match ctx.db.catalog_document().id().find(&CATALOG_ROW_ID) {
        Some(row) => Catalog::from_json(&row.document_json).map_err(|e| e.to_string()),
        None => {
            log::warn!("[Catalog] No stored catalog, falling back to the bundled one");
            Catalog::load_default().map_err(|e| e.to_string())
        }
    }
}

pub(crate) fn decode_profile(row: &PlayerProgression, catalog: &Catalog) -> Result<PlayerProfile, String> {
    let value: serde_json::Value = serde_json::from_str(&row.state_json)
        .map_err(|e| format!("Corrupt progression state for {:?}: {}", row.player_id, e))?;
    PlayerProfile::read_state(&value, catalog).map_err(|e| e.to_string())
}

fn load_profile(ctx: &ReducerContext, catalog: &Catalog, player_id: Identity) -> Result<PlayerProfile, String> {
    match ctx.db.player_progression().player_id().find(&player_id) {
        Some(row) => decode_profile(&row, catalog),
        None => Ok(PlayerProfile::new()),
    }
}

pub(crate) fn save_profile(ctx: &ReducerContext, player_id: Identity, profile: &PlayerProfile) {
    let table = ctx.db.player_progression();
    let row = PlayerProgression {
        player_id,
        state_json: profile.write_state().to_string(),
        updated_at: ctx.timestamp,
    };
    if table.player_id().find(&player_id).is_some() {
        table.player_id().update(row);
    } else {
        table.insert(row);
    }
}

/// Loads the caller's profile, runs `op`, saves. Errors roll back the
/// reducer together with any notification rows `op` produced.
fn with_profile<T>(
    ctx: &ReducerContext,
    player_id: Identity,
    op: impl FnOnce(&Catalog, &mut PlayerProfile, &mut NotificationSink) -> Result<T, String>,
) -> Result<T, String> {
    let catalog = load_catalog(ctx)?;
    let mut profile = load_profile(ctx, &catalog, player_id)?;
    let mut sink = NotificationSink { ctx, player_id, catalog: &catalog };
    let result = op(&catalog, &mut profile, &mut sink)?;
    save_profile(ctx, player_id, &profile);
    Ok(result)
}

// ============================================================================
// QUEST OFFERS
// ============================================================================

/// Redraws every offer `player_id` holds once the oldest one is stale.
/// Returns true if the offers were replaced.
pub(crate) fn refresh_quest_offers_if_due(
    ctx: &ReducerContext,
    catalog: &Catalog,
    player_id: Identity,
    profile: &PlayerProfile,
) -> bool {
    let table = ctx.db.quest_offer();
    let current: Vec<QuestOffer> = table.player_id().filter(&player_id).collect();
    let oldest = current.iter().map(|offer| offer.offered_at.to_micros_since_unix_epoch()).min();
    if !offers_due(oldest, now_micros(ctx)) {
        return false;
    }

    for offer in current {
        table.id().delete(offer.id);
    }

    let mut rng = ctx.rng();
    let mut offered = 0;
    for track in catalog.tracks() {
        for quest in profile.draw_offers(catalog, &track.id, &mut rng) {
            table.insert(QuestOffer {
                id: 0,
                player_id,
                track: track.id.clone(),
                quest_id: quest.id.clone(),
                offered_at: ctx.timestamp,
            });
            offered += 1;
        }
    }
    log::debug!("[Quests] Drew {} offer(s) for {:?}", offered, player_id);
    true
}

/// Takes the offer for `quest_id` on `track` off the board.
fn claim_offer(ctx: &ReducerContext, player_id: Identity, quest_id: &str, track: &str) -> Result<(), String> {
    let table = ctx.db.quest_offer();
    let offer = table
        .player_id()
        .filter(&player_id)
        .find(|offer| offer.quest_id == quest_id && offer.track == track)
        .ok_or_else(|| "That quest is not on offer.".to_string())?;
    table.id().delete(offer.id);
    Ok(())
}

pub(crate) fn now_micros(ctx: &ReducerContext) -> i64 {
    ctx.timestamp.to_micros_since_unix_epoch()
}

fn describe_rejection(rejection: SkillRejection) -> &'static str {
    match rejection {
        SkillRejection::UnknownSkill => "Unknown skill.",
        SkillRejection::LevelTooLow => "Track level too low for this skill.",
        SkillRejection::AtMaxLevel => "Skill is already at max level.",
        SkillRejection::ParentNotLearned => "Learn the prerequisite skill first.",
        SkillRejection::NoSkillPoints => "No skill points left.",
    }
}

fn describe_activation_error(error: ActivationError, now: i64) -> String {
    match error {
        ActivationError::UnknownSkill => "Unknown skill.".to_string(),
        ActivationError::NotActive => "That skill cannot be activated.".to_string(),
        ActivationError::NotLearned => "You have not learned that skill.".to_string(),
        ActivationError::OnCooldown { ready_at } => {
            format!("Skill is on cooldown for {}s.", ((ready_at - now).max(0) + 999_999) / 1_000_000)
        }
        ActivationError::NotEnoughEnergy { needed, available } => {
            format!("Not enough energy ({} needed, {} available).", needed, available)
        }
    }
}

fn describe_accept_error(error: AcceptError) -> &'static str {
    match error {
        AcceptError::UnknownQuest => "Unknown quest.",
        AcceptError::NotEligible => "You cannot take this quest on that track yet.",
        AcceptError::AlreadyActive => "Quest is already active.",
        AcceptError::TooManyActive => "Too many active quests.",
    }
}

// ============================================================================
// PROGRESS REPORTING (Called from other modules)
// ============================================================================

/// Credits `amount` experience on one track. Entry point for game code that
/// lives in the same module.
pub(crate) fn award_track_experience(
    ctx: &ReducerContext,
    player_id: Identity,
    track: &str,
    amount: i64,
) -> Result<u32, String> {
    if amount <= 0 {
        return Err("Experience amount must be positive.".to_string());
    }
    with_profile(ctx, player_id, |catalog, profile, sink| {
        if catalog.track(track).is_none() {
            return Err(format!("Unknown track '{}'.", track));
        }
        Ok(profile.add_experience(catalog, track, amount, sink))
    })
}

/// Credits every track that earns experience from `action` (e.g. "mining").
pub(crate) fn award_action_experience_to(
    ctx: &ReducerContext,
    player_id: Identity,
    action: &str,
    amount: i64,
) -> Result<(), String> {
    if amount <= 0 {
        return Err("Experience amount must be positive.".to_string());
    }
    with_profile(ctx, player_id, |catalog, profile, sink| {
        let tracks: Vec<String> = catalog.tracks_for_source(action).map(|t| t.id.clone()).collect();
        if tracks.is_empty() {
            log::debug!("[Progression] Action '{}' earns no experience", action);
        }
        for track in tracks {
            profile.add_experience(catalog, &track, amount, sink);
        }
        Ok(())
    })
}

pub(crate) fn record_track_statistic(
    ctx: &ReducerContext,
    player_id: Identity,
    track: &str,
    key: &str,
    amount: u64,
) -> Result<(), String> {
    with_profile(ctx, player_id, |catalog, profile, _sink| {
        if profile.record_statistic(catalog, track, key, amount) {
            Ok(())
        } else {
            Err(format!("Unknown track '{}'.", track))
        }
    })
}

/// Feeds a player action (collect/kill/craft) to their running quests.
/// Returns the number of quests it completed.
pub(crate) fn track_quest_progress(
    ctx: &ReducerContext,
    player_id: Identity,
    kind: ObjectiveKind,
    target: &str,
    amount: i64,
) -> Result<usize, String> {
    let completed = with_profile(ctx, player_id, |catalog, profile, sink| {
        Ok(profile.record_quest_event(catalog, kind, target, amount, sink))
    })?;
    if completed > 0 {
        log::info!("[Quests] {:?} completed {} quest(s) via {:?} {}", player_id, completed, kind, target);
    }
    Ok(completed)
}

/// Rolls the quality of an item `player_id` just crafted on `track` and
/// records it for the crafting code to apply.
pub(crate) fn roll_quality_for(
    ctx: &ReducerContext,
    player_id: Identity,
    track: &str,
    item_name: &str,
    base_max_durability: u32,
) -> Result<ItemQuality, String> {
    let catalog = load_catalog(ctx)?;
    if catalog.track(track).is_none() {
        return Err(format!("Unknown track '{}'.", track));
    }
    let chances = catalog.quality_chances(track);
    let quality = roll_quality(&chances, &mut ctx.rng());
    let max_durability = enhanced_durability(base_max_durability, quality);

    ctx.db.crafted_quality_roll().insert(CraftedQualityRoll {
        id: 0,
        player_id,
        track: track.to_string(),
        item_name: item_name.to_string(),
        quality,
        max_durability,
        rolled_at: ctx.timestamp,
    });
    log::info!("[Progression] {:?} crafted {} {} ({} durability)", player_id, quality.as_str(), item_name, max_durability);
    Ok(quality)
}

// ============================================================================
// REDUCERS - TRACKS
// ============================================================================

// Reporting reducers serve out-of-module game servers registered with
// `register_reporter`. Clients cannot credit themselves.

#[spacetimedb::reducer]
pub fn add_track_experience(ctx: &ReducerContext, player_id: Identity, track: String, amount: i64) -> Result<(), String> {
    require_reporter(ctx)?;
    award_track_experience(ctx, player_id, &track, amount).map(|_| ())
}

#[spacetimedb::reducer]
pub fn award_action_experience(ctx: &ReducerContext, player_id: Identity, action: String, amount: i64) -> Result<(), String> {
    require_reporter(ctx)?;
    award_action_experience_to(ctx, player_id, &action, amount)
}

#[spacetimedb::reducer]
pub fn set_track_level(ctx: &ReducerContext, player_id: Identity, track: String, level: u32) -> Result<(), String> {
    require_admin(ctx)?;
    with_profile(ctx, player_id, |catalog, profile, sink| {
        if profile.set_level(catalog, &track, level, sink) {
            Ok(())
        } else {
            Err(format!("Unknown track '{}'.", track))
        }
    })
}

#[spacetimedb::reducer]
pub fn record_statistic(ctx: &ReducerContext, player_id: Identity, track: String, key: String, amount: u64) -> Result<(), String> {
    require_reporter(ctx)?;
    record_track_statistic(ctx, player_id, &track, &key, amount)
}

// ============================================================================
// REDUCERS - SKILLS
// ============================================================================

#[spacetimedb::reducer]
pub fn increase_skill(ctx: &ReducerContext, track: String, skill_id: String) -> Result<(), String> {
    with_profile(ctx, ctx.sender(), |catalog, profile, _sink| {
        profile
            .increase_skill(catalog, &track, &skill_id)
            .map(|_| ())
            .map_err(|rejection| describe_rejection(rejection).to_string())
    })
}

#[spacetimedb::reducer]
pub fn reset_skills(ctx: &ReducerContext, track: String) -> Result<(), String> {
    with_profile(ctx, ctx.sender(), |_catalog, profile, _sink| {
        profile.reset_skills(&track);
        Ok(())
    })
}

#[spacetimedb::reducer]
pub fn set_active_skill(ctx: &ReducerContext, track: String, skill_id: String) -> Result<(), String> {
    with_profile(ctx, ctx.sender(), |catalog, profile, _sink| {
        if profile.set_active_skill(catalog, &track, &skill_id) {
            log::info!("[Skills] {:?} bound '{}' on '{}'", ctx.sender(), skill_id, track);
            Ok(())
        } else {
            Err("Only a learned active skill can be selected.".to_string())
        }
    })
}

/// Fires the skill bound with `set_active_skill` on `track`.
#[spacetimedb::reducer]
pub fn activate_skill(ctx: &ReducerContext, track: String) -> Result<(), String> {
    let now = now_micros(ctx);
    with_profile(ctx, ctx.sender(), |catalog, profile, _sink| {
        let skill_id = profile
            .active_skill(&track)
            .map(str::to_string)
            .ok_or_else(|| "No active skill selected.".to_string())?;
        let activation = profile
            .activate_skill(catalog, &track, &skill_id, now)
            .map_err(|e| describe_activation_error(e, now))?;
        log::info!(
            "[Skills] {:?} activated '{}' (level {}), ready again at {}",
            ctx.sender(),
            skill_id,
            activation.level,
            activation.ready_at
        );
        Ok(())
    })
}

// ============================================================================
// REDUCERS - QUESTS
// ============================================================================

#[spacetimedb::reducer]
pub fn accept_quest(ctx: &ReducerContext, quest_id: String, track: String) -> Result<(), String> {
    let now = now_micros(ctx);
    claim_offer(ctx, ctx.sender(), &quest_id, &track)?;
    with_profile(ctx, ctx.sender(), |catalog, profile, _sink| {
        profile
            .accept_quest(catalog, &quest_id, &track, now)
            .map_err(|e| describe_accept_error(e).to_string())
    })
}

#[spacetimedb::reducer]
pub fn abandon_quest(ctx: &ReducerContext, quest_id: String) -> Result<(), String> {
    with_profile(ctx, ctx.sender(), |_catalog, profile, _sink| {
        if profile.abandon_quest(&quest_id) {
            Ok(())
        } else {
            Err("Quest is not active.".to_string())
        }
    })
}

#[spacetimedb::reducer]
pub fn report_quest_event(
    ctx: &ReducerContext,
    player_id: Identity,
    kind: ObjectiveKind,
    target: String,
    amount: i64,
) -> Result<(), String> {
    require_reporter(ctx)?;
    track_quest_progress(ctx, player_id, kind, &target, amount).map(|_| ())
}

// ============================================================================
// REDUCERS - CRAFTING QUALITY
// ============================================================================

#[spacetimedb::reducer]
pub fn roll_crafted_quality(
    ctx: &ReducerContext,
    player_id: Identity,
    track: String,
    item_name: String,
    base_max_durability: u32,
) -> Result<(), String> {
    require_reporter(ctx)?;
    roll_quality_for(ctx, player_id, &track, &item_name, base_max_durability).map(|_| ())
}

// ============================================================================
// REDUCERS - ADMIN
// ============================================================================

/// Replaces the stored catalog. The document must load before it is stored.
#[spacetimedb::reducer]
pub fn reload_catalog(ctx: &ReducerContext, document_json: String) -> Result<(), String> {
    require_admin(ctx)?;
    let catalog = Catalog::from_json(&document_json).map_err(|e| e.to_string())?;

    let table = ctx.db.catalog_document();
    let row = CatalogDocument { id: CATALOG_ROW_ID, document_json, updated_at: ctx.timestamp };
    if table.id().find(&CATALOG_ROW_ID).is_some() {
        table.id().update(row);
    } else {
        table.insert(row);
    }
    log::info!(
        "[Catalog] Reloaded: {} tracks, {} quests",
        catalog.tracks().len(),
        catalog.quest_count()
    );
    Ok(())
}

#[spacetimedb::reducer]
pub fn register_reporter(ctx: &ReducerContext, identity: Identity) -> Result<(), String> {
    require_admin(ctx)?;
    let table = ctx.db.progression_reporter();
    if table.identity().find(&identity).is_some() {
        return Err("Reporter is already registered.".to_string());
    }
    table.insert(ProgressionReporter { identity, registered_at: ctx.timestamp });
    log::info!("[Progression] Registered reporter {:?}", identity);
    Ok(())
}

#[spacetimedb::reducer]
pub fn unregister_reporter(ctx: &ReducerContext, identity: Identity) -> Result<(), String> {
    require_admin(ctx)?;
    if !ctx.db.progression_reporter().identity().delete(&identity) {
        return Err("Reporter is not registered.".to_string());
    }
    log::info!("[Progression] Unregistered reporter {:?}", identity);
    Ok(())
}
