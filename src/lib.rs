use spacetimedb::ReducerContext;
use log;

// ============================================================================
// SCHEDULE INITIALIZATION MACRO
// ============================================================================
// Inserts a schedule row and logs the outcome. On failure the server keeps
// starting up with that system disabled until the next restart or manual fix.
#[macro_export]
macro_rules! try_insert_schedule {
    ($table:expr, $schedule:expr, $system_name:expr) => {{
        match $table.try_insert($schedule) {
            Ok(_) => {
                log::info!("{} schedule initialized successfully", $system_name);
            }
            Err(e) => {
                log::error!("⚠️ CRITICAL: Failed to initialize {} schedule: {}", $system_name, e);
                log::error!("⚠️ Continuing server startup with {} system DISABLED", $system_name);
            }
        }
    }};
}

// Progression core
mod models;
mod experience_curve;
mod progress_tracker;
mod skill_tree;
mod skill_registry;
mod energy;
mod quest;
mod active_quest;
mod quality;
mod events;
mod catalog; // Static tracks, skill trees and quests
mod profile; // Per-player aggregate the reducers operate on
mod state; // Versioned JSON form of a profile
mod quest_board; // Which quests each player is offered

// Host side: tables, reducers, scheduled tick
mod progression;
mod progression_tick;

// Re-export reducers for client bindings
pub use progression::{
    abandon_quest, accept_quest, activate_skill, add_track_experience, award_action_experience,
    increase_skill, record_statistic, register_reporter, reload_catalog, report_quest_event,
    reset_skills, roll_crafted_quality, set_active_skill, set_track_level, unregister_reporter,
};

use crate::progression::player_progression as PlayerProgressionTableTrait;

#[spacetimedb::reducer(init)]
pub fn init_module(ctx: &ReducerContext) -> Result<(), String> {
    log::info!("Initializing module...");

    // Seed static data first; everything else reads the catalog.
    crate::progression::seed_catalog(ctx)?;
    // The publishing identity administers levels and the catalog.
    crate::progression::register_admin(ctx, ctx.sender());
    // Quest expiry, energy regen, cooldown upkeep and quest offers.
    crate::progression_tick::init_progression_tick_schedule(ctx)?;

    log::info!("Module initialization complete.");
    Ok(())
}

#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) -> Result<(), String> {
    let client_identity = ctx.sender();
    if ctx.db.player_progression().player_id().find(&client_identity).is_none() {
        log::info!("[Connect] Creating progression profile for {:?}", client_identity);
        crate::progression::save_profile(ctx, client_identity, &crate::profile::PlayerProfile::new());
    }
    Ok(())
}
