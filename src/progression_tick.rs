use spacetimedb::{ReducerContext, Table};
use spacetimedb::spacetimedb_lib::{ScheduleAt, TimeDuration};
use log;
use std::time::Duration;

use crate::events::EventLog;
use crate::progression::{
    decode_profile, load_catalog, now_micros, refresh_quest_offers_if_due, save_profile, PlayerProgression,
};

// Import table traits
use crate::progression_tick::progression_tick_schedule as ProgressionTickScheduleTableTrait;
use crate::progression::player_progression as PlayerProgressionTableTrait;

/// Quest expiry, energy regeneration and offer refreshes run on this interval.
pub(crate) const PROGRESSION_TICK_INTERVAL_SECS: u64 = 1;

// --- Progression Tick Schedule Table ---
#[spacetimedb::table(accessor = progression_tick_schedule, scheduled(process_progression_tick))]
#[derive(Clone)]
pub struct ProgressionTickSchedule {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub scheduled_at: ScheduleAt,
}

pub fn init_progression_tick_schedule(ctx: &ReducerContext) -> Result<(), String> {
    let schedule_table = ctx.db.progression_tick_schedule();
    if schedule_table.iter().count() == 0 {
        log::info!(
            "Starting progression tick schedule (every {}s).",
            PROGRESSION_TICK_INTERVAL_SECS
        );
        let interval = Duration::from_secs(PROGRESSION_TICK_INTERVAL_SECS);
        crate::try_insert_schedule!(
            schedule_table,
            ProgressionTickSchedule {
                id: 0,
                scheduled_at: ScheduleAt::Interval(TimeDuration::from(interval)),
            },
            "Progression tick"
        );
    } else {
        log::debug!("Progression tick schedule already exists.");
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn process_progression_tick(ctx: &ReducerContext, _schedule: ProgressionTickSchedule) -> Result<(), String> {
    if ctx.sender() != ctx.identity() {
        return Err("process_progression_tick may only be called by the scheduler.".to_string());
    }

    let rows: Vec<PlayerProgression> = ctx.db.player_progression().iter().collect();
    if rows.is_empty() {
        return Ok(());
    }
    let catalog = load_catalog(ctx)?;
    let now = now_micros(ctx);

    let mut expired_total = 0;
    for row in rows {
        // One unreadable profile must not stall everyone else's tick.
        let mut profile = match decode_profile(&row, &catalog) {
            Ok(profile) => profile,
            Err(e) => {
                log::error!("[Progression] Skipping tick for {:?}: {}", row.player_id, e);
                continue;
            }
        };

        // Expiry notifications are log-only, nothing to flush from here.
        let mut events = EventLog::default();
        let summary = profile.poll(now, &mut events);
        expired_total += summary.expired;

        if summary.changed {
            save_profile(ctx, row.player_id, &profile);
        }
        refresh_quest_offers_if_due(ctx, &catalog, row.player_id, &profile);
    }

    if expired_total > 0 {
        log::info!("[Quests] {} quest(s) expired this tick", expired_total);
    }
    Ok(())
}
