//! Persistence service — background snapshot flush for dirty games.
//!
//! DESIGN
//! ======
//! A background task wakes on a fixed interval, snapshots every room whose
//! version moved since its last write, releases the room locks, then upserts
//! the snapshots into `games`. Action handling never waits on Postgres.
//!
//! ERROR HANDLING
//! ==============
//! A room is marked clean only after its write succeeds, and only up to the
//! version that was written. A failed write leaves the room dirty so the
//! next tick retries it; repeated upserts are acceptable, silent loss is not.
//!
//! EVICTION
//! ========
//! A finished game leaves the registry once its final version is written and
//! no socket is attached to it. A later connect hydrates it again.

use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use uuid::Uuid;

use crate::game::{Game, Phase};
use crate::state::{AppState, GameRoom, SharedRoom};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One game state captured under its room lock.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) game_id: Uuid,
    pub(crate) version: u64,
    pub(crate) phase: Phase,
    pub(crate) state: Value,
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = state.config.snapshot_flush_interval_ms;
    info!(flush_interval_ms, "game snapshot flush configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(flush_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            flush_dirty_games(&state).await;
        }
    })
}

/// Write every dirty game. Returns how many snapshots were persisted.
pub async fn flush_dirty_games(state: &AppState) -> usize {
    let snapshots = collect_dirty(state).await;
    let mut written = 0;

    for snapshot in snapshots {
        match save_game(&state.pool, snapshot.game_id, snapshot.phase, &snapshot.state).await {
            Ok(()) => {
                mark_persisted(state, snapshot.game_id, snapshot.version).await;
                written += 1;
            }
            Err(e) => {
                error!(game_id = %snapshot.game_id, version = snapshot.version, error = %e, "game snapshot flush failed");
            }
        }
    }
    evict_finished(state).await;
    written
}

fn is_evictable(room: &GameRoom) -> bool {
    room.game.phase == Phase::GameOver && !room.is_dirty() && room.connections.is_empty()
}

/// Drop finished, fully persisted, unwatched games from the registry.
/// Returns how many were removed.
pub(crate) async fn evict_finished(state: &AppState) -> usize {
    let rooms: Vec<(Uuid, SharedRoom)> = state.games.read().await.iter().map(|(id, room)| (*id, room.clone())).collect();
    let mut candidates = Vec::new();
    for (game_id, room) in rooms {
        if is_evictable(&*room.lock().await) {
            candidates.push(game_id);
        }
    }
    if candidates.is_empty() {
        return 0;
    }

    // Recheck under the registry write lock. A room that is busy right now is
    // skipped until the next tick; never wait on a room lock while holding
    // the registry.
    let mut games = state.games.write().await;
    let mut evicted = 0;
    for game_id in candidates {
        let still_evictable = games
            .get(&game_id)
            .is_some_and(|room| room.try_lock().is_ok_and(|room| is_evictable(&room)));
        if still_evictable {
            games.remove(&game_id);
            evicted += 1;
            info!(%game_id, "finished game evicted");
        }
    }
    evicted
}

pub(crate) async fn collect_dirty(state: &AppState) -> Vec<Snapshot> {
    let rooms: Vec<SharedRoom> = state.games.read().await.values().cloned().collect();
    let mut snapshots = Vec::new();

    for room in rooms {
        let room = room.lock().await;
        if !room.is_dirty() {
            continue;
        }
        match serde_json::to_value(&room.game) {
            Ok(value) => snapshots.push(Snapshot {
                game_id: room.game.id,
                version: room.version,
                phase: room.game.phase,
                state: value,
            }),
            Err(e) => error!(game_id = %room.game.id, error = %e, "game snapshot encode failed"),
        }
    }
    snapshots
}

pub(crate) async fn mark_persisted(state: &AppState, game_id: Uuid, version: u64) {
    let Some(room) = state.games.read().await.get(&game_id).cloned() else {
        return;
    };
    let mut room = room.lock().await;
    room.persisted_version = room.persisted_version.max(version);
}

/// Upsert the latest snapshot for a game.
///
/// # Errors
///
/// Returns a database error if the write fails.
pub async fn save_game(pool: &PgPool, game_id: Uuid, phase: Phase, state: &Value) -> Result<(), PersistError> {
    sqlx::query(
        "INSERT INTO games (id, state, phase, updated_at) VALUES ($1, $2, $3, now()) \
         ON CONFLICT (id) DO UPDATE SET state = EXCLUDED.state, phase = EXCLUDED.phase, updated_at = now()",
    )
    .bind(game_id)
    .bind(state)
    .bind(phase.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the latest stored snapshot for a game.
///
/// # Errors
///
/// Returns a database error, or a decode error when the stored JSON no longer
/// matches the game model.
pub async fn load_game(pool: &PgPool, game_id: Uuid) -> Result<Option<Game>, PersistError> {
    let row: Option<Value> = sqlx::query_scalar("SELECT state FROM games WHERE id = $1")
        .bind(game_id)
        .fetch_optional(pool)
        .await?;

    let Some(value) = row else {
        return Ok(None);
    };
    let mut game: Game = serde_json::from_value(value)?;
    game.restore_decks();
    Ok(Some(game))
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
