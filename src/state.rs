//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, configuration, the matchmaking queue, and a
//! registry of live game rooms. Each room sits behind its own mutex, which
//! is the single serialization point for that game's actions; different
//! games never contend with each other beyond the registry read lock.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::Game;
use crate::game::dice::{DiceRoller, RandomDice};
use crate::game::player::PlayerId;
use crate::protocol::ServerMessage;
use crate::services::matchmaking::Matchmaker;

// =============================================================================
// GAME ROOM
// =============================================================================

/// One registered socket for a seat.
#[derive(Debug, Clone)]
pub struct Connection {
    pub conn_id: Uuid,
    pub tx: mpsc::Sender<ServerMessage>,
}

/// Per-game live state. Flushed to Postgres by the persistence task.
pub struct GameRoom {
    pub game: Game,
    pub dice: Box<dyn DiceRoller>,
    /// Connected sockets keyed by seat. A reconnect replaces the entry.
    pub connections: HashMap<PlayerId, Connection>,
    /// Bumped on every accepted mutation.
    pub version: u64,
    /// Last version written to Postgres.
    pub persisted_version: u64,
}

impl GameRoom {
    /// A room for a freshly created game. Starts dirty so it gets persisted.
    #[must_use]
    pub fn new(game: Game) -> Self {
        Self::with_dice(game, Box::new(RandomDice::new()))
    }

    #[must_use]
    pub fn with_dice(game: Game, dice: Box<dyn DiceRoller>) -> Self {
        Self { game, dice, connections: HashMap::new(), version: 1, persisted_version: 0 }
    }

    /// A room hydrated from a stored snapshot. Starts clean.
    #[must_use]
    pub fn hydrated(game: Game) -> Self {
        let mut room = Self::new(game);
        room.persisted_version = room.version;
        room
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.version != self.persisted_version
    }
}

pub type SharedRoom = Arc<Mutex<GameRoom>>;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub games: Arc<RwLock<HashMap<Uuid, SharedRoom>>>,
    pub matchmaker: Arc<Mutex<Matchmaker>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        let matchmaker = Matchmaker::new(config.match_size);
        Self {
            pool,
            config: Arc::new(config),
            games: Arc::new(RwLock::new(HashMap::new())),
            matchmaker: Arc::new(Mutex::new(matchmaker)),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
