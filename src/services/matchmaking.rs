//! Matchmaking service — FIFO pools of parties keyed by requested game size.
//!
//! DESIGN
//! ======
//! `Matchmaker` is plain data behind `AppState.matchmaker`. Each pool holds
//! groups: a solo player or a party of friends that must land in the same
//! game. Groups are taken first-fit in join order until their member count
//! reaches the pool size. The matched groups are drained and the game is
//! created while the queue lock is still held, so two joins can never claim
//! the same player. Lock order is matchmaker then game registry; nothing
//! takes them the other way.
//!
//! PARTIES
//! =======
//! Every open queue socket is registered in the lobby. A party leader names
//! friends by account id; each must have a queue socket open and an accepted
//! friendship with the leader. A party leaves the queue together when any
//! member leaves or disconnects.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{MAX_MATCH_SIZE, MIN_MATCH_SIZE};
use crate::game::{AccountId, Seat};
use crate::protocol::{ErrorCode, ServerMessage};
use crate::services;
use crate::services::friends;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("game size must be between {MIN_MATCH_SIZE} and {MAX_MATCH_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("player {0} is already in the queue")]
    AlreadyQueued(AccountId),
    #[error("cannot queue on behalf of player {0}")]
    Forbidden(AccountId),
    #[error("party of {party} does not fit a game of {size}")]
    PartyTooLarge { party: usize, size: usize },
    #[error("player {0} is not connected to matchmaking")]
    PartyMemberOffline(AccountId),
    #[error("player {0} is not your friend")]
    NotFriends(AccountId),
    #[error("friend lookup failed: {0}")]
    Lookup(String),
}

impl ErrorCode for MatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSize(_) => "E_INVALID_MATCH_SIZE",
            Self::AlreadyQueued(_) => "E_ALREADY_QUEUED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::PartyTooLarge { .. } => "E_PARTY_TOO_LARGE",
            Self::PartyMemberOffline(_) => "E_PARTY_MEMBER_OFFLINE",
            Self::NotFriends(_) => "E_NOT_FRIENDS",
            Self::Lookup(_) => "E_DATABASE",
        }
    }
}

/// One waiting player and the socket to notify.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub user_id: AccountId,
    pub name: String,
    pub conn_id: Uuid,
    pub tx: mpsc::Sender<ServerMessage>,
}

/// Players that queue and match as one unit. The first member leads.
#[derive(Debug, Clone)]
pub struct QueueGroup {
    pub members: Vec<QueueEntry>,
}

impl QueueGroup {
    fn len(&self) -> usize {
        self.members.len()
    }

    fn contains(&self, user_id: AccountId) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

#[derive(Debug)]
pub enum Enqueued {
    /// Waiting; `queued` players are now in the pool for `size`.
    Waiting { size: usize, queued: usize },
    /// The pool filled. Entries are in join order.
    Matched(Vec<QueueEntry>),
}

/// What the joining socket is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Waiting { size: usize, queued: usize },
    Matched { game_id: Uuid },
}

// =============================================================================
// MATCHMAKER
// =============================================================================

#[derive(Debug)]
pub struct Matchmaker {
    pools: BTreeMap<usize, VecDeque<QueueGroup>>,
    /// Open queue sockets, whether or not they are queued.
    lobby: HashMap<AccountId, QueueEntry>,
    default_size: usize,
}

impl Matchmaker {
    #[must_use]
    pub fn new(default_size: usize) -> Self {
        Self { pools: BTreeMap::new(), lobby: HashMap::new(), default_size }
    }

    /// Record an open queue socket. A newer socket for the account replaces
    /// the older one.
    pub fn register(&mut self, entry: QueueEntry) {
        self.lobby.insert(entry.user_id, entry);
    }

    /// Forget a closed queue socket and drop its group from the queue, if the
    /// socket is still the account's current one.
    pub fn unregister(&mut self, user_id: AccountId, conn_id: Uuid) -> bool {
        if self.lobby.get(&user_id).is_some_and(|e| e.conn_id == conn_id) {
            self.lobby.remove(&user_id);
        }
        self.remove_connection(user_id, conn_id)
    }

    /// Lobby entries for the accounts a leader wants in their party. The
    /// leader and repeated ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `PartyMemberOffline` for an account without an open socket.
    pub fn party_members(&self, leader: AccountId, party: &[AccountId]) -> Result<Vec<QueueEntry>, MatchError> {
        let mut members: Vec<QueueEntry> = Vec::new();
        for &user_id in party {
            if user_id == leader || members.iter().any(|m| m.user_id == user_id) {
                continue;
            }
            let entry = self.lobby.get(&user_id).ok_or(MatchError::PartyMemberOffline(user_id))?;
            members.push(entry.clone());
        }
        Ok(members)
    }

    /// Add a solo entry to the pool for `target` (or the default size).
    ///
    /// # Errors
    ///
    /// See `enqueue_group`.
    pub fn enqueue(&mut self, entry: QueueEntry, target: Option<usize>) -> Result<Enqueued, MatchError> {
        self.enqueue_group(vec![entry], target)
    }

    /// Add a group to the pool for `target` (or the default size), then
    /// take a match out of that pool if one is complete.
    ///
    /// # Errors
    ///
    /// Rejects sizes outside 2-4, groups larger than the size, and groups
    /// with a member already waiting in any pool.
    pub fn enqueue_group(&mut self, members: Vec<QueueEntry>, target: Option<usize>) -> Result<Enqueued, MatchError> {
        let size = target.unwrap_or(self.default_size);
        if !(MIN_MATCH_SIZE..=MAX_MATCH_SIZE).contains(&size) {
            return Err(MatchError::InvalidSize(size));
        }
        if members.len() > size {
            return Err(MatchError::PartyTooLarge { party: members.len(), size });
        }
        if let Some(queued) = members.iter().find(|m| self.is_queued(m.user_id)) {
            return Err(MatchError::AlreadyQueued(queued.user_id));
        }

        let pool = self.pools.entry(size).or_default();
        pool.push_back(QueueGroup { members });
        match take_match(pool, size) {
            Some(matched) => Ok(Enqueued::Matched(matched)),
            None => Ok(Enqueued::Waiting { size, queued: pool.iter().map(QueueGroup::len).sum() }),
        }
    }

    /// Remove the group holding an account from whichever pool has it.
    pub fn remove(&mut self, user_id: AccountId) -> bool {
        self.remove_where(|e| e.user_id == user_id)
    }

    /// Remove an account's group only if it was queued from this connection.
    pub fn remove_connection(&mut self, user_id: AccountId, conn_id: Uuid) -> bool {
        self.remove_where(|e| e.user_id == user_id && e.conn_id == conn_id)
    }

    fn remove_where(&mut self, matches: impl Fn(&QueueEntry) -> bool) -> bool {
        for pool in self.pools.values_mut() {
            if let Some(index) = pool.iter().position(|g| g.members.iter().any(&matches)) {
                pool.remove(index);
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn is_queued(&self, user_id: AccountId) -> bool {
        self.pools.values().flatten().any(|g| g.contains(user_id))
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.pools.values().flatten().map(QueueGroup::len).sum()
    }
}

/// First-fit over the pool in join order. Drains and returns the members of
/// the chosen groups once they add up to exactly `size`.
fn take_match(pool: &mut VecDeque<QueueGroup>, size: usize) -> Option<Vec<QueueEntry>> {
    let mut picked = Vec::new();
    let mut count = 0;
    for (index, group) in pool.iter().enumerate() {
        if count + group.len() <= size {
            picked.push(index);
            count += group.len();
        }
        if count == size {
            break;
        }
    }
    if count < size {
        return None;
    }

    let mut groups: Vec<QueueGroup> = picked.iter().rev().filter_map(|&i| pool.remove(i)).collect();
    groups.reverse();
    Some(groups.into_iter().flat_map(|g| g.members).collect())
}

// =============================================================================
// SERVICE
// =============================================================================

/// Record an open queue socket so party leaders can pull it in.
pub async fn register(state: &AppState, entry: QueueEntry) {
    state.matchmaker.lock().await.register(entry);
}

/// Queue a player, with any `party` friends alongside; when the pool fills,
/// create the game and push `match_found` to every matched socket.
///
/// # Errors
///
/// See `Matchmaker::enqueue_group`; party members must also be online and
/// accepted friends of the joining player.
pub async fn join(
    state: &AppState,
    entry: QueueEntry,
    target: Option<usize>,
    party: &[AccountId],
) -> Result<JoinStatus, MatchError> {
    let user_id = entry.user_id;
    let mut members = vec![entry];
    if !party.is_empty() {
        let others = state.matchmaker.lock().await.party_members(user_id, party)?;
        for other in &others {
            let friends = friends::are_friends(&state.pool, user_id, other.user_id)
                .await
                .map_err(|e| MatchError::Lookup(e.to_string()))?;
            if !friends {
                return Err(MatchError::NotFriends(other.user_id));
            }
        }
        members.extend(others);
    }

    let mut matchmaker = state.matchmaker.lock().await;
    let party_size = members.len();
    let entries = match matchmaker.enqueue_group(members.clone(), target)? {
        Enqueued::Waiting { size, queued } => {
            drop(matchmaker);
            info!(user_id, party = party_size, size, queued, "matchmaking: group queued");
            let notice = ServerMessage::queue_status(format!("Player {user_id} queued you in their party"), queued);
            notify(&members[1..], &notice);
            return Ok(JoinStatus::Waiting { size, queued });
        }
        Enqueued::Matched(entries) => entries,
    };

    let seats: Vec<Seat> = entries
        .iter()
        .map(|e| Seat { user_id: e.user_id, name: e.name.clone() })
        .collect();
    let game = services::game::create_game(state, &seats).await;
    drop(matchmaker);

    notify(&entries, &ServerMessage::match_found(&game));
    info!(game_id = %game.id, players = seats.len(), "matchmaking: match found");
    Ok(JoinStatus::Matched { game_id: game.id })
}

fn notify(entries: &[QueueEntry], message: &ServerMessage) {
    for entry in entries {
        match entry.tx.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                warn!(user_id = entry.user_id, "matchmaking: message not delivered");
            }
        }
    }
}

/// Remove a player from the queue. Returns `false` if they were not queued.
pub async fn leave(state: &AppState, user_id: AccountId) -> bool {
    let removed = state.matchmaker.lock().await.remove(user_id);
    if removed {
        info!(user_id, "matchmaking: player left queue");
    }
    removed
}

/// Forget a closed socket and drop its queue entry, if it still owns one.
pub async fn leave_connection(state: &AppState, user_id: AccountId, conn_id: Uuid) {
    if state.matchmaker.lock().await.unregister(user_id, conn_id) {
        info!(user_id, %conn_id, "matchmaking: socket closed, removed from queue");
    }
}

#[cfg(test)]
#[path = "matchmaking_test.rs"]
mod tests;
