//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own game-room state transitions, matchmaking, accounts,
//! friendships, and persistence so route handlers can stay focused on protocol
//! translation and auth plumbing.

pub mod auth;
pub mod dev;
pub mod friends;
pub mod game;
pub mod matchmaking;
pub mod persistence;
