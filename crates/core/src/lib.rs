#![warn(clippy::all, missing_docs)]

//! Core logic for the DuoChess terminal client.
//!
//! This crate hosts the game model on top of the `chess` rules engine, the
//! reconciliation of the shared backend row into local state, the backend
//! clients, configuration and local persistence. The terminal UI only draws
//! what these modules compute.

pub mod auth;
pub mod backend;
pub mod board;
pub mod chat;
pub mod clock;
pub mod config;
pub mod game;
pub mod history;
pub mod input;
pub mod models;
pub mod prefs;
pub mod reconcile;
pub mod snapshot;
pub mod sync;

pub use auth::{AuthError, IdentityStore, Roster, SessionGate};
pub use config::AppConfig;
pub use game::{ChessGame, Outcome};
pub use models::{ChatMessage, GamePatch, GameRecord, Identity};
pub use reconcile::{reconcile, GameState, Reconciled};
pub use sync::{SyncEvent, SyncHandle};
