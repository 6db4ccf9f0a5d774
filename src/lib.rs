//! Gomoku State Library
//!
//! This crate provides in-memory state for many concurrent five-in-a-row
//! matches served from one process.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Rule Engine** - Board, win detection on all four axes, turn order and
//!   pluggable legality rules.
//!
//! - **Matches** - Roster with role assignment, serialized mutation under a
//!   per-match lock, and the notifications each operation produces.
//!
//! - **Match Registry** - Find-or-create by id, generated ids, removal when a
//!   match empties.
//!
//! - **Connection Coordination** - One state machine per connection turning
//!   decoded requests into match operations and delivering the results.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - A connection can only join,
//!    play and leave in a valid order; anything else is rejected with a clear
//!    reason.
//!
//! 2. **Compute under the lock, deliver after** - Match operations return an
//!    outbox of messages; sending them never holds a match lock.
//!
//! 3. **No networking** - This crate is pure state. The transport layer plugs
//!    in through the `Transport` trait.
//!
//! 4. **Serialization-ready** - Requests and messages are JSON via serde.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gomoku_state::state::{AppState, ClientRequest, GameConfig, ServerMessage};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let app = AppState::new(GameConfig { board_size: 9, ..GameConfig::default() }).unwrap();
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let mut conn = app.connect(Arc::new(tx));
//!
//!     let join = ClientRequest::from_json(r#"{"action": "Join", "id": "42", "name": "alice"}"#).unwrap();
//!     conn.handle(join).await.unwrap();
//!     assert!(matches!(rx.try_recv().unwrap(), ServerMessage::SelfJoin { .. }));
//!
//!     conn.disconnect().await;
//!     assert!(app.registry().get("42").await.is_none());
//! });
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
