//! State management module for gomoku matches.
//!
//! This module provides the core state types:
//!
//! - `board` - Board grid, stones and win detection
//! - `rules` - Pluggable legality checks
//! - `game` - Turn order on top of the board
//! - `session` - Matches (roster, lock, broadcast) and the match registry
//! - `player` - Connection state machine
//! - `connection` - Per-connection request handling
//! - `protocol` - Client requests, server messages and the transport seam
//! - `config` - TOML configuration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             AppState                             │
//! │                                                                  │
//! │  ┌──────────────────────┐        ┌─────────────────────────────┐ │
//! │  │ Connection (per task)│  ───▶  │ MatchRegistry               │ │
//! │  │                      │        │   match_id → Arc<Match>     │ │
//! │  │ ConnectionState      │        └──────────────┬──────────────┘ │
//! │  │ Weak<Match>          │                       │                │
//! │  └──────────┬───────────┘                       ▼                │
//! │             │                   ┌─────────────────────────────┐  │
//! │             │  add / put /      │ Match                       │  │
//! │             └─────────────────▶ │   Mutex { Game, roster }    │  │
//! │                remove           │   Game = Board + RuleSet    │  │
//! │                                 └──────────────┬──────────────┘  │
//! │                                                │ Outbox          │
//! │                                                ▼                 │
//! │                                        Transport::deliver        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gomoku_state::state::{AppState, ClientRequest, GameConfig};
//!
//! let app = AppState::new(GameConfig::default())?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut conn = app.connect(Arc::new(tx));
//!
//! conn.handle(ClientRequest::from_json(r#"{"action": "Join", "id": "42"}"#)?).await?;
//! // ... on transport close:
//! conn.disconnect().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

pub mod board;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod player;
pub mod protocol;
pub mod rules;
pub mod session;

// Re-export commonly used types
pub use board::{
    Axis, Board, CellState, ParticipantRole, Position, Verdict, DEFAULT_BOARD_SIZE, WIN_LENGTH,
};
pub use config::GameConfig;
pub use connection::{deliver, Connection, ConnectionId};
pub use error::{
    ActionError, CapacityError, ConfigError, DeliveryError, MatchError, MoveError, RequestError,
};
pub use game::Game;
pub use player::{ConnectionEvent, ConnectionPhase, ConnectionState, InvalidTransition};
pub use protocol::{ClientRequest, Envelope, Outbox, ServerMessage, Transport, TransportHandle};
pub use rules::{CenterOpening, NoOverline, Rule, RuleKind, RuleSet, RuleViolation};
pub use session::{Departure, Match, MatchRegistry, MatchSummary, Participant, Peer};

/// Combined application state.
///
/// Owns the match registry and hands out connection ids. One per process;
/// share it behind an `Arc` between transport tasks.
#[derive(Debug)]
pub struct AppState {
    registry: Arc<MatchRegistry>,
    next_connection_id: AtomicU64,
}

impl AppState {
    /// Fails if `config` does not validate.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_registry(MatchRegistry::new(config)?))
    }

    fn with_registry(registry: MatchRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    /// Register a new transport connection.
    pub fn connect(&self, transport: TransportHandle) -> Connection {
        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        info!(connection = %id, "connection registered");
        Connection::new(id, transport, self.registry.clone())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_registry(MatchRegistry::default())
    }
}
