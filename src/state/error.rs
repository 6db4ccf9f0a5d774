//! Error types for match state and connection coordination.
//!
//! Every error that can be reported back to a client renders its `reason`
//! string through `Display`, so the text a connection sees is defined here.

use std::path::PathBuf;

use super::connection::ConnectionId;

/// A placement that the engine refused. The board is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Invalid action: illegal position (out of range)")]
    OutOfRange,

    #[error("Invalid action: illegal position (occupied)")]
    Occupied,

    #[error("Invalid action: illegal player (observers cannot place stones)")]
    InvalidRole,

    #[error("Invalid action: illegal player (not your turn)")]
    WrongTurn,

    #[error("Invalid action: other rules ({rule}, code {code})")]
    RuleViolation { code: i32, rule: &'static str },

    #[error("Invalid action: Game has ended")]
    MatchEnded,
}

impl MoveError {
    /// Coarse category used when logging rejected moves.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRange | Self::Occupied => "illegal position",
            Self::InvalidRole | Self::WrongTurn => "illegal player",
            Self::RuleViolation { .. } => "other rules",
            Self::MatchEnded => "ended",
        }
    }
}

/// An action that is not valid for the connection's current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid action: already in game")]
    AlreadyInMatch,

    #[error("Invalid action: not in game")]
    NotInMatch,

    #[error("Bad request: no location specified")]
    MissingLocation,

    #[error("Invalid action: connection closed")]
    ConnectionClosed,
}

/// The registry could not produce a fresh match identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("Cannot join game: no free match id after {attempts} attempts")]
    IdsExhausted { attempts: u32 },
}

/// Roster-level failures of a single match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// Adding a connection that already sits in the roster. This is a caller bug.
    #[error("connection {0} is already in this match")]
    AlreadyInRoster(ConnectionId),

    /// The match emptied out and is being retired.
    #[error("Cannot join game: match is closing")]
    Closed,
}

/// Why a connection's request was refused. The same text is sent back to
/// the connection as an `Error` reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Transport handle refused a message (usually: the peer is gone).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("delivery to connection failed: {0}")]
pub struct DeliveryError(pub String);

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
