//! Connection state machine.
//!
//! Tracks whether a connection is in a match and validates transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐      join       ┌───────────┐
//! │   Unjoined   │────────────────▶│  InMatch  │
//! └──────┬───────┘◀────────────────└─────┬─────┘
//!        │              leave            │
//!        │ disconnect                    │ disconnect
//!        ▼                               │
//! ┌──────────────┐                       │
//! │     Left     │◀──────────────────────┘
//! └──────────────┘
//! ```
//!
//! `Left` is terminal: the transport is gone and nothing more is accepted.

use std::fmt;

use super::error::ActionError;

/// Where a connection currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Connected, not bound to any match
    #[default]
    Unjoined,

    /// Bound to a match
    InMatch { match_id: String },

    /// Transport closed
    Left,
}

impl ConnectionPhase {
    pub fn is_in_match(&self) -> bool {
        matches!(self, Self::InMatch { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Left)
    }

    /// Get the match ID if in a match.
    pub fn match_id(&self) -> Option<&str> {
        match self {
            Self::InMatch { match_id } => Some(match_id),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unjoined => write!(f, "Unjoined"),
            Self::InMatch { match_id } => write!(f, "InMatch({})", match_id),
            Self::Left => write!(f, "Left"),
        }
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Join { match_id: String },
    Leave,
    Disconnect,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ConnectionPhase,
    pub event: ConnectionEvent,
    pub reason: &'static str,
}

impl InvalidTransition {
    /// The error reported back to the client for this rejection.
    pub fn action_error(&self) -> ActionError {
        match self.from {
            ConnectionPhase::Unjoined => ActionError::NotInMatch,
            ConnectionPhase::InMatch { .. } => ActionError::AlreadyInMatch,
            ConnectionPhase::Left => ActionError::ConnectionClosed,
        }
    }
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Connection state machine.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    phase: ConnectionPhase,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    /// Check whether `event` would be accepted, without applying it.
    pub fn check(&self, event: &ConnectionEvent) -> Result<(), InvalidTransition> {
        self.transition(event).map(|_| ())
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: ConnectionEvent) -> Result<Self, InvalidTransition> {
        let phase = self.transition(&event)?;
        Ok(Self { phase })
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: ConnectionEvent) -> Result<(), InvalidTransition> {
        self.phase = self.transition(&event)?;
        Ok(())
    }

    fn transition(&self, event: &ConnectionEvent) -> Result<ConnectionPhase, InvalidTransition> {
        use ConnectionEvent::*;
        use ConnectionPhase::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.phase.clone(),
            event: event.clone(),
            reason,
        };

        match (&self.phase, event) {
            (Left, _) => Err(invalid("Connection closed")),

            (Unjoined, Join { match_id }) => Ok(InMatch {
                match_id: match_id.clone(),
            }),
            (InMatch { .. }, Join { .. }) => Err(invalid("Already in a match")),

            (InMatch { .. }, Leave) => Ok(Unjoined),
            (Unjoined, Leave) => Err(invalid("Not in a match")),

            (_, Disconnect) => Ok(Left),
        }
    }

    pub fn is_in_match(&self) -> bool {
        self.phase.is_in_match()
    }

    pub fn is_closed(&self) -> bool {
        self.phase.is_closed()
    }

    pub fn match_id(&self) -> Option<&str> {
        self.phase.match_id()
    }
}
