//! Messages exchanged with the transport layer.
//!
//! The transport decodes client text into [`ClientRequest`] and encodes
//! [`ServerMessage`] back to text. Both are JSON objects discriminated by
//! an `action` field. Delivery itself goes through the [`Transport`] trait,
//! so this crate never touches a socket.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::board::{CellState, ParticipantRole, Position};
use super::connection::ConnectionId;
use super::error::DeliveryError;

/// A decoded request from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientRequest {
    /// Join a match by id, or a freshly created one when `id` is absent.
    Join {
        #[serde(default, alias = "ID", skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Preferred colour. Falls back to observer when taken.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<ParticipantRole>,
    },

    /// Place a stone.
    Put {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Position>,
    },

    /// Leave the current match but keep the connection open.
    Leave,
}

impl ClientRequest {
    /// Decode a request from client text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "Join",
            Self::Put { .. } => "Put",
            Self::Leave => "Leave",
        }
    }
}

/// A message produced for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ServerMessage {
    Error {
        reason: String,
    },

    /// Sent to a connection that just joined.
    SelfJoin {
        #[serde(rename = "matchId")]
        match_id: String,
        name: String,
        role: ParticipantRole,
        /// Names of everyone already in the match and their roles.
        others: BTreeMap<String, ParticipantRole>,
        board: Vec<Vec<CellState>>,
        next: ParticipantRole,
    },

    /// Sent to existing participants when someone joins.
    PeerJoin {
        role: ParticipantRole,
        name: String,
    },

    /// Sent to every participant, mover included, after an accepted stone.
    Placed {
        location: Position,
        role: ParticipantRole,
        winning: bool,
    },

    PeerLeft {
        role: ParticipantRole,
        name: String,
    },

    SelfLeft,
}

impl ServerMessage {
    pub fn error(reason: impl fmt::Display) -> Self {
        Self::Error {
            reason: reason.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Convert to JSON for sending to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"action": "Error", "reason": e.to_string()})
        })
    }
}

/// Outbound half of a connection, owned by the transport layer.
pub trait Transport: Send + Sync + fmt::Debug {
    fn deliver(&self, message: ServerMessage) -> Result<(), DeliveryError>;
}

impl Transport for mpsc::UnboundedSender<ServerMessage> {
    fn deliver(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.send(message)
            .map_err(|e| DeliveryError(format!("receiver dropped: {:?}", e.0)))
    }
}

/// Shared handle to a connection's transport.
pub type TransportHandle = Arc<dyn Transport>;

/// One message addressed to one connection.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: ConnectionId,
    pub transport: TransportHandle,
    pub message: ServerMessage,
}

impl Envelope {
    pub fn new(to: ConnectionId, transport: TransportHandle, message: ServerMessage) -> Self {
        Self {
            to,
            transport,
            message,
        }
    }
}

/// Messages produced by one match operation, in no particular order.
pub type Outbox = Vec<Envelope>;
