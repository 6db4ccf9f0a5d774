//! Per-connection coordination.
//!
//! A [`Connection`] is driven by the task that owns one transport. It turns
//! decoded requests into registry and match calls, then delivers whatever
//! messages those produce. Match state is only ever mutated under the
//! match's own lock; delivery happens after that lock is released.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::board::{ParticipantRole, Position};
use super::error::{ActionError, MatchError, RequestError};
use super::player::{ConnectionEvent, ConnectionPhase, ConnectionState};
use super::protocol::{ClientRequest, Outbox, ServerMessage, TransportHandle};
use super::session::{Match, MatchRegistry, Peer};

/// Opaque identifier of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Send every envelope in `outbox`, skipping `skip` if given.
///
/// A failed delivery is logged and otherwise ignored; the recipient's own
/// task will notice its transport closing. Returns how many were sent.
pub fn deliver(outbox: Outbox, skip: Option<ConnectionId>) -> usize {
    let mut delivered = 0;
    for envelope in outbox {
        if Some(envelope.to) == skip {
            continue;
        }
        match envelope.transport.deliver(envelope.message) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(connection = %envelope.to, error = %e, "delivery failed"),
        }
    }
    delivered
}

/// State and request handling for one connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,

    /// Display name; replaced by the name given on join
    name: String,

    transport: TransportHandle,

    registry: Arc<MatchRegistry>,

    state: ConnectionState,

    /// Lookup only. The registry owns the match.
    current: Weak<Match>,

    connected_at: Instant,
}

impl Connection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, transport: TransportHandle, registry: Arc<MatchRegistry>) -> Self {
        Self {
            id,
            name: format!("guest-{}", id),
            transport,
            registry,
            state: ConnectionState::new(),
            current: Weak::new(),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> &ConnectionPhase {
        self.state.phase()
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// The match this connection is bound to, if it still exists.
    pub fn current_match(&self) -> Option<Arc<Match>> {
        if self.state.is_in_match() {
            self.current.upgrade()
        } else {
            None
        }
    }

    fn peer(&self) -> Peer {
        Peer::new(self.id, self.name.clone(), self.transport.clone())
    }

    fn reply(&self, message: ServerMessage) {
        if let Err(e) = self.transport.deliver(message) {
            warn!(connection = %self.id, error = %e, "reply failed");
        }
    }

    /// Handle one decoded request.
    ///
    /// On error, the reason has already been sent back to this connection;
    /// it is returned as well for the caller's benefit. Move errors are
    /// not errors here: the match reports them itself.
    pub async fn handle(&mut self, request: ClientRequest) -> Result<(), RequestError> {
        debug!(connection = %self.id, action = request.name(), phase = %self.phase(), "request");
        self.drop_stale_binding();

        let result = match request {
            ClientRequest::Join { id, name, role } => self.join(id, name, role).await,
            ClientRequest::Put { location } => self.put(location).await,
            ClientRequest::Leave => self.leave().await,
        };

        if let Err(err) = &result {
            warn!(connection = %self.id, error = %err, "request refused");
            self.reply(ServerMessage::error(err));
        }
        result
    }

    async fn join(
        &mut self,
        id: Option<String>,
        name: Option<String>,
        role: Option<ParticipantRole>,
    ) -> Result<(), RequestError> {
        let joining = ConnectionEvent::Join {
            match_id: id.clone().unwrap_or_default(),
        };
        self.state.check(&joining).map_err(|e| e.action_error())?;

        let name = name.unwrap_or_else(|| self.name.clone());

        // A match can close between lookup and insertion when its last
        // participant leaves. The registry replaces closed entries, so the
        // next lookup yields a fresh match.
        let (game, outbox) = loop {
            let game = self.registry.join_or_create(id.as_deref()).await?;
            let peer = Peer::new(self.id, name.clone(), self.transport.clone());
            match game.add_participant(peer, role).await {
                Ok(outbox) => break (game, outbox),
                Err(MatchError::Closed) => {
                    debug!(connection = %self.id, match_id = %game.id(), "match closed during join, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };
        self.name = name;

        self.state
            .apply_mut(ConnectionEvent::Join {
                match_id: game.id().to_string(),
            })
            .map_err(|e| e.action_error())?;
        self.current = Arc::downgrade(&game);
        info!(connection = %self.id, match_id = %game.id(), name = %self.name, "joined match");

        deliver(outbox, None);
        Ok(())
    }

    async fn put(&mut self, location: Option<Position>) -> Result<(), RequestError> {
        let game = self.bound_match()?;
        let pos = location.ok_or(ActionError::MissingLocation)?;

        let outbox = game.put(&self.peer(), pos).await;
        deliver(outbox, None);
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), RequestError> {
        self.state
            .check(&ConnectionEvent::Leave)
            .map_err(|e| e.action_error())?;
        let game = self.bound_match()?;

        let departure = game.remove_participant(self.id).await;
        self.state
            .apply_mut(ConnectionEvent::Leave)
            .map_err(|e| e.action_error())?;
        self.current = Weak::new();
        info!(connection = %self.id, match_id = %game.id(), "left match");

        deliver(departure.outbox, None);
        if departure.emptied {
            self.registry.release(&game).await;
        }
        Ok(())
    }

    /// The transport closed.
    ///
    /// Removes this connection from its match and tells the others; nothing
    /// is sent to this connection. Releases the match if it is now empty.
    pub async fn disconnect(&mut self) {
        if self.state.is_closed() {
            return;
        }
        let game = self.current_match();
        if let Err(e) = self.state.apply_mut(ConnectionEvent::Disconnect) {
            warn!(connection = %self.id, error = %e, "disconnect transition refused");
            return;
        }
        self.current = Weak::new();

        let Some(game) = game else {
            info!(connection = %self.id, "connection closed, not in a match");
            return;
        };
        info!(connection = %self.id, match_id = %game.id(), "connection closed, dropping out of match");

        let departure = game.remove_participant(self.id).await;
        deliver(departure.outbox, Some(self.id));
        if departure.emptied {
            self.registry.release(&game).await;
        }
    }

    /// Fall back to `Unjoined` if the bound match no longer exists.
    fn drop_stale_binding(&mut self) {
        if !self.state.is_in_match() || self.current.upgrade().is_some() {
            return;
        }
        warn!(
            connection = %self.id,
            match_id = self.state.match_id().unwrap_or_default(),
            "bound match is gone, unbinding"
        );
        self.current = Weak::new();
        if let Err(e) = self.state.apply_mut(ConnectionEvent::Leave) {
            warn!(connection = %self.id, error = %e, "unbind transition refused");
        }
    }

    fn bound_match(&self) -> Result<Arc<Match>, ActionError> {
        match self.state.phase() {
            ConnectionPhase::Left => Err(ActionError::ConnectionClosed),
            ConnectionPhase::Unjoined => Err(ActionError::NotInMatch),
            ConnectionPhase::InMatch { .. } => {
                self.current.upgrade().ok_or(ActionError::NotInMatch)
            }
        }
    }
}
