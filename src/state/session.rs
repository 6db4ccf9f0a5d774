//! Match sessions and the registry that owns them.
//!
//! A [`Match`] is one game plus its roster. Every operation on it takes the
//! match lock for the whole check-mutate-build-messages step, so two
//! operations on the same match never interleave. The messages come back
//! as an [`Outbox`]; delivering them is the caller's job and may happen
//! after the lock is released.
//!
//! The [`MatchRegistry`] maps ids to matches. Its lock only ever guards the
//! map itself and is never held while a match lock is taken.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::board::{CellState, ParticipantRole, Position};
use super::config::GameConfig;
use super::connection::ConnectionId;
use super::error::{CapacityError, ConfigError, MatchError, MoveError};
use super::game::Game;
use super::protocol::{Envelope, Outbox, ServerMessage, TransportHandle};

/// A connection as seen by a match: who it is and how to reach it.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: ConnectionId,
    pub name: String,
    pub transport: TransportHandle,
}

impl Peer {
    pub fn new(id: ConnectionId, name: impl Into<String>, transport: TransportHandle) -> Self {
        Self {
            id,
            name: name.into(),
            transport,
        }
    }

    fn envelope(&self, message: ServerMessage) -> Envelope {
        Envelope::new(self.id, self.transport.clone(), message)
    }
}

/// A roster entry.
#[derive(Debug, Clone)]
pub struct Participant {
    pub peer: Peer,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn name(&self) -> &str {
        &self.peer.name
    }
}

/// Result of removing a participant.
#[derive(Debug, Default)]
pub struct Departure {
    /// `PeerLeft` for everyone remaining plus `SelfLeft` for the leaver.
    pub outbox: Outbox,

    /// The leaver's role, if they were in the roster.
    pub role: Option<ParticipantRole>,

    /// The roster is now empty and the match has been closed.
    pub emptied: bool,
}

/// Point-in-time view of a match, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub id: String,
    pub black: Option<String>,
    pub white: Option<String>,
    pub observers: usize,
    pub stones: usize,
    pub ended: bool,
    pub next: ParticipantRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct MatchState {
    game: Game,
    ended: bool,
    roster: HashMap<ConnectionId, Participant>,
}

impl MatchState {
    fn holder_of(&self, role: ParticipantRole) -> Option<&Participant> {
        self.roster.values().find(|p| p.role == role)
    }

    /// Pick a role for a newcomer.
    ///
    /// No preference: first free colour, else observer. A taken colour or an
    /// explicit observer request yields observer.
    fn assign_role(&self, requested: Option<ParticipantRole>) -> ParticipantRole {
        let free = |role| self.holder_of(role).is_none();
        match requested {
            None if free(ParticipantRole::Black) => ParticipantRole::Black,
            None if free(ParticipantRole::White) => ParticipantRole::White,
            None | Some(ParticipantRole::Observer) => ParticipantRole::Observer,
            Some(colour) if free(colour) => colour,
            Some(_) => ParticipantRole::Observer,
        }
    }

    fn broadcast(&self, message: ServerMessage) -> Outbox {
        self.roster
            .values()
            .map(|p| p.peer.envelope(message.clone()))
            .collect()
    }
}

/// One game instance and its participants.
#[derive(Debug)]
pub struct Match {
    id: String,
    created_at: DateTime<Utc>,
    /// Set under the match lock once the roster empties; never cleared.
    closed: AtomicBool,
    state: Mutex<MatchState>,
}

impl Match {
    pub fn new(id: impl Into<String>, config: &GameConfig) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            closed: AtomicBool::new(false),
            state: Mutex::new(MatchState {
                game: Game::new(config.board_size, config.rule_set()),
                ended: false,
                roster: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The last participant left; the match will not accept anyone again.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Add a connection to the roster and build the join notifications.
    ///
    /// Fails without touching the roster if the connection is already in
    /// it, or if the match has been closed.
    pub async fn add_participant(
        &self,
        peer: Peer,
        requested: Option<ParticipantRole>,
    ) -> Result<Outbox, MatchError> {
        let mut state = self.state.lock().await;

        if self.is_closed() {
            debug!(match_id = %self.id, connection = %peer.id, "join refused, match closed");
            return Err(MatchError::Closed);
        }
        if state.roster.contains_key(&peer.id) {
            error!(
                match_id = %self.id,
                connection = %peer.id,
                "connection added to a roster it is already in"
            );
            return Err(MatchError::AlreadyInRoster(peer.id));
        }

        let role = state.assign_role(requested);

        let mut outbox = Vec::with_capacity(state.roster.len() + 1);
        let mut others = BTreeMap::new();
        for participant in state.roster.values() {
            outbox.push(participant.peer.envelope(ServerMessage::PeerJoin {
                role,
                name: peer.name.clone(),
            }));
            others.insert(participant.name().to_string(), participant.role);
        }
        outbox.push(peer.envelope(ServerMessage::SelfJoin {
            match_id: self.id.clone(),
            name: peer.name.clone(),
            role,
            others,
            board: state.game.board().snapshot(),
            next: state.game.next_to_move(),
        }));

        info!(
            match_id = %self.id,
            connection = %peer.id,
            name = %peer.name,
            %role,
            "participant joined"
        );
        state.roster.insert(
            peer.id,
            Participant {
                peer,
                role,
                joined_at: Utc::now(),
            },
        );

        Ok(outbox)
    }

    /// Place a stone on behalf of `caller`.
    ///
    /// Accepted stones are announced to the whole roster; anything else is
    /// an error for `caller` alone. A winning stone ends the match.
    pub async fn put(&self, caller: &Peer, pos: Position) -> Outbox {
        let mut state = self.state.lock().await;

        if state.ended {
            debug!(match_id = %self.id, connection = %caller.id, "put after match ended");
            return vec![caller.envelope(ServerMessage::error(MoveError::MatchEnded))];
        }

        // Not being in the roster is treated like observing.
        let role = state
            .roster
            .get(&caller.id)
            .map(|p| p.role)
            .unwrap_or(ParticipantRole::Observer);

        match state.game.down(role, pos) {
            Ok(verdict) => {
                let winning = verdict.is_winning();
                if winning {
                    state.ended = true;
                    info!(match_id = %self.id, %role, %pos, "match won");
                } else {
                    debug!(match_id = %self.id, %role, %pos, "stone placed");
                }
                state.broadcast(ServerMessage::Placed {
                    location: pos,
                    role,
                    winning,
                })
            }
            Err(err) => {
                debug!(
                    match_id = %self.id,
                    connection = %caller.id,
                    %role,
                    %pos,
                    kind = err.kind(),
                    "placement rejected"
                );
                vec![caller.envelope(ServerMessage::error(err))]
            }
        }
    }

    /// Remove a connection from the roster.
    ///
    /// Closes the match when the roster becomes empty; disposing of it is
    /// up to the caller.
    pub async fn remove_participant(&self, id: ConnectionId) -> Departure {
        let mut state = self.state.lock().await;

        let Some(leaver) = state.roster.remove(&id) else {
            warn!(match_id = %self.id, connection = %id, "remove for connection not in roster");
            return Departure::default();
        };

        let mut outbox = state.broadcast(ServerMessage::PeerLeft {
            role: leaver.role,
            name: leaver.peer.name.clone(),
        });
        outbox.push(leaver.peer.envelope(ServerMessage::SelfLeft));

        let emptied = state.roster.is_empty();
        if emptied {
            self.closed.store(true, Ordering::Release);
        }
        info!(
            match_id = %self.id,
            connection = %id,
            role = %leaver.role,
            remaining = state.roster.len(),
            "participant left"
        );

        Departure {
            outbox,
            role: Some(leaver.role),
            emptied,
        }
    }

    pub async fn role_of(&self, id: ConnectionId) -> Option<ParticipantRole> {
        self.state.lock().await.roster.get(&id).map(|p| p.role)
    }

    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.roster.len()
    }

    pub async fn is_ended(&self) -> bool {
        self.state.lock().await.ended
    }

    pub async fn board_snapshot(&self) -> Vec<Vec<CellState>> {
        self.state.lock().await.game.board().snapshot()
    }

    pub async fn summary(&self) -> MatchSummary {
        let state = self.state.lock().await;
        let name_of = |role| state.holder_of(role).map(|p| p.name().to_string());
        MatchSummary {
            id: self.id.clone(),
            black: name_of(ParticipantRole::Black),
            white: name_of(ParticipantRole::White),
            observers: state
                .roster
                .values()
                .filter(|p| p.role == ParticipantRole::Observer)
                .count(),
            stones: state.game.board().stone_count(),
            ended: state.ended,
            next: state.game.next_to_move(),
            created_at: self.created_at,
        }
    }
}

/// Process-wide lookup of matches by id.
#[derive(Debug)]
pub struct MatchRegistry {
    config: GameConfig,
    matches: Mutex<HashMap<String, Arc<Match>>>,
}

impl MatchRegistry {
    /// Create an empty registry. Fails if `config` does not validate.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: GameConfig) -> Self {
        Self {
            config,
            matches: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Find the match with `id`, or create one. Without an id, create a
    /// match under a freshly generated one.
    pub async fn join_or_create(&self, id: Option<&str>) -> Result<Arc<Match>, CapacityError> {
        match id {
            Some(id) => Ok(self.find_or_create(id).await),
            None => self.create_with_random_id().await,
        }
    }

    /// Lookup and creation happen under one lock acquisition, so concurrent
    /// callers with the same id always get the same match.
    ///
    /// A closed match still sitting under `id` is replaced.
    pub async fn find_or_create(&self, id: &str) -> Arc<Match> {
        let mut matches = self.matches.lock().await;
        if let Some(existing) = matches.get(id) {
            if !existing.is_closed() {
                return existing.clone();
            }
            debug!(match_id = id, "replacing closed match");
        }
        let created = Arc::new(Match::new(id, &self.config));
        matches.insert(id.to_string(), created.clone());
        info!(match_id = id, total = matches.len(), "match created");
        created
    }

    async fn create_with_random_id(&self) -> Result<Arc<Match>, CapacityError> {
        let attempts = self.config.id_attempts();
        for attempt in 1..=attempts {
            let id = self.random_id();
            let mut matches = self.matches.lock().await;
            if matches.contains_key(&id) {
                warn!(match_id = %id, attempt, "generated match id collided");
                continue;
            }
            let created = Arc::new(Match::new(id.clone(), &self.config));
            matches.insert(id.clone(), created.clone());
            info!(match_id = %id, total = matches.len(), "match created");
            return Ok(created);
        }

        warn!(attempts, "could not generate a free match id");
        Err(CapacityError::IdsExhausted { attempts })
    }

    fn random_id(&self) -> String {
        let raw: u64 = rand::thread_rng().gen();
        let masked = match self.config.id_bits {
            bits if bits >= 64 => raw,
            bits => raw & ((1u64 << bits) - 1),
        };
        masked.to_string()
    }

    /// Get a match by id.
    pub async fn get(&self, id: &str) -> Option<Arc<Match>> {
        self.matches.lock().await.get(id).cloned()
    }

    /// Remove a match by id. Removing a missing id is a no-op.
    pub async fn remove(&self, id: &str) -> Option<Arc<Match>> {
        let removed = self.matches.lock().await.remove(id);
        if removed.is_some() {
            info!(match_id = id, "match removed");
        }
        removed
    }

    /// Remove `game` if it is still the match registered under its id.
    ///
    /// Used when a roster empties: a newer match that took over the id in
    /// the meantime is left alone.
    pub async fn release(&self, game: &Arc<Match>) -> bool {
        let mut matches = self.matches.lock().await;
        match matches.get(game.id()) {
            Some(current) if Arc::ptr_eq(current, game) => {
                matches.remove(game.id());
                info!(match_id = %game.id(), total = matches.len(), "match removed");
                true
            }
            _ => false,
        }
    }

    /// Count matches.
    pub async fn len(&self) -> usize {
        self.matches.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.lock().await.is_empty()
    }

    /// Get all match IDs.
    pub async fn ids(&self) -> Vec<String> {
        self.matches.lock().await.keys().cloned().collect()
    }

    /// Summaries of every registered match, sorted by id.
    pub async fn summaries(&self) -> Vec<MatchSummary> {
        // Snapshot the map first so no match lock is taken under ours.
        let matches: Vec<Arc<Match>> = self.matches.lock().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(matches.len());
        for game in matches {
            summaries.push(game.summary().await);
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::with_valid_config(GameConfig::default())
    }
}
