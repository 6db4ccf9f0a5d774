//! End-to-end flows through `AppState` and per-connection coordinators, the
//! way a transport layer would drive them.

use std::collections::BTreeMap;
use std::sync::Arc;

use gomoku_state::state::{
    ActionError, AppState, CellState, ClientRequest, Connection, ConnectionPhase, GameConfig,
    MoveError, ParticipantRole, Position, RequestError, RuleKind, ServerMessage,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

struct Client {
    conn: Connection,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn connect(app: &AppState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            conn: app.connect(Arc::new(tx)),
            rx,
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), RequestError> {
        let request = ClientRequest::from_json(text).unwrap();
        self.conn.handle(request).await
    }

    async fn put(&mut self, row: i32, col: i32) -> Result<(), RequestError> {
        self.conn
            .handle(ClientRequest::Put {
                location: Some(Position::new(row, col)),
            })
            .await
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

fn small_app() -> AppState {
    AppState::new(GameConfig {
        board_size: 5,
        ..GameConfig::default()
    })
    .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn placed(row: i32, col: i32, role: ParticipantRole, winning: bool) -> ServerMessage {
    ServerMessage::Placed {
        location: Position::new(row, col),
        role,
        winning,
    }
}

#[tokio::test]
async fn test_full_match_flow() {
    init_tracing();
    let app = small_app();
    let mut alice = Client::connect(&app);
    let mut bob = Client::connect(&app);
    let mut carol = Client::connect(&app);

    alice
        .send(r#"{"action": "Join", "id": "room", "name": "alice"}"#)
        .await
        .unwrap();
    assert_eq!(
        alice.drain(),
        vec![ServerMessage::SelfJoin {
            match_id: "room".to_string(),
            name: "alice".to_string(),
            role: ParticipantRole::Black,
            others: BTreeMap::new(),
            board: vec![vec![CellState::Empty; 5]; 5],
            next: ParticipantRole::Black,
        }]
    );

    bob.send(r#"{"action": "Join", "ID": "room", "name": "bob"}"#)
        .await
        .unwrap();
    assert_eq!(
        alice.drain(),
        vec![ServerMessage::PeerJoin {
            role: ParticipantRole::White,
            name: "bob".to_string()
        }]
    );
    match &bob.drain()[..] {
        [ServerMessage::SelfJoin { role, others, .. }] => {
            assert_eq!(*role, ParticipantRole::White);
            assert_eq!(
                others,
                &BTreeMap::from([("alice".to_string(), ParticipantRole::Black)])
            );
        }
        other => panic!("unexpected {:?}", other),
    }

    carol
        .send(r#"{"action": "Join", "id": "room", "name": "carol"}"#)
        .await
        .unwrap();
    alice.drain();
    bob.drain();
    match &carol.drain()[..] {
        [ServerMessage::SelfJoin { role, others, .. }] => {
            assert_eq!(*role, ParticipantRole::Observer);
            assert_eq!(others.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }

    // Black: row 0, White: row 1; Black completes the row on its fifth stone.
    for col in 0..4 {
        alice.put(0, col).await.unwrap();
        bob.put(1, col).await.unwrap();
    }
    for client in [&mut alice, &mut bob, &mut carol] {
        let msgs = client.drain();
        assert_eq!(msgs.len(), 8);
        assert_eq!(msgs[0], placed(0, 0, ParticipantRole::Black, false));
        assert_eq!(msgs[7], placed(1, 3, ParticipantRole::White, false));
    }

    alice.put(0, 4).await.unwrap();
    let win = placed(0, 4, ParticipantRole::Black, true);
    assert_eq!(alice.drain(), vec![win.clone()]);
    assert_eq!(bob.drain(), vec![win.clone()]);
    assert_eq!(carol.drain(), vec![win]);

    bob.put(1, 4).await.unwrap();
    assert_eq!(bob.drain(), vec![ServerMessage::error(MoveError::MatchEnded)]);
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_five_by_five_scenario() {
    let app = small_app();
    let mut black = Client::connect(&app);
    let mut white = Client::connect(&app);
    black
        .send(r#"{"action": "Join", "id": "g"}"#)
        .await
        .unwrap();
    white
        .send(r#"{"action": "Join", "id": "g"}"#)
        .await
        .unwrap();
    black.drain();
    white.drain();

    black.put(0, 0).await.unwrap();
    white.put(1, 0).await.unwrap();
    black.put(0, 1).await.unwrap();
    white.put(1, 1).await.unwrap();
    black.put(0, 2).await.unwrap();

    // same colour twice
    black.put(2, 2).await.unwrap();
    assert_eq!(
        black.drain().last(),
        Some(&ServerMessage::error(MoveError::WrongTurn))
    );

    white.put(0, 0).await.unwrap();
    assert_eq!(
        white.drain().last(),
        Some(&ServerMessage::error(MoveError::Occupied))
    );
    white.put(-1, 3).await.unwrap();
    assert_eq!(
        white.drain().last(),
        Some(&ServerMessage::error(MoveError::OutOfRange))
    );

    white.put(1, 2).await.unwrap();
    black.put(0, 3).await.unwrap();
    white.put(1, 3).await.unwrap();
    black.drain();
    white.drain();

    black.put(0, 4).await.unwrap();
    assert_eq!(
        white.drain(),
        vec![placed(0, 4, ParticipantRole::Black, true)]
    );

    let game = app.registry().get("g").await.unwrap();
    let board = game.board_snapshot().await;
    assert!(board[0].iter().all(|c| *c == CellState::Black));
    assert_eq!(board[1][4], CellState::Empty);
    assert!(game.is_ended().await);
}

#[tokio::test]
async fn test_match_lifecycle_in_registry() {
    let app = small_app();
    let mut alice = Client::connect(&app);
    let mut bob = Client::connect(&app);

    alice
        .send(r#"{"action": "Join", "id": "X"}"#)
        .await
        .unwrap();
    bob.send(r#"{"action": "Join", "id": "X"}"#).await.unwrap();
    alice.drain();
    bob.drain();

    alice.conn.disconnect().await;
    assert!(alice.drain().is_empty());
    assert_eq!(
        bob.drain(),
        vec![ServerMessage::PeerLeft {
            role: ParticipantRole::Black,
            name: format!("guest-{}", alice.conn.id()),
        }]
    );

    // still discoverable with one participant left
    let game = app.registry().get("X").await.unwrap();
    assert_eq!(game.participant_count().await, 1);

    // a newcomer takes the free black seat
    let mut carol = Client::connect(&app);
    carol
        .send(r#"{"action": "Join", "id": "X", "name": "carol"}"#)
        .await
        .unwrap();
    assert_eq!(
        game.role_of(carol.conn.id()).await,
        Some(ParticipantRole::Black)
    );

    bob.conn.disconnect().await;
    carol.send(r#"{"action": "Leave"}"#).await.unwrap();
    assert_eq!(carol.drain().last(), Some(&ServerMessage::SelfLeft));
    assert!(app.registry().get("X").await.is_none());
    assert!(game.is_closed());

    // the id is free for a fresh match
    carol
        .send(r#"{"action": "Join", "id": "X", "name": "carol"}"#)
        .await
        .unwrap();
    let fresh = app.registry().get("X").await.unwrap();
    assert!(!Arc::ptr_eq(&game, &fresh));
    assert_eq!(*carol.conn.phase(), ConnectionPhase::InMatch { match_id: "X".to_string() });
}

#[tokio::test]
async fn test_generated_match_id_can_be_shared() {
    let app = small_app();
    let mut host = Client::connect(&app);
    let mut guest = Client::connect(&app);

    host.send(r#"{"action": "Join", "name": "host"}"#)
        .await
        .unwrap();
    let match_id = match &host.drain()[..] {
        [ServerMessage::SelfJoin { match_id, .. }] => match_id.clone(),
        other => panic!("unexpected {:?}", other),
    };
    assert!(match_id.parse::<u64>().is_ok());

    guest
        .send(&format!(r#"{{"action": "Join", "id": "{}"}}"#, match_id))
        .await
        .unwrap();
    assert_eq!(
        host.drain(),
        vec![ServerMessage::PeerJoin {
            role: ParticipantRole::White,
            name: format!("guest-{}", guest.conn.id()),
        }]
    );
}

#[tokio::test]
async fn test_rejections_reach_only_the_caller() {
    let app = small_app();
    let mut alice = Client::connect(&app);
    let mut bob = Client::connect(&app);

    let err = alice.put(0, 0).await.unwrap_err();
    assert_eq!(err, RequestError::Action(ActionError::NotInMatch));
    assert_eq!(
        alice.drain(),
        vec![ServerMessage::error("Invalid action: not in game")]
    );

    alice.send(r#"{"action": "Join", "id": "r"}"#).await.unwrap();
    bob.send(r#"{"action": "Join", "id": "r"}"#).await.unwrap();
    alice.drain();
    bob.drain();

    let err = alice.send(r#"{"action": "Put"}"#).await.unwrap_err();
    assert_eq!(err, RequestError::Action(ActionError::MissingLocation));
    let err = alice
        .send(r#"{"action": "Join", "id": "other"}"#)
        .await
        .unwrap_err();
    assert_eq!(err, RequestError::Action(ActionError::AlreadyInMatch));
    assert_eq!(alice.drain().len(), 2);
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn test_configured_rules_apply_to_new_matches() {
    let app = AppState::new(GameConfig {
        board_size: 5,
        rules: vec![RuleKind::CenterOpening],
        ..GameConfig::default()
    })
    .unwrap();
    let mut alice = Client::connect(&app);
    alice.send(r#"{"action": "Join", "id": "c"}"#).await.unwrap();
    alice.drain();

    alice.put(0, 0).await.unwrap();
    match &alice.drain()[..] {
        [ServerMessage::Error { reason }] => assert!(reason.contains("center-opening")),
        other => panic!("unexpected {:?}", other),
    }

    alice.put(2, 2).await.unwrap();
    assert_eq!(
        alice.drain(),
        vec![placed(2, 2, ParticipantRole::Black, false)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_join_one_match() {
    init_tracing();
    let app = Arc::new(small_app());

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let mut client = Client::connect(&app);
                client
                    .send(r#"{"action": "Join", "id": "busy"}"#)
                    .await
                    .unwrap();
                let role = match client.drain().first() {
                    Some(ServerMessage::SelfJoin { role, .. }) => *role,
                    other => panic!("unexpected {:?}", other),
                };
                (client, role)
            })
        })
        .collect();

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap());
    }
    let count = |r| clients.iter().filter(|(_, role)| *role == r).count();
    assert_eq!(count(ParticipantRole::Black), 1);
    assert_eq!(count(ParticipantRole::White), 1);
    assert_eq!(count(ParticipantRole::Observer), 10);
    assert_eq!(app.registry().len().await, 1);

    let disconnects: Vec<_> = clients
        .into_iter()
        .map(|(mut client, _)| tokio::spawn(async move { client.conn.disconnect().await }))
        .collect();
    for handle in disconnects {
        handle.await.unwrap();
    }
    assert!(app.registry().is_empty().await);
}
