use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::channel::mpsc as duplex;
use futures::StreamExt;
use quizhub::config::RoomConfig;
use quizhub::connection::{CloseReason, Frame};
use quizhub::protocol::{ClientMessage, ServerMessage, Standing};
use quizhub::quiz::{InMemoryQuizSource, QuizError};
use quizhub::state::{AppState, JoinError};
use quizhub::types::{Question, Quiz, QuizOption, RoomPhase, RoomSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceExt;

fn question(id: &str, correct: usize) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {}", id),
        options: (0..3)
            .map(|i| QuizOption {
                id: format!("{}-{}", id, i),
                text: format!("Option {}", i),
                is_correct: i == correct,
            })
            .collect(),
    }
}

fn test_state() -> Arc<AppState> {
    let quizzes = InMemoryQuizSource::new([Quiz {
        id: "trivia".to_string(),
        title: "Friday Trivia".to_string(),
        questions: vec![question("first", 1), question("second", 2)],
    }]);

    let config = RoomConfig {
        question_duration: Duration::from_secs(10),
        idle_timeout: Duration::from_secs(300),
        ..RoomConfig::default()
    };

    Arc::new(AppState::new(Arc::new(quizzes), config))
}

/// In-memory participant: frames in, frames out, served by the real connection actor
struct TestClient {
    inbound: duplex::UnboundedSender<Frame>,
    outbound: duplex::UnboundedReceiver<Frame>,
    task: JoinHandle<Result<CloseReason, JoinError>>,
}

impl TestClient {
    async fn connect(state: &Arc<AppState>, room: &str, name: &str) -> Self {
        let (out_tx, out_rx) = duplex::unbounded::<Frame>();
        let (in_tx, in_rx) = duplex::unbounded::<Frame>();

        let state = state.clone();
        let room = room.to_string();
        let name = name.to_string();
        let task = tokio::spawn(async move {
            state
                .join_room(&room, &name, out_tx, in_rx.map(Ok::<_, duplex::SendError>))
                .await
        });

        let mut client = Self {
            inbound: in_tx,
            outbound: out_rx,
            task,
        };

        // Registration is complete once the roster snapshot arrives
        match client.next().await {
            ServerMessage::Participants(_) => client,
            other => panic!("Expected roster snapshot, got {:?}", other),
        }
    }

    fn send(&self, message: ClientMessage) {
        self.inbound
            .unbounded_send(Frame::Text(message.to_json()))
            .expect("Connection should accept frames");
    }

    fn join(&self, name: &str) {
        self.send(ClientMessage::Join {
            name: name.to_string(),
        });
    }

    fn answer(&self, name: &str, option_index: usize) {
        self.send(ClientMessage::Answer {
            name: name.to_string(),
            option_index,
        });
    }

    async fn next_text(&mut self) -> String {
        loop {
            match self.outbound.next().await {
                Some(Frame::Text(text)) => return text,
                Some(_) => continue,
                None => panic!("Connection closed while waiting for a message"),
            }
        }
    }

    async fn next(&mut self) -> ServerMessage {
        let text = self.next_text().await;
        serde_json::from_str(&text).expect("Broadcast should be valid JSON")
    }

    /// Skip countdown ticks until something else arrives; returns the ticks seen
    async fn next_after_timer(&mut self) -> (Vec<u64>, ServerMessage) {
        let mut ticks = Vec::new();
        loop {
            match self.next().await {
                ServerMessage::Timer(remaining) => ticks.push(remaining),
                other => return (ticks, other),
            }
        }
    }
}

fn standing(name: &str, score: u32) -> Standing {
    Standing {
        name: name.to_string(),
        score,
    }
}

async fn summary(state: &Arc<AppState>) -> RoomSummary {
    state
        .rooms
        .get("trivia")
        .await
        .expect("Room should exist")
        .summary()
        .await
        .expect("Room should be running")
}

/// End-to-end run of a two-question quiz
#[tokio::test(start_paused = true)]
async fn test_full_quiz_flow() {
    let state = test_state();

    // 1. Host and two players connect
    let mut host = TestClient::connect(&state, "trivia", "host").await;
    let mut alice = TestClient::connect(&state, "trivia", "alice").await;
    let mut bob = TestClient::connect(&state, "trivia", "bob").await;

    // 2. Players join and everyone sees the roster grow
    alice.join("alice");
    for client in [&mut host, &mut alice, &mut bob] {
        assert_eq!(
            client.next().await,
            ServerMessage::Participants(vec![standing("alice", 0)])
        );
    }

    bob.join("bob");
    for client in [&mut host, &mut alice, &mut bob] {
        assert_eq!(
            client.next().await,
            ServerMessage::Participants(vec![standing("alice", 0), standing("bob", 0)])
        );
    }

    // 3. Host starts: the first question goes out without answers
    host.send(ClientMessage::Start);
    for client in [&mut host, &mut alice, &mut bob] {
        let raw = client.next_text().await;
        assert!(!raw.contains("isCorrect"), "answer leaked: {}", raw);
        match serde_json::from_str::<ServerMessage>(&raw).unwrap() {
            ServerMessage::Question(q) => {
                assert_eq!(q.id, "first");
                assert_eq!(q.options.len(), 3);
            }
            other => panic!("Expected question, got {:?}", other),
        }
    }
    assert_eq!(summary(&state).await.question_index, 0);

    // 4. Alice answers right away, Bob after three seconds, and a wrong answer scores nothing
    alice.answer("alice", 1);
    tokio::time::sleep(Duration::from_millis(3_200)).await;
    bob.answer("bob", 1);
    bob.answer("alice", 0);

    // 5. Deadline closes the question
    let (ticks, message) = host.next_after_timer().await;
    assert_eq!(ticks, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    assert_eq!(
        message,
        ServerMessage::Leaderboard(vec![standing("alice", 1000), standing("bob", 700)])
    );
    assert_eq!(summary(&state).await.phase, RoomPhase::Leaderboard);

    // 6. Next question; nobody answers this time
    host.send(ClientMessage::NextQuestion);
    let (_, message) = host.next_after_timer().await;
    assert!(matches!(message, ServerMessage::Question(q) if q.id == "second"));

    let (_, message) = host.next_after_timer().await;
    assert!(matches!(message, ServerMessage::Leaderboard(_)));

    // 7. Past the last question the quiz ends exactly once
    host.send(ClientMessage::NextQuestion);
    let final_standings = vec![standing("alice", 1000), standing("bob", 700)];
    assert_eq!(
        host.next().await,
        ServerMessage::Leaderboard(final_standings.clone())
    );
    assert_eq!(host.next().await, ServerMessage::QuizEnd(final_standings));

    // Finished is terminal; the join afterwards is applied in order and fences the check
    host.send(ClientMessage::NextQuestion);
    host.send(ClientMessage::Start);
    host.join("zoe");
    assert_eq!(
        host.next().await,
        ServerMessage::Participants(vec![
            standing("alice", 1000),
            standing("bob", 700),
            standing("zoe", 0),
        ])
    );
    assert_eq!(summary(&state).await.phase, RoomPhase::Finished);

    // Players saw the same ending
    loop {
        if let ServerMessage::QuizEnd(standings) = alice.next().await {
            assert_eq!(standings[0], standing("alice", 1000));
            break;
        }
    }
    assert!(matches!(
        alice.next().await,
        ServerMessage::Participants(_)
    ));
}

#[tokio::test]
async fn test_unknown_quiz_is_rejected_before_registration() {
    let state = test_state();
    let (out_tx, _out_rx) = duplex::unbounded::<Frame>();
    let (_in_tx, in_rx) = duplex::unbounded::<Frame>();

    let result = state
        .join_room("nope", "alice", out_tx, in_rx.map(Ok::<_, duplex::SendError>))
        .await;

    match result {
        Err(JoinError::Quiz(QuizError::NotFound(id))) => assert_eq!(id, "nope"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(state.rooms.rooms().await.is_empty());
}

#[tokio::test]
async fn test_dropped_connection_keeps_participant() {
    let state = test_state();

    let alice = TestClient::connect(&state, "trivia", "alice").await;
    let mut bob = TestClient::connect(&state, "trivia", "bob").await;

    alice.join("alice");
    bob.next().await;

    // Alice's transport stops accepting writes
    let TestClient {
        inbound: _alice_in,
        outbound: alice_out,
        task: alice_task,
    } = alice;
    drop(alice_out);

    bob.join("bob");
    assert_eq!(
        bob.next().await,
        ServerMessage::Participants(vec![standing("alice", 0), standing("bob", 0)])
    );

    let reason = alice_task
        .await
        .expect("Connection task should not panic")
        .expect("Join should have succeeded");
    assert_eq!(reason, CloseReason::WriteFailed);

    // Unregistration re-broadcasts the roster, still including Alice
    assert_eq!(
        bob.next().await,
        ServerMessage::Participants(vec![standing("alice", 0), standing("bob", 0)])
    );

    let room = summary(&state).await;
    assert_eq!(room.connections, 1);
    assert_eq!(room.participants, 2);
}

#[tokio::test]
async fn test_late_connection_sees_current_roster() {
    let state = test_state();

    let first = TestClient::connect(&state, "trivia", "first").await;
    first.join("carol");
    first.join("dave");

    // Wait until both joins are applied
    while summary(&state).await.participants < 2 {
        tokio::task::yield_now().await;
    }

    let (out_tx, mut out_rx) = duplex::unbounded::<Frame>();
    let (_in_tx, in_rx) = duplex::unbounded::<Frame>();
    let state2 = state.clone();
    tokio::spawn(async move {
        state2
            .join_room("trivia", "late", out_tx, in_rx.map(Ok::<_, duplex::SendError>))
            .await
    });

    match out_rx.next().await {
        Some(Frame::Text(text)) => assert_eq!(
            serde_json::from_str::<ServerMessage>(&text).unwrap(),
            ServerMessage::Participants(vec![standing("carol", 0), standing("dave", 0)])
        ),
        other => panic!("Expected roster snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rooms_api() {
    let state = test_state();
    let client = TestClient::connect(&state, "trivia", "viewer").await;
    client.join("erin");
    while summary(&state).await.participants < 1 {
        tokio::task::yield_now().await;
    }

    let app = quizhub::router(state.clone());

    let response = app
        .clone()
        .oneshot(Request::get("/api/rooms").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let rooms: Vec<RoomSummary> = serde_json::from_slice(&body).unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].key, "trivia");
    assert_eq!(rooms[0].title, "Friday Trivia");
    assert_eq!(rooms[0].phase, RoomPhase::Waiting);
    assert_eq!(rooms[0].question_index, -1);
    assert_eq!(rooms[0].participants, 1);
    assert_eq!(rooms[0].connections, 1);

    let response = app
        .clone()
        .oneshot(Request::get("/api/rooms/trivia").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/api/rooms/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
