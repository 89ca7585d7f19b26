//! Integration tests for `MeridianClient`: real WebSocket login, the
//! hosted local server, reconnect backoff, and display-preference
//! persistence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use meridian::prelude::*;
use meridian_protocol::{Codec, Envelope, JsonCodec, Payload, SystemMessage};
use meridian_transport::Connection;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Minimal game
// =========================================================================

struct Tally;

impl GameModel for Tally {
    type State = u32;
    type Update = u32;
    type Intent = ();

    fn apply(state: &mut u32, update: u32) {
        *state += update;
    }
}

struct Idle;

impl Controller<Tally> for Idle {
    fn handle_intent(&mut self, _view: &SessionView<Tally>, _intent: ()) -> Vec<Action<Tally>> {
        Vec::new()
    }
}

impl InputHandler<Tally> for Idle {
    fn handle_message(&mut self, _view: &SessionView<Tally>, _data: &[u8]) -> Vec<Action<Tally>> {
        vec![Action::Apply(1)]
    }
}

fn handlers() -> PhaseHandlers<Tally> {
    PhaseHandlers::new(HandlerPair::new(Idle, Idle), HandlerPair::new(Idle, Idle))
}

fn resources() -> DisplayResources {
    DisplayResources::new(HeadlessPresenter::windowed_only())
}

// =========================================================================
// Helpers
// =========================================================================

fn ack(id: u64) -> Vec<u8> {
    JsonCodec
        .encode(&Envelope::system(
            1,
            0,
            SystemMessage::LoginAck {
                player_id: PlayerId(id),
                name: "ada".into(),
                administrator: false,
            },
        ))
        .unwrap()
}

fn rejection() -> Vec<u8> {
    JsonCodec
        .encode(&Envelope::system(
            1,
            0,
            SystemMessage::Error {
                code: 409,
                message: "slot taken".into(),
            },
        ))
        .unwrap()
}

/// A hosted server that answers the login with `answer`, then waits for
/// the shutdown signal and raises `stopped`.
fn local_server(answer: Vec<u8>, stopped: &Arc<AtomicBool>) -> LocalServer {
    let stopped = Arc::clone(stopped);
    LocalServer::spawn(move |link, shutdown| async move {
        link.recv().await.unwrap();
        link.send(&answer).await.unwrap();
        let _ = shutdown.await;
        stopped.store(true, Ordering::SeqCst);
    })
}

/// A one-shot WebSocket server that acknowledges the first login and
/// then holds the connection open until the client leaves.
async fn spawn_login_server(id: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("should accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should succeed");
        let first = ws.next().await.expect("frame").expect("frame ok");
        let envelope: Envelope = JsonCodec.decode(&first.into_data()).unwrap();
        assert!(matches!(
            envelope.payload,
            Payload::System(SystemMessage::Login { .. })
        ));
        ws.send(Message::Binary(ack(id).into())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    format!("ws://{addr}")
}

/// A URL nothing listens on.
async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

fn config_with_url(url: String) -> ClientConfig {
    ClientConfig {
        server_url: url,
        display: DisplayPreferences { windowed: true },
        ..ClientConfig::default()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_over_websocket_logs_in() {
    let url = spawn_login_server(11).await;
    let client = MeridianClientBuilder::new()
        .config(config_with_url(url))
        .start(resources(), handlers())
        .await
        .unwrap();

    let player = client.connect().await.expect("login should succeed");

    assert_eq!(player.id, PlayerId(11));
    let snap = client.session().snapshot().await.unwrap();
    assert_eq!(snap.state, ConnectionState::LoggedIn);
    assert!(!snap.single_player);

    let outcome = client.quit().await;
    assert!(outcome.graceful);
}

#[tokio::test]
async fn test_connect_local_owns_hosted_server_until_quit() {
    let mut client = MeridianClientBuilder::new()
        .config(config_with_url(dead_url().await))
        .start(resources(), handlers())
        .await
        .unwrap();
    let stopped = Arc::new(AtomicBool::new(false));

    let player = client
        .connect_local(local_server(ack(1), &stopped))
        .await
        .expect("local login should succeed");

    assert_eq!(player.id, PlayerId(1));
    assert!(client.session().is_single_player().await.unwrap());
    assert!(client.hosted_server().is_some_and(LocalServer::is_running));
    assert!(matches!(
        client.reconnect().await,
        Err(MeridianError::Session(SessionError::Precondition(_)))
    ));

    let outcome = client.quit().await;

    assert!(outcome.graceful);
    assert!(stopped.load(Ordering::SeqCst), "hosted server was told to stop");
}

#[tokio::test]
async fn test_connect_local_rejected_login_stops_server() {
    let mut client = MeridianClientBuilder::new()
        .start(resources(), handlers())
        .await
        .unwrap();
    let stopped = Arc::new(AtomicBool::new(false));

    let result = client.connect_local(local_server(rejection(), &stopped)).await;

    assert!(matches!(
        result,
        Err(MeridianError::Session(SessionError::LoginRejected {
            code: 409,
            ..
        }))
    ));
    assert!(client.hosted_server().is_none());
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_connect_while_logged_in_is_refused() {
    let mut client = MeridianClientBuilder::new()
        .config(config_with_url(dead_url().await))
        .start(resources(), handlers())
        .await
        .unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    client.connect_local(local_server(ack(2), &stopped)).await.unwrap();

    let again = client.connect().await;

    assert!(matches!(
        again,
        Err(MeridianError::Session(SessionError::Precondition(_)))
    ));
    assert!(client.session().is_logged_in().await.unwrap());
    assert!(client.hosted_server().is_some_and(LocalServer::is_running));
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let mut config = config_with_url(dead_url().await);
    config.session.reconnect = ReconnectPolicy {
        base_delay_ms: 1,
        max_delay_ms: 5,
        max_attempts: 2,
        jitter_ms: 0,
    };
    let client = MeridianClientBuilder::new()
        .config(config)
        .start(resources(), handlers())
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), client.reconnect())
        .await
        .expect("reconnect loop should end");

    assert!(matches!(
        result,
        Err(MeridianError::ReconnectExhausted { attempts: 2 })
    ));
}

#[tokio::test]
async fn test_display_fallback_is_written_to_config_file() {
    let path = std::env::temp_dir().join(format!(
        "meridian-client-fallback-{}.json",
        std::process::id()
    ));
    let config = ClientConfig {
        display: DisplayPreferences { windowed: false },
        ..ClientConfig::default()
    };

    let client = MeridianClientBuilder::new()
        .config(config)
        .config_path(&path)
        .start(resources(), handlers())
        .await
        .unwrap();

    assert!(client.config().display.windowed);
    let saved = ClientConfig::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(saved.display.windowed, "fallback persisted for the next run");
}

#[tokio::test]
async fn test_start_without_presenter_surface_fails() {
    let result = MeridianClientBuilder::new()
        .start(
            DisplayResources::new(
                HeadlessPresenter::windowed_only().refusing(DisplayMode::Windowed),
            ),
            handlers(),
        )
        .await;

    assert!(matches!(
        result,
        Err(MeridianError::Session(SessionError::Display(_)))
    ));
}
