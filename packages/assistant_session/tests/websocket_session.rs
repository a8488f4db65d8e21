//! End-to-end session tests: a real client transport against a loopback
//! WebSocket server that plays the assistant service's side of the protocol.

use std::future::Future;
use std::time::Duration;

use assistant_session::{
    Author, ConnectionStatus, SessionHandle, SessionOptions, SessionView, SubmitError,
    spawn_session, welcome_message,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// Timeout for each async operation in tests.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

type ServerSocket = WebSocketStream<TcpStream>;

/// Accept one client and run `script` against it. Returns the URL to dial and
/// the server task, which tests join so server-side assertions count.
async fn start_server<F, Fut>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        script(ws).await;
    });
    (format!("ws://{addr}/ws"), task)
}

async fn send_json(ws: &mut ServerSocket, json: &str) {
    ws.send(Message::Text(json.to_string().into())).await.unwrap();
}

async fn next_text(ws: &mut ServerSocket) -> String {
    loop {
        match timeout(TEST_TIMEOUT, ws.next()).await.expect("server read timed out") {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(Message::Close(_))) | None => panic!("client closed before sending text"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("server read failed: {e}"),
        }
    }
}

/// Read until the client closes; any text frame is a test failure.
async fn expect_no_more_text(ws: &mut ServerSocket) {
    loop {
        match timeout(TEST_TIMEOUT, ws.next()).await.expect("server read timed out") {
            Some(Ok(Message::Text(text))) => panic!("unexpected frame: {text}"),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(_)) => continue,
        }
    }
}

async fn wait_for(
    handle: &SessionHandle,
    mut predicate: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    let mut rx = handle.subscribe();
    let view = timeout(TEST_TIMEOUT, rx.wait_for(|v| predicate(v)))
        .await
        .expect("timed out waiting for session state")
        .expect("session actor stopped")
        .clone();
    view
}

#[tokio::test]
async fn test_meeting_flow_over_websocket() {
    let (url, server) = start_server(|mut ws| async move {
        assert_eq!(next_text(&mut ws).await, r#"{"text":"hello"}"#);
        send_json(
            &mut ws,
            r#"{"role":"assistant","response_type":"connection_progress","text":"Logging in..."}"#,
        )
        .await;
        send_json(
            &mut ws,
            r#"{"response_type":"connection_progress","text":"Ready","gm_link":"https://meet.example/abc"}"#,
        )
        .await;
        assert_eq!(next_text(&mut ws).await, r#"{"text":"ok"}"#);
        send_json(&mut ws, r#"{"response_type":"error","text":"boom"}"#).await;
        ws.close(None).await.unwrap();
    })
    .await;

    let session = spawn_session(url, SessionOptions::default());

    let view = wait_for(&session, |v| v.status == ConnectionStatus::Open).await;
    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].body, welcome_message());
    assert!(view.input_enabled);

    let id = session.submit("hello").await.unwrap();
    assert_eq!(id, 2);

    let view = wait_for(&session, |v| {
        v.entries.iter().any(|e| e.action_link.is_some())
    })
    .await;
    assert!(view.progress.is_none());
    assert!(view.input_enabled);
    let linked = view.entries.last().unwrap();
    assert_eq!(linked.body, "Ready");
    assert_eq!(
        linked.action_link.as_deref(),
        Some("https://meet.example/abc")
    );

    session.submit("ok").await.unwrap();

    let view = wait_for(&session, |v| v.status == ConnectionStatus::Closed).await;
    assert!(view.progress.is_none());
    assert!(!view.input_enabled);
    let bodies: Vec<&str> = view.entries.iter().map(|e| e.body.as_str()).collect();
    assert_eq!(&bodies[1..], &["hello", "Ready", "ok", "An error occurred: boom"]);

    assert_eq!(
        session.submit("anyone there?").await,
        Err(SubmitError::NotOpen(ConnectionStatus::Closed))
    );

    server.await.unwrap();
}

#[tokio::test]
async fn test_submit_is_gated_during_progress() {
    let (url, server) = start_server(|mut ws| async move {
        send_json(
            &mut ws,
            r#"{"response_type":"connection_progress","text":"container_starting: The container is starting up"}"#,
        )
        .await;
        expect_no_more_text(&mut ws).await;
    })
    .await;

    let session = spawn_session(url, SessionOptions::default());
    let view = wait_for(&session, |v| v.progress.is_some()).await;
    assert!(!view.input_enabled);
    assert_eq!(view.entries.len(), 1);

    assert_eq!(
        session.submit("let me in").await,
        Err(SubmitError::InputDisabled)
    );
    assert_eq!(session.view().entries.len(), 1);

    assert!(session.shutdown().await);
    server.await.unwrap();
}

#[tokio::test]
async fn test_unknown_frames_do_not_disturb_session() {
    let (url, server) = start_server(|mut ws| async move {
        send_json(&mut ws, "not json at all").await;
        send_json(&mut ws, r#"{"response_type":"typing","text":"..."}"#).await;
        ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
        send_json(
            &mut ws,
            r#"{"response_type":"assistant_response","text":"still here"}"#,
        )
        .await;
        expect_no_more_text(&mut ws).await;
    })
    .await;

    let session = spawn_session(url, SessionOptions::default());
    let view = wait_for(&session, |v| v.entries.len() == 2).await;
    assert_eq!(view.status, ConnectionStatus::Open);
    assert_eq!(view.entries[1].author, Author::Assistant);
    assert_eq!(view.entries[1].body, "still here");

    session.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_user_turn_precedes_its_reply() {
    let (url, server) = start_server(|mut ws| async move {
        let frame = next_text(&mut ws).await;
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        let reply = serde_json::json!({
            "response_type": "assistant_response",
            "text": format!("echo: {}", value["text"].as_str().unwrap()),
        });
        send_json(&mut ws, &reply.to_string()).await;
        expect_no_more_text(&mut ws).await;
    })
    .await;

    let session = spawn_session(url, SessionOptions::default());
    wait_for(&session, |v| v.input_enabled).await;

    let user_id = session.submit("ping").await.unwrap();
    let view = wait_for(&session, |v| v.entries.len() == 3).await;
    assert_eq!(view.entries[1].id, user_id);
    assert_eq!(view.entries[1].author, Author::User);
    assert_eq!(view.entries[2].body, "echo: ping");
    assert!(view.entries[2].id > user_id);

    session.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (url, server) = start_server(|mut ws| async move {
        expect_no_more_text(&mut ws).await;
    })
    .await;

    let session = spawn_session(url, SessionOptions::default());
    wait_for(&session, |v| v.status == ConnectionStatus::Open).await;

    assert!(session.shutdown().await);
    assert!(!session.shutdown().await);
    assert_eq!(session.view().status, ConnectionStatus::Closed);
    assert_eq!(session.submit("late").await, Err(SubmitError::SessionGone));

    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_service_closes_without_log() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = spawn_session(format!("ws://{addr}/ws"), SessionOptions::default());
    timeout(TEST_TIMEOUT, session.closed())
        .await
        .expect("session never closed");

    let view = session.view();
    assert_eq!(view.status, ConnectionStatus::Closed);
    assert!(view.entries.is_empty());
    assert!(!view.input_enabled);
}
