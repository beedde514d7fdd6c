#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! socket.io transport against a local WebSocket server that speaks the
//! Engine.IO v3 framing the way Volumio does.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use volumio_speakers_bridge::adapters::socketio::SocketIoConnector;
use volumio_speakers_bridge::channel::{Channel, Connector, LifecycleEvent, ReconnectPolicy};
use volumio_speakers_bridge::protocol::{EVENT_GET_STATE, EVENT_PUSH_STATE};

const OPEN_FRAME: &str =
    r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#;

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client should connect")
        .unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    ws.send(Message::Text(OPEN_FRAME.into())).await.unwrap();
    ws.send(Message::Text("40".into())).await.unwrap();
    ws
}

/// Next text frame that is not a ping
async fn next_text(ws: &mut WebSocketStream<tokio::net::TcpStream>) -> Option<String> {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next()).await.ok()??.ok()?;
        if let Message::Text(text) = message {
            let text = text.as_str().to_string();
            if text != "2" {
                return Some(text);
            }
        }
    }
}

struct Wired {
    channel: Box<dyn Channel>,
    states: mpsc::Receiver<Value>,
    lifecycle: mpsc::Receiver<LifecycleEvent>,
}

fn open_channel(port: u16, policy: ReconnectPolicy) -> Wired {
    let connector = SocketIoConnector::new(policy);
    let mut channel = connector.open("127.0.0.1", port).unwrap();

    let (state_tx, states) = mpsc::channel(16);
    channel.on(
        EVENT_PUSH_STATE,
        Box::new(move |payload| {
            let _ = state_tx.try_send(payload);
        }),
    );
    let (lifecycle_tx, lifecycle) = mpsc::channel(16);
    channel.on_lifecycle(Box::new(move |event| {
        let _ = lifecycle_tx.try_send(event.clone());
    }));
    channel.connect();

    Wired {
        channel,
        states,
        lifecycle,
    }
}

async fn expect_lifecycle<F>(rx: &mut mpsc::Receiver<LifecycleEvent>, predicate: F) -> LifecycleEvent
where
    F: Fn(&LifecycleEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("lifecycle channel open");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("lifecycle event should arrive")
}

fn fast_policy(max_attempts: Option<u32>) -> ReconnectPolicy {
    ReconnectPolicy::new(
        Duration::from_millis(20),
        Duration::from_millis(50),
        max_attempts,
    )
}

#[tokio::test]
async fn handshake_request_and_push() {
    let (listener, port) = listen().await;
    let mut wired = open_channel(port, fast_policy(None));

    let mut ws = accept(&listener).await;
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::Connected).await;

    wired.channel.emit(EVENT_GET_STATE, None).unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some(r#"42["getState"]"#));

    ws.send(Message::Text(
        r#"42["pushState",{"status":"play","volume":31,"mute":false}]"#.into(),
    ))
    .await
    .unwrap();
    let state = timeout(Duration::from_secs(5), wired.states.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state, json!({ "status": "play", "volume": 31, "mute": false }));

    wired.channel.close();
}

#[tokio::test]
async fn frames_emitted_before_open_are_delivered_after() {
    let (listener, port) = listen().await;
    let mut wired = open_channel(port, fast_policy(None));

    // Queued while the socket is still connecting
    wired.channel.emit("volume", Some(json!(40))).unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(next_text(&mut ws).await.as_deref(), Some(r#"42["volume",40]"#));
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::Connected).await;

    wired.channel.close();
}

#[tokio::test]
async fn server_ping_is_answered() {
    let (listener, port) = listen().await;
    let wired = open_channel(port, fast_policy(None));

    let mut ws = accept(&listener).await;
    ws.send(Message::Text("2probe".into())).await.unwrap();
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("3probe"));

    drop(wired);
}

#[tokio::test]
async fn reconnects_after_server_drop() {
    let (listener, port) = listen().await;
    let mut wired = open_channel(port, fast_policy(None));

    let ws = accept(&listener).await;
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::Connected).await;
    drop(ws);

    expect_lifecycle(&mut wired.lifecycle, |e| {
        matches!(e, LifecycleEvent::Disconnected { .. })
    })
    .await;
    expect_lifecycle(&mut wired.lifecycle, |e| {
        matches!(e, LifecycleEvent::ReconnectAttempt { attempt: 1 })
    })
    .await;

    let _ws = accept(&listener).await;
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::Connected).await;

    wired.channel.close();
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    // Grab a port nobody listens on
    let (listener, port) = listen().await;
    drop(listener);

    let mut wired = open_channel(port, fast_policy(Some(2)));

    expect_lifecycle(&mut wired.lifecycle, |e| {
        matches!(e, LifecycleEvent::ConnectError { .. })
    })
    .await;
    expect_lifecycle(&mut wired.lifecycle, |e| {
        matches!(e, LifecycleEvent::ReconnectError { .. })
    })
    .await;
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::ReconnectFailed).await;

    wired.channel.close();
}

#[tokio::test]
async fn no_handler_runs_after_close() {
    let (listener, port) = listen().await;
    let mut wired = open_channel(port, fast_policy(None));

    let mut ws = accept(&listener).await;
    expect_lifecycle(&mut wired.lifecycle, |e| *e == LifecycleEvent::Connected).await;

    wired.channel.close();
    assert!(wired.channel.is_closed());
    assert!(wired.channel.emit(EVENT_GET_STATE, None).is_err());

    // The server may still manage to push something; nobody may see it
    let _ = ws
        .send(Message::Text(r#"42["pushState",{"status":"stop"}]"#.into()))
        .await;
    let late = timeout(Duration::from_millis(200), wired.states.recv()).await;
    assert!(
        !matches!(late, Ok(Some(_))),
        "handler ran after close: {:?}",
        late
    );
}
