//! End-to-end tests of the websocket runtime against a local server.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use ridelink_client::Runtime;
use ridelink_core::{ConnectionState, Listener, ManagerConfig, Role, SharedToken};
use ridelink_proto::{Endpoint, EventKind, Location};
use serde_json::{Value, json};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_tungstenite::tungstenite::{
    Message,
    handshake::server::{ErrorResponse, Request, Response},
};

const WAIT: Duration = Duration::from_secs(5);

fn config_for(port: u16) -> ManagerConfig {
    let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/ws/rides/")).unwrap();
    ManagerConfig {
        connection_timeout: Duration::from_secs(2),
        ..ManagerConfig::with_endpoint(endpoint)
    }
}

/// Read an HTTP upgrade request off `stream` without answering it.
async fn read_upgrade_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut buf).await.unwrap();
        assert!(read > 0, "client hung up before sending its request");
        request.extend_from_slice(&buf[..read]);
    }
}

fn forward(events: &mpsc::UnboundedSender<Value>) -> Listener {
    let events = events.clone();
    Listener::new(move |payload| {
        let _ = events.send(payload.clone());
    })
}

#[tokio::test]
async fn connects_exchanges_frames_and_disconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (uri_tx, uri_rx) = oneshot::channel();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let capture = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(request.uri().to_string());
            Ok(response)
        };
        let socket = tokio_tungstenite::accept_hdr_async(stream, capture).await.unwrap();
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(
            json!({"type": "trip_request", "payload": {"trip_id": "t1"}}).to_string().into(),
        ))
        .await
        .unwrap();

        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    let _ = frames_tx.send(Message::Text(text));
                },
                Message::Close(frame) => {
                    let _ = frames_tx.send(Message::Close(frame));
                    break;
                },
                _ => {},
            }
        }
    });

    let (runtime, handle) =
        Runtime::websocket(config_for(port), SharedToken::new("secret token")).unwrap();
    let task = runtime.spawn();

    let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
    let (trip_tx, mut trip_rx) = mpsc::unbounded_channel();
    handle.add_event_listener(EventKind::Connect, forward(&connect_tx)).await.unwrap();
    handle.add_event_listener(EventKind::TripRequest, forward(&trip_tx)).await.unwrap();

    assert!(handle.initialize("u1", Role::Rider).await.unwrap());

    let uri = timeout(WAIT, uri_rx).await.unwrap().unwrap();
    assert_eq!(uri, "/ws/rides/?token=secret+token");

    timeout(WAIT, connect_rx.recv()).await.unwrap().unwrap();
    assert!(handle.is_connected().await.unwrap());

    let trip = timeout(WAIT, trip_rx.recv()).await.unwrap().unwrap();
    assert_eq!(trip, json!({"trip_id": "t1"}));

    assert!(handle.update_location(Location::new(1.0, 2.0)).await.unwrap());
    let frame = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    let Message::Text(text) = frame else { panic!("expected a text frame") };
    let sent: Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(
        sent,
        json!({"type": "location_update", "payload": {"latitude": 1.0, "longitude": 2.0}})
    );

    handle.disconnect().await.unwrap();
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Closed);

    let frame = timeout(WAIT, frames_rx.recv()).await.unwrap().unwrap();
    let Message::Close(Some(close)) = frame else { panic!("expected a close frame") };
    assert_eq!(u16::from(close.code), 1000);
    assert_eq!(close.reason.as_str(), "Client disconnecting");

    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_schedules_reconnect() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let (runtime, handle) = Runtime::websocket(config_for(port), SharedToken::new("t")).unwrap();
    let task = runtime.spawn();

    let (attempt_tx, mut attempt_rx) = mpsc::unbounded_channel();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
    handle.add_event_listener(EventKind::ReconnectAttempt, forward(&attempt_tx)).await.unwrap();
    handle.add_event_listener(EventKind::Disconnect, forward(&disconnect_tx)).await.unwrap();

    assert!(handle.initialize("u1", Role::Rider).await.unwrap());

    let error = timeout(WAIT, disconnect_rx.recv()).await.unwrap().unwrap();
    assert_eq!(error, json!({"error": true}));
    let close = timeout(WAIT, disconnect_rx.recv()).await.unwrap().unwrap();
    assert_eq!(close["code"], 1006);

    let attempt = timeout(WAIT, attempt_rx.recv()).await.unwrap().unwrap();
    assert_eq!(attempt["attempt"], 1);
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Reconnecting);

    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn reconnect_abandons_the_pending_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (pending_tx, pending_rx) = oneshot::channel();

    let server = tokio::spawn(async move {
        // First upgrade is left unanswered; the second is accepted.
        let (mut pending, _) = listener.accept().await.unwrap();
        read_upgrade_request(&mut pending).await;
        let _ = pending_tx.send(());

        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        (pending, socket)
    });

    let config = ManagerConfig { connection_timeout: Duration::from_secs(30), ..config_for(port) };
    let (runtime, handle) = Runtime::websocket(config, SharedToken::new("t")).unwrap();
    let task = runtime.spawn();

    let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
    handle.add_event_listener(EventKind::Connect, forward(&connect_tx)).await.unwrap();

    assert!(handle.initialize("u1", Role::Rider).await.unwrap());
    timeout(WAIT, pending_rx).await.unwrap().unwrap();
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Connecting);

    assert!(handle.connect().await.unwrap());
    timeout(WAIT, connect_rx.recv()).await.unwrap().unwrap();
    let (mut pending, _socket) = timeout(WAIT, server).await.unwrap().unwrap();

    // The replaced channel hangs up long before its own handshake timeout.
    let mut buf = [0u8; 64];
    let read = timeout(Duration::from_secs(1), pending.read(&mut buf)).await.unwrap();
    assert_eq!(read.unwrap_or(0), 0);

    assert!(handle.is_connected().await.unwrap());
    assert!(connect_rx.try_recv().is_err());

    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn handshake_timeout_schedules_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // Accepts TCP but never answers the upgrade.
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            held.push(stream);
        }
    });

    let config =
        ManagerConfig { connection_timeout: Duration::from_millis(200), ..config_for(port) };
    let (runtime, handle) = Runtime::websocket(config, SharedToken::new("t")).unwrap();
    let task = runtime.spawn();

    let (attempt_tx, mut attempt_rx) = mpsc::unbounded_channel();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
    handle.add_event_listener(EventKind::ReconnectAttempt, forward(&attempt_tx)).await.unwrap();
    handle.add_event_listener(EventKind::Disconnect, forward(&disconnect_tx)).await.unwrap();

    assert!(handle.initialize("u1", Role::Rider).await.unwrap());
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Connecting);

    let error = timeout(WAIT, disconnect_rx.recv()).await.unwrap().unwrap();
    assert_eq!(error, json!({"error": true}));
    let close = timeout(WAIT, disconnect_rx.recv()).await.unwrap().unwrap();
    assert_eq!(close["code"], 1006);

    let attempt = timeout(WAIT, attempt_rx.recv()).await.unwrap().unwrap();
    assert_eq!(attempt["attempt"], 1);
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Reconnecting);

    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
    server.abort();
}

#[tokio::test]
async fn missing_token_reports_failure() {
    let (runtime, handle) =
        Runtime::websocket(ManagerConfig::default(), SharedToken::empty()).unwrap();
    let task = runtime.spawn();

    assert!(!handle.initialize("u1", Role::Driver).await.unwrap());
    assert_eq!(handle.state().await.unwrap(), ConnectionState::Failed);

    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(handle.state().await.is_err());
}

#[test]
fn invalid_config_is_rejected() {
    let config = ManagerConfig { heartbeat_interval: Duration::ZERO, ..ManagerConfig::default() };
    assert!(Runtime::websocket(config, SharedToken::new("t")).is_err());
}

#[tokio::test]
async fn listeners_can_be_managed_from_any_handle() {
    let (runtime, handle) =
        Runtime::websocket(ManagerConfig::default(), SharedToken::empty()).unwrap();
    let task = runtime.spawn();

    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let listener = Listener::new(move |_| *counter.lock().unwrap() += 1);

    let other = handle.clone();
    other.add_event_listener("custom", listener.clone()).await.unwrap();
    handle.remove_event_listener("custom", listener).await.unwrap();
    handle.shutdown().await.unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
}
