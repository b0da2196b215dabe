//! Websocket transport.
//!
//! [`WsConnector`] implements the manager's connector seam on top of
//! tokio-tungstenite. Every channel runs in its own task that owns the
//! socket: it performs the handshake (bounded by the connection timeout),
//! writes frames handed over by the manager, and reports everything that
//! happens as [`ChannelEvent`]s on a queue the runtime drains.
//!
//! Dropping the [`WsChannel`] ends its task, which closes the socket. A
//! channel dropped mid-handshake abandons the upgrade.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ridelink_core::{Channel, ChannelEvent, ChannelId, Connector, TransportError};
use ridelink_proto::{
    Url,
    close::{ABNORMAL_CLOSURE, NO_STATUS_RECEIVED},
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// Opens websocket channels on the current tokio runtime.
#[derive(Debug, Clone)]
pub struct WsConnector {
    events: mpsc::UnboundedSender<ChannelEvent>,
    connect_timeout: Duration,
}

impl WsConnector {
    /// Connector reporting channel events to `events`.
    pub fn new(events: mpsc::UnboundedSender<ChannelEvent>, connect_timeout: Duration) -> Self {
        Self { events, connect_timeout }
    }
}

impl Connector for WsConnector {
    type Channel = WsChannel;

    fn open(&mut self, id: ChannelId, url: &Url) -> Result<WsChannel, TransportError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError::Open(err.to_string()))?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        handle.spawn(run_channel(
            id,
            url.to_string(),
            self.connect_timeout,
            outgoing_rx,
            self.events.clone(),
        ));

        Ok(WsChannel { outgoing: outgoing_tx })
    }
}

/// Write half of a websocket channel.
#[derive(Debug)]
pub struct WsChannel {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl Channel for WsChannel {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing.send(Outgoing::Text(text)).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self, code: u16, reason: &str) {
        // Task already gone means the socket is already closed.
        let _ = self.outgoing.send(Outgoing::Close { code, reason: reason.to_string() });
    }
}

/// Opening handshake, bounded by `connect_timeout`.
///
/// Returns `None` once the failure has been reported, or silently when the
/// manager releases the channel before the upgrade completes. Dropping the
/// handshake future drops the TCP stream, so a released channel never
/// finishes upgrading.
async fn handshake(
    channel: ChannelId,
    url: &str,
    connect_timeout: Duration,
    outgoing: &mut mpsc::UnboundedReceiver<Outgoing>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> Option<Socket> {
    let connect = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url));
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return match result {
                    Ok(Ok((socket, _response))) => Some(socket),
                    Ok(Err(err)) => {
                        report_failure(events, channel, err.to_string());
                        None
                    },
                    Err(_) => {
                        report_failure(
                            events,
                            channel,
                            format!("handshake timed out after {connect_timeout:?}"),
                        );
                        None
                    },
                };
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(_)) => {
                    tracing::debug!(%channel, "frame dropped before handshake completed");
                },
                None | Some(Outgoing::Close { .. }) => {
                    tracing::debug!(%channel, "channel released during handshake");
                    return None;
                },
            },
        }
    }
}

fn report_failure(
    events: &mpsc::UnboundedSender<ChannelEvent>,
    channel: ChannelId,
    reason: String,
) {
    let _ = events.send(ChannelEvent::Error { channel, reason: reason.clone() });
    let _ = events.send(ChannelEvent::Closed { channel, code: ABNORMAL_CLOSURE, reason });
}

async fn run_channel(
    channel: ChannelId,
    url: String,
    connect_timeout: Duration,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let Some(socket) = handshake(channel, &url, connect_timeout, &mut outgoing, &events).await
    else {
        return;
    };

    let _ = events.send(ChannelEvent::Opened { channel });
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        report_failure(&events, channel, err.to_string());
                        break;
                    }
                },
                Some(Outgoing::Close { code, reason }) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                    if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!(%channel, error = %err, "close frame not sent");
                    }
                },
                None => {
                    // Manager let go of the channel.
                    let _ = sink.close().await;
                    break;
                },
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    let _ = events.send(ChannelEvent::Message { channel, text });
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or((NO_STATUS_RECEIVED, String::new()), |frame| {
                        (u16::from(frame.code), frame.reason.as_str().to_owned())
                    });
                    let _ = events.send(ChannelEvent::Closed { channel, code, reason });
                    break;
                },
                Some(Ok(_)) => {},
                Some(Err(err)) => {
                    report_failure(&events, channel, err.to_string());
                    break;
                },
                None => {
                    let _ = events.send(ChannelEvent::Closed {
                        channel,
                        code: ABNORMAL_CLOSURE,
                        reason: "stream ended".into(),
                    });
                    break;
                },
            },
        }
    }

    tracing::debug!(%channel, "channel task finished");
}
