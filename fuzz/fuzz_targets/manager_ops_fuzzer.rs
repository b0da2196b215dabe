//! Fuzz target for the connection manager state machine
//!
//! # Strategy
//!
//! - Host calls: connect, disconnect, sends, token changes
//! - Channel input: open, close with arbitrary codes, errors, raw frames,
//!   events from stale channels
//! - Time: arbitrary clock advances
//!
//! # Invariants
//!
//! - At most one channel is held at a time
//! - Reconnect attempts never exceed the budget
//! - Closed and Failed hold no timers
//! - send succeeds exactly when the channel is open

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ridelink_core::{ChannelEvent, ChannelId, ConnectionState, Role};
use ridelink_harness::SimClient;
use ridelink_proto::{DriverStatus, MessageType};

#[derive(Debug, Clone, Arbitrary)]
enum ManagerOp {
    Initialize { driver: bool },
    Connect,
    Disconnect,
    Open,
    Close { code: u16 },
    Error,
    Frame(String),
    // May hit the live channel too, which is just a close
    Stale { channel: u8, code: u16 },
    Advance { millis: u32 },
    Send,
    DriverStatus,
    ClearToken,
    SetToken(String),
}

fuzz_target!(|input: (u64, Vec<ManagerOp>)| {
    let (seed, ops) = input;
    let mut client = SimClient::new(seed);

    for op in ops {
        match op {
            ManagerOp::Initialize { driver } => {
                let role = if driver { Role::Driver } else { Role::Rider };
                client.manager.initialize("fuzz", role);
            },
            ManagerOp::Connect => {
                client.manager.connect();
            },
            ManagerOp::Disconnect => client.manager.disconnect(),
            ManagerOp::Open => {
                client.open();
            },
            ManagerOp::Close { code } => {
                client.close(code, "fuzz");
            },
            ManagerOp::Error => {
                client.error("fuzz");
            },
            ManagerOp::Frame(text) => {
                client.deliver(&text);
            },
            ManagerOp::Stale { channel, code } => {
                client.manager.handle_channel_event(ChannelEvent::Closed {
                    channel: ChannelId(u64::from(channel)),
                    code,
                    reason: String::new(),
                });
            },
            ManagerOp::Advance { millis } => client.advance(Duration::from_millis(millis.into())),
            ManagerOp::Send => {
                let open = client.manager.is_connected();
                assert_eq!(client.manager.send(MessageType::Ping, serde_json::Value::Null), open);
            },
            ManagerOp::DriverStatus => {
                client.manager.update_driver_status(DriverStatus::Online);
            },
            ManagerOp::ClearToken => client.token.clear(),
            ManagerOp::SetToken(token) => client.token.set(token),
        }

        assert!(client.network.live_channels().len() <= 1);
        let budget = client.manager.config().max_reconnect_attempts;
        assert!(client.manager.reconnect_attempts() <= budget);
        if matches!(client.manager.state(), ConnectionState::Closed | ConnectionState::Failed) {
            assert!(client.manager.next_deadline().is_none());
        }
    }
});
