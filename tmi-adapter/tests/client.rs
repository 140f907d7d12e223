//! Client tests: login, keep-alive, dispatch, registry, listeners.
//!
//! Tests cover:
//! - Login handshake order and the login-failure path
//! - PING/PONG keep-alive, including repeated boot
//! - Line vs message dispatch gating
//! - Channel registry canonicalisation
//! - Listener registration and removal
//! - Socket release on disconnect, EOF and reconnect

mod common;

use std::time::Duration;

use tokio::sync::mpsc;

use common::{Server, PASSWORD, USERNAME, WELCOME, connected, fast_config, reconnect};
use tmi_adapter::{BootableState, Client, ClientConfig, Error, EventKind};

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn connect_logs_in_and_records_username() {
    let (client, _server) = connected(ClientConfig::default()).await;
    assert_eq!(client.username(), "bob");
    assert!(client.is_connected());
    assert_eq!(client.state(), BootableState::Initialized);
}

#[tokio::test]
async fn login_failure_is_returned_from_connect() {
    let client = Client::new(fast_config());
    let (client_side, server_side) = tokio::io::duplex(4096);
    let mut server = Server::new(server_side);

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .connect_with_stream(client_side, USERNAME, PASSWORD)
                .await
        })
    };
    server.expect_login().await;
    server
        .send(":tmi.twitch.tv NOTICE * :Login authentication failed")
        .await;

    let result = connecting.await.unwrap();
    assert!(matches!(result, Err(Error::AuthFailed(ref line)) if line.contains("failed")));
    assert!(!client.is_connected());
    assert!(matches!(client.write_line("PING").await, Err(Error::NotConnected)));
}

#[tokio::test]
async fn server_closing_during_login_is_an_error() {
    let client = Client::new(fast_config());
    let (client_side, server_side) = tokio::io::duplex(4096);
    let mut server = Server::new(server_side);

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .connect_with_stream(client_side, USERNAME, PASSWORD)
                .await
        })
    };
    server.expect_login().await;
    drop(server);

    assert!(matches!(connecting.await.unwrap(), Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn silent_server_times_out_login() {
    let client = Client::new(fast_config());
    let (client_side, server_side) = tokio::io::duplex(4096);
    let _server = Server::new(server_side);

    let result = client
        .connect_with_stream(client_side, USERNAME, PASSWORD)
        .await;
    assert!(matches!(result, Err(Error::Timeout { .. })));
}

#[tokio::test]
async fn ping_gets_exactly_one_pong() {
    let (_client, mut server) = connected(ClientConfig::default()).await;

    server.send("PING :tmi.twitch.tv").await;
    assert_eq!(server.expect_line().await, "PONG :tmi.twitch.tv");

    // Near misses are not keep-alive probes.
    server.send("PING :example.com").await;
    server.send(":tmi.twitch.tv PING :tmi.twitch.tv").await;
    assert_eq!(server.try_line(QUIET).await, None);

    server.send("PING :tmi.twitch.tv").await;
    assert_eq!(server.expect_line().await, "PONG :tmi.twitch.tv");
    assert_eq!(server.try_line(QUIET).await, None);
}

#[tokio::test]
async fn repeated_boot_does_not_duplicate_keep_alive() {
    let (client, mut server) = connected(ClientConfig::default()).await;
    client.boot();
    client.boot();
    assert_eq!(client.listener_count(EventKind::Line), 1);
    assert_eq!(client.state(), BootableState::Initialized);

    server.send("PING :tmi.twitch.tv").await;
    assert_eq!(server.expect_line().await, "PONG :tmi.twitch.tv");
    assert_eq!(server.try_line(QUIET).await, None);
}

#[tokio::test]
async fn unbooted_client_does_not_answer_ping() {
    let client = Client::default();
    assert_eq!(client.state(), BootableState::Uninitialized);
    let (client_side, server_side) = tokio::io::duplex(4096);
    let mut server = Server::new(server_side);

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .connect_with_stream(client_side, USERNAME, PASSWORD)
                .await
        })
    };
    server.expect_login().await;
    server.send(WELCOME).await;
    connecting.await.unwrap().unwrap();

    server.send("PING :tmi.twitch.tv").await;
    assert_eq!(server.try_line(QUIET).await, None);
}

#[tokio::test]
async fn only_chat_lines_reach_message_subscribers() {
    let (client, mut server) = connected(ClientConfig::default()).await;

    let (line_tx, mut lines) = mpsc::unbounded_channel();
    let (msg_tx, mut messages) = mpsc::unbounded_channel();
    client.on_line(move |l| {
        let _ = line_tx.send(l.to_string());
    });
    client.on_message(move |m| {
        let _ = msg_tx.send((m.sender_name().to_string(), m.content().to_string()));
    });

    let chatter = ":tmi.twitch.tv 372 bob :You are in a maze of twisty passages";
    let chat = ":alice!alice@alice.tmi.twitch.tv PRIVMSG #gaming :hello @bob world";
    server.send(chatter).await;
    server.send(chat).await;

    let mut seen = Vec::new();
    while seen.len() < 2 {
        let l = tokio::time::timeout(Duration::from_secs(2), lines.recv())
            .await
            .unwrap()
            .unwrap();
        // The welcome line may be dispatched after we subscribed.
        if l != WELCOME {
            seen.push(l);
        }
    }
    assert_eq!(seen, vec![chatter.to_string(), chat.to_string()]);

    let (sender, content) = tokio::time::timeout(Duration::from_secs(2), messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sender, "alice");
    assert_eq!(content, "hello @bob world");
    assert!(messages.try_recv().is_err());
}

#[tokio::test]
async fn tagged_chat_lines_are_parsed() {
    let (client, mut server) = connected(ClientConfig::default()).await;
    let (tx, mut messages) = mpsc::unbounded_channel();
    client.on_message(move |m| {
        let _ = tx.send(m.clone());
    });

    server
        .send("@color=#1E90FF;display-name=Alice :alice!alice@alice.tmi.twitch.tv PRIVMSG #Gaming :gg")
        .await;

    let message = tokio::time::timeout(Duration::from_secs(2), messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.content(), "gg");
    assert_eq!(message.channel(), &client.channel("gaming"));
}

#[test]
fn parse_line_extracts_fields() {
    let client = Client::default();
    let message = client.parse_line(":alice!alice@alice.tmi.twitch.tv PRIVMSG #gaming :hello @bob world");
    assert_eq!(message.sender_name(), "alice");
    assert_eq!(message.channel().name(), "gaming");
    assert_eq!(message.content(), "hello @bob world");
    assert_eq!(message.mentioned_users(), ["@bob"]);
    assert_eq!(message.channel(), &client.channel("gaming"));
}

#[test]
fn channel_lookup_is_case_insensitive_and_cached() {
    let client = Client::default();
    let a = client.channel("Test");
    let b = client.channel("TEST");
    assert_eq!(a, b);
    assert_eq!(a.name(), "test");
    assert_eq!(client.channel_register(), vec![a.clone()]);
    assert!(client.joined_channels().is_empty());

    let other = client.channel("other");
    assert_ne!(a, other);
    assert_eq!(client.channel_register().len(), 2);
}

#[test]
fn removing_unknown_listeners_is_harmless() {
    let client = Client::default();
    let id = client.on_line(|_| {});

    client.remove_listener(EventKind::Message, id);
    assert_eq!(client.listener_count(EventKind::Line), 1);

    client.remove_listener(EventKind::Line, id);
    client.remove_listener(EventKind::Line, id);
    assert_eq!(client.listener_count(EventKind::Line), 0);
    assert_eq!(client.listener_count(EventKind::Message), 0);
}

#[tokio::test]
async fn listener_can_remove_itself_during_dispatch() {
    let (client, mut server) = connected(ClientConfig::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let slot = std::sync::Arc::new(parking_lot::Mutex::new(None));
    let id = {
        let client = client.clone();
        let slot = slot.clone();
        client.clone().on_line(move |l| {
            if l == "first" {
                if let Some(id) = slot.lock().take() {
                    client.remove_listener(EventKind::Line, id);
                }
                let _ = tx.send(l.to_string());
            }
        })
    };
    *slot.lock() = Some(id);
    let registered = client.listener_count(EventKind::Line);

    server.send("first").await;
    let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("first"));
    assert_eq!(client.listener_count(EventKind::Line), registered - 1);

    server.send("first").await;
    assert!(tokio::time::timeout(QUIET, rx.recv()).await.is_err());
}

#[tokio::test]
async fn write_returns_what_was_sent() {
    let (client, mut server) = connected(ClientConfig::default()).await;
    let written = client.write_line("PRIVMSG #x :raw").await.unwrap();
    assert_eq!(written, "PRIVMSG #x :raw\r\n");
    assert_eq!(server.expect_line().await, "PRIVMSG #x :raw");
}

#[tokio::test]
async fn disconnect_releases_the_socket() {
    let (client, mut server) = connected(ClientConfig::default()).await;
    client.disconnect().await;
    assert!(!client.is_connected());
    assert!(matches!(client.write("x").await, Err(Error::NotConnected)));
    assert_eq!(server.try_line(QUIET).await, None);
}

#[tokio::test]
async fn reconnecting_closes_the_previous_socket() {
    let (client, mut first) = connected(ClientConfig::default()).await;
    let mut second = reconnect(&client).await;

    first.expect_eof().await;
    assert!(client.is_connected());
    client.write_line("PRIVMSG #x :hi").await.unwrap();
    assert_eq!(second.expect_line().await, "PRIVMSG #x :hi");
}

#[tokio::test]
async fn server_eof_marks_client_disconnected() {
    let (client, server) = connected(ClientConfig::default()).await;
    drop(server);
    for _ in 0..20 {
        if !client.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!client.is_connected());
}

#[test]
fn platform_identity() {
    let client = Client::default();
    assert_eq!(client.platform_command_trigger(), "!");
    assert_eq!(client.platform_name(), "Twitch");
    assert_eq!(client.vendor_name(), "");
    assert_eq!(client.username(), "");
}
