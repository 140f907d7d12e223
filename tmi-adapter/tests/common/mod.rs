//! Scripted server side of an in-memory connection.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

use tmi_adapter::{Client, ClientConfig};

pub const USERNAME: &str = "bob";
pub const PASSWORD: &str = "oauth:secret";
pub const WELCOME: &str = ":tmi.twitch.tv 001 bob :Welcome, GLHF!";

pub struct Server {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Server {
    pub fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Next line the client wrote, without the terminator.
    pub async fn expect_line(&mut self) -> String {
        self.try_line(Duration::from_secs(2))
            .await
            .expect("client did not write a line in time")
    }

    /// Next line if one arrives within `wait`.
    pub async fn try_line(&mut self, wait: Duration) -> Option<String> {
        let mut buf = String::new();
        match tokio::time::timeout(wait, self.reader.read_line(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => Some(buf.trim_end().to_string()),
            _ => None,
        }
    }

    /// Wait for the client to close its side of the stream.
    pub async fn expect_eof(&mut self) {
        let mut buf = String::new();
        let read = tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut buf))
            .await
            .expect("client did not close the stream in time");
        assert!(matches!(read, Ok(0)), "expected EOF, got {read:?} {buf:?}");
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Read and check the three login lines.
    pub async fn expect_login(&mut self) {
        assert_eq!(self.expect_line().await, format!("PASS {PASSWORD}"));
        assert_eq!(self.expect_line().await, format!("NICK {USERNAME}"));
        assert_eq!(self.expect_line().await, "CAP REQ :twitch.tv/tags");
    }
}

/// A booted client logged in as `bob` over an in-memory stream.
pub async fn connected(config: ClientConfig) -> (Client, Server) {
    let client = Client::new(config);
    client.boot();
    let server = reconnect(&client).await;
    (client, server)
}

/// Log `client` in again over a fresh in-memory stream.
pub async fn reconnect(client: &Client) -> Server {
    let (client_side, server_side) = tokio::io::duplex(16 * 1024);
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

    server
}

pub fn fast_config() -> ClientConfig {
    ClientConfig {
        login_timeout_secs: 1,
        ack_timeout_secs: 1,
        ..ClientConfig::default()
    }
}
