//! Line classifier for the Twitch chat dialect.
//!
//! Every inbound pattern the adapter reacts to and every outbound line it
//! emits is defined here. Matching is deliberately permissive (substring
//! tests, not a full IRC tokenizer), so a chat payload that happens to
//! contain `.tmi.twitch.tv PRIVMSG #` is treated as a chat message. Keeping
//! the rules in one place means they can be tightened without touching the
//! client or channel code.

/// Line terminator used on the wire in both directions.
pub const CRLF: &str = "\r\n";

/// Server keep-alive probe, matched exactly.
pub const PING: &str = "PING :tmi.twitch.tv";
/// Our answer to [`PING`].
pub const PONG: &str = "PONG :tmi.twitch.tv";
/// Capability request sent during login. Tags are requested, never decoded.
pub const CAP_REQ_TAGS: &str = "CAP REQ :twitch.tv/tags";

const PRIVMSG_MARKER: &str = ".tmi.twitch.tv PRIVMSG #";
const LOGIN_FAILURE_MARKER: &str = "failed";

/// What the adapter makes of one inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Ping,
    ChatMessage,
    Other,
}

pub fn classify(line: &str) -> LineKind {
    if line == PING {
        LineKind::Ping
    } else if line.contains(PRIVMSG_MARKER) {
        LineKind::ChatMessage
    } else {
        LineKind::Other
    }
}

/// Checked against the first line received after the login handshake.
pub fn is_login_failure(line: &str) -> bool {
    line.contains(LOGIN_FAILURE_MARKER)
}

/// End-of-names (366) reply that confirms our JOIN.
pub fn is_join_ack(line: &str, username: &str, channel: &str) -> bool {
    line.contains(&format!("tmi.twitch.tv 366 {username} #{channel}"))
}

/// Server echo of our own PART. Must match the whole line.
pub fn is_part_ack(line: &str, username: &str, channel: &str) -> bool {
    line == format!(":{username}!{username}@{username}.tmi.twitch.tv PART #{channel}")
}

pub fn pass(password: &str) -> String {
    format!("PASS {password}")
}

pub fn nick(username: &str) -> String {
    format!("NICK {username}")
}

pub fn join(channel: &str) -> String {
    format!("JOIN #{channel}")
}

pub fn part(channel: &str) -> String {
    format!("PART #{channel}")
}

/// Chat send line. Mirrors the server's own PRIVMSG echo prefix.
pub fn send_message(username: &str, channel: &str, text: &str) -> String {
    format!(":{username}!{username}@{username}.tmi.twitch.tv #{channel} :{text}")
}

/// Fields pulled out of a chat line by [`parse_privmsg`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    pub sender: String,
    pub channel: String,
    pub content: String,
    pub mentions: Vec<String>,
}

/// Split a chat line into sender, channel, content and mentions.
///
/// Never fails: missing pieces come back as empty strings.
pub fn parse_privmsg(line: &str) -> ParsedLine {
    // Tag block from the capability request; skipped, not decoded.
    let rest = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ').map(|(_, rest)| rest).unwrap_or(""),
        None => line,
    };

    let (prefix, content) = rest.split_once(" :").unwrap_or((rest, ""));
    let prefix = prefix.strip_prefix(':').unwrap_or(prefix);

    let sender = prefix.split_once('!').map(|(nick, _)| nick).unwrap_or("");
    let channel = prefix.split_once('#').map(|(_, chan)| chan).unwrap_or("");

    ParsedLine {
        sender: sender.to_string(),
        channel: channel.to_string(),
        content: content.to_string(),
        mentions: mentions(content),
    }
}

fn mentions(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .filter(|token| token.starts_with('@'))
        .map(str::to_string)
        .collect()
}
