//! Chat commands the bot attaches to each joined channel.

use std::time::{Duration, Instant};

use tmi_adapter::{Command, Message};

/// `!ping` → `pong, @sender`.
#[derive(Default)]
pub struct Ping;

impl Command for Ping {
    fn key() -> &'static str {
        "ping"
    }

    fn boot(&mut self) {
        tracing::debug!("ping command ready");
    }
}

/// `!uptime` → how long the bot has been running.
#[derive(Default)]
pub struct Uptime;

impl Command for Uptime {
    fn key() -> &'static str {
        "uptime"
    }
}

/// Reply for `message`, if it invokes a command attached to its channel.
pub fn respond(message: &Message, trigger: &str, started: Instant) -> Option<String> {
    let invocation = message.content().strip_prefix(trigger)?;
    let name = invocation.split_whitespace().next()?.to_lowercase();
    let channel = message.channel();

    if name == Ping::key() && channel.has_command::<Ping>() {
        Some(format!("pong, @{}", message.sender_name()))
    } else if name == Uptime::key() && channel.has_command::<Uptime>() {
        Some(format!("up {}", format_uptime(started.elapsed())))
    } else {
        None
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
