//! tmi-bot: joins Twitch channels and answers a couple of chat commands.
//!
//!   !ping     - reply with a pong
//!   !uptime   - how long the bot has been running
//!
//! Credentials come from the config file, `--username`/`--token`, or the
//! TWITCH_OAUTH_TOKEN environment variable.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tmi_adapter::Client;

use tmi_bot::commands::{self, Ping, Uptime};
use tmi_bot::config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "tmi-bot", about = "Minimal Twitch chat bot")]
struct Args {
    /// Config file (default: ~/.config/tmi-bot/bot.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Twitch login name
    #[arg(long)]
    username: Option<String>,

    /// OAuth token (or set TWITCH_OAUTH_TOKEN env var)
    #[arg(long, env = "TWITCH_OAUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Channel to join (repeatable)
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Use TLS
    #[arg(long)]
    tls: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tmi_bot=info,tmi_adapter=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref());
    config.apply(Overrides {
        username: args.username,
        token: args.token,
        channels: args.channels,
        tls: args.tls,
    });

    let username = config
        .username
        .clone()
        .context("no username: pass --username or set `username` in the config file")?;
    let token = config
        .token
        .clone()
        .context("no token: pass --token, set TWITCH_OAUTH_TOKEN, or set `token` in the config file")?;

    let client = Client::new(config.client.clone());
    client.boot();

    let started = Instant::now();
    let trigger = client.platform_command_trigger();
    client.on_message(move |message| {
        let Some(reply) = commands::respond(message, trigger, started) else {
            return;
        };
        let channel = message.channel().clone();
        tokio::spawn(async move {
            if let Err(e) = channel.send_message(&reply).await {
                tracing::warn!(channel = %channel.name(), error = %e, "Reply failed");
            }
        });
    });

    client
        .connect(&username, &token, None, None)
        .await
        .context("connect to Twitch chat")?;
    tracing::info!(
        "Connected to {} as {username}",
        client.platform_name()
    );

    for name in config.channel_names() {
        let channel = client.channel(&name);
        channel.add_command::<Ping>().add_command::<Uptime>();
        if let Err(e) = channel.join().await {
            tracing::error!(channel = %channel.name(), error = %e, "Join failed");
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    for channel in client.joined_channels() {
        if let Err(e) = channel.leave().await {
            tracing::warn!(channel = %channel.name(), error = %e, "Leave failed");
        }
        channel.remove_command::<Ping>().remove_command::<Uptime>();
    }
    client.teardown().await?;
    client.disconnect().await;
    Ok(())
}
