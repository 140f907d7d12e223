//! tmi-bot: a small host for the Twitch chat adapter.
//!
//! - `config`: TOML config file plus CLI overrides
//! - `commands`: the commands the bot can attach to a channel

pub mod commands;
pub mod config;
