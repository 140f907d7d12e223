//! Twitch chat adapter over IRC.
//!
//! * [`client`] - the connection: login, keep-alive, channel registry, dispatch
//! * [`channel`] - join/leave/send for one room, plus attached commands
//! * [`message`] - a parsed chat line
//! * [`event`] - event kinds and listener handles
//! * [`line`] - the wire patterns this dialect uses, and the chat line parser
//! * [`command`] - the contract for host-supplied commands

pub mod channel;
pub mod client;
pub mod command;
pub mod error;
pub mod event;
pub mod line;
pub mod message;

pub use channel::Channel;
pub use client::{BootableState, Client, ClientConfig};
pub use command::Command;
pub use error::{Error, Result};
pub use event::{EventKind, Listener, ListenerId};
pub use message::Message;
