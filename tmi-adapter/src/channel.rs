//! A single chat room and the commands attached to it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::client::{Client, ClientInner};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::line;

/// Handle to one channel. Clones share state; equality is identity.
///
/// Instances come from [`Client::channel`], which guarantees one instance
/// per lowercase name.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    name: String,
    client: Weak<ClientInner>,
    commands: Mutex<Vec<Attached>>,
}

struct Attached {
    key: &'static str,
    command: Box<dyn Command>,
}

impl Channel {
    pub(crate) fn new(client: Weak<ClientInner>, name: &str) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name: name.to_lowercase(),
                client,
                commands: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Lowercase channel name, without the leading `#`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The client this channel belongs to.
    pub fn platform(&self) -> Result<Client> {
        self.inner
            .client
            .upgrade()
            .map(Client::from_inner)
            .ok_or(Error::ClientDropped)
    }

    /// Send `JOIN` and wait for the end-of-names reply.
    ///
    /// Resolves immediately if the channel is already joined. Fails with
    /// [`Error::Timeout`] if the server does not acknowledge within the
    /// client's acknowledgement timeout.
    pub async fn join(&self) -> Result<()> {
        let client = self.platform()?;
        if client.is_joined(self) {
            return Ok(());
        }

        let username = client.username();
        let name = self.name().to_string();
        client
            .send_and_await(
                line::join(&name),
                format!("JOIN #{name} acknowledgement"),
                move |l| line::is_join_ack(l, &username, &name),
            )
            .await?;

        client.mark_joined(self);
        tracing::info!(channel = %self.name(), "Joined channel");
        Ok(())
    }

    /// Send `PART` and wait for the server to echo it back.
    pub async fn leave(&self) -> Result<()> {
        let client = self.platform()?;
        if !client.is_joined(self) {
            return Ok(());
        }

        let username = client.username();
        let name = self.name().to_string();
        client
            .send_and_await(
                line::part(&name),
                format!("PART #{name} acknowledgement"),
                move |l| line::is_part_ack(l, &username, &name),
            )
            .await?;

        client.mark_parted(self);
        tracing::info!(channel = %self.name(), "Left channel");
        Ok(())
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let client = self.platform()?;
        let username = client.username();
        client
            .write_line(&line::send_message(&username, self.name(), text))
            .await?;
        Ok(())
    }

    /// Attach and boot a `C`, unless one is already attached.
    ///
    /// `boot` runs while the command list is locked, so it must not call
    /// back into this channel's command methods.
    pub fn add_command<C>(&self) -> &Self
    where
        C: Command + Default + 'static,
    {
        let mut commands = self.inner.commands.lock();
        if commands.iter().any(|a| a.key == C::key()) {
            return self;
        }
        commands.push(Attached {
            key: C::key(),
            command: Box::new(C::default()),
        });
        if let Some(attached) = commands.last_mut() {
            attached.command.boot();
        }
        tracing::debug!(channel = %self.name(), command = C::key(), "Command attached");
        self
    }

    /// Detach the attached `C`, if any, and tear it down.
    pub fn remove_command<C>(&self) -> &Self
    where
        C: Command + 'static,
    {
        let removed = {
            let mut commands = self.inner.commands.lock();
            commands
                .iter()
                .position(|a| a.key == C::key())
                .map(|index| commands.remove(index))
        };
        if let Some(mut attached) = removed {
            attached.command.teardown();
            tracing::debug!(channel = %self.name(), command = C::key(), "Command removed");
        }
        self
    }

    /// Keys of the attached commands, in attach order.
    pub fn commands(&self) -> Vec<&'static str> {
        self.inner.commands.lock().iter().map(|a| a.key).collect()
    }

    pub fn has_command<C>(&self) -> bool
    where
        C: Command + 'static,
    {
        self.inner.commands.lock().iter().any(|a| a.key == C::key())
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Channel {}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("commands", &self.commands())
            .finish()
    }
}
