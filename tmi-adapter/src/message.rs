//! Parsed chat message.

use crate::channel::Channel;

/// One chat line as delivered to `Message` subscribers.
#[derive(Debug, Clone)]
pub struct Message {
    channel: Channel,
    content: String,
    mentioned_users: Vec<String>,
    sender_name: String,
}

impl Message {
    pub fn new(
        channel: Channel,
        content: String,
        mentioned_users: Vec<String>,
        sender_name: String,
    ) -> Self {
        Self {
            channel,
            content,
            mentioned_users,
            sender_name,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Text after the sender/channel prefix.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Tokens starting with `@`, in order. Not checked against real users.
    pub fn mentioned_users(&self) -> &[String] {
        &self.mentioned_users
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }
}
