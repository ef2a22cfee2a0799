//! Bounded per-process mailbox.
//!
//! Provides deterministic FIFO ordering with explicit capacity limits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// A message posted to a process with `notify`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Asks the process to look at something now; wakes it if sleeping
    Interrupt { info: String },
    /// Application-defined message
    Custom { kind: String, payload: Value },
}

impl Message {
    /// Creates an interrupt message
    pub fn interrupt(info: impl Into<String>) -> Self {
        Message::Interrupt { info: info.into() }
    }

    /// Checks whether delivering this message should wake a sleeper
    pub fn wakes_sleeper(&self) -> bool {
        matches!(self, Message::Interrupt { .. })
    }
}

/// Returned when a mailbox has no room for another message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxFull;

/// Bounded FIFO queue of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mailbox {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl Mailbox {
    /// Creates a mailbox with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::new(),
        }
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the mailbox is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Pushes a message onto the mailbox.
    pub fn push(&mut self, message: Message) -> Result<(), MailboxFull> {
        if self.messages.len() >= self.capacity {
            return Err(MailboxFull);
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Removes every queued message, oldest first.
    pub fn drain(&mut self) -> Vec<Message> {
        self.messages.drain(..).collect()
    }

    /// Drops every queued message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mailbox_ordering() {
        let mut mailbox = Mailbox::with_capacity(4);
        mailbox.push(Message::interrupt("a")).unwrap();
        mailbox.push(Message::interrupt("b")).unwrap();

        assert_eq!(
            mailbox.drain(),
            vec![Message::interrupt("a"), Message::interrupt("b")]
        );
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_mailbox_capacity() {
        let mut mailbox = Mailbox::with_capacity(1);
        mailbox.push(Message::interrupt("a")).unwrap();
        assert_eq!(mailbox.push(Message::interrupt("b")), Err(MailboxFull));
        assert_eq!(mailbox.len(), 1);
    }

    #[test]
    fn test_message_wire_form() {
        let encoded = serde_json::to_value(Message::interrupt("low energy")).unwrap();
        assert_eq!(encoded, json!({ "type": "interrupt", "info": "low energy" }));

        let custom = Message::Custom {
            kind: "retarget".to_string(),
            payload: json!({ "room": "W1N1" }),
        };
        assert!(!custom.wakes_sleeper());
    }
}
