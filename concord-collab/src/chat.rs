//! Per-room chat log.
//!
//! Messages are ordered by arrival: each channel stamps a strictly
//! increasing sequence number under its own lock. History is append-only;
//! edits replace content in place and always set `edited`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{CollabError, EntityKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: Uuid,
    /// Position in the room's message order, starting at 1
    pub sequence: u64,
    pub author: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub reply_to: Option<Uuid>,
    pub reactions: Vec<Reaction>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Content and metadata of a message about to be sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub content: String,
    pub kind: MessageKind,
    pub reply_to: Option<Uuid>,
}

impl MessageDraft {
    /// Plain text draft.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the message as a reply to `message_id` in the same room.
    pub fn replying_to(mut self, message_id: Uuid) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Only messages created at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only messages created strictly before this instant
    pub before: Option<DateTime<Utc>>,
    pub kind: Option<MessageKind>,
    pub author: Option<Uuid>,
    /// Keep only the most recent N matches
    pub limit: Option<usize>,
}

pub struct ChatChannel {
    room_id: Uuid,
    messages: Vec<ChatMessage>,
    index: HashMap<Uuid, usize>,
    max_length: usize,
}

impl ChatChannel {
    /// Empty channel rejecting messages longer than `max_length` chars.
    pub fn new(room_id: Uuid, max_length: usize) -> Self {
        Self {
            room_id,
            messages: Vec::new(),
            index: HashMap::new(),
            max_length,
        }
    }

    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    /// Append a message with the next sequence number.
    pub fn send(&mut self, author: Uuid, draft: MessageDraft) -> Result<ChatMessage> {
        self.check_content(&draft.content)?;
        if let Some(parent) = draft.reply_to {
            if !self.index.contains_key(&parent) {
                return Err(CollabError::not_found(EntityKind::Message, parent));
            }
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            room_id: self.room_id,
            sequence: self.messages.len() as u64 + 1,
            author,
            content: draft.content,
            kind: draft.kind,
            reply_to: draft.reply_to,
            reactions: Vec::new(),
            edited: false,
            edited_at: None,
            created_at: Utc::now(),
        };
        self.index.insert(message.id, self.messages.len());
        self.messages.push(message.clone());
        Ok(message)
    }

    /// Replace a message's content. Only its author may edit it.
    pub fn edit(&mut self, message_id: Uuid, editor: Uuid, content: String) -> Result<ChatMessage> {
        self.check_content(&content)?;
        let message = self.message_mut(message_id)?;
        if message.author != editor {
            return Err(CollabError::invalid("only the author may edit a message"));
        }
        if message.content != content {
            message.content = content;
            message.edited = true;
            message.edited_at = Some(Utc::now());
        }
        Ok(message.clone())
    }

    /// Toggle `user`'s `emoji` reaction on a message.
    pub fn react(&mut self, message_id: Uuid, user: Uuid, emoji: &str) -> Result<ChatMessage> {
        if emoji.is_empty() {
            return Err(CollabError::invalid("empty reaction"));
        }
        let message = self.message_mut(message_id)?;
        match message.reactions.iter().position(|r| r.emoji == emoji) {
            Some(i) => {
                let reaction = &mut message.reactions[i];
                match reaction.users.iter().position(|u| *u == user) {
                    Some(u) => {
                        reaction.users.remove(u);
                        if reaction.users.is_empty() {
                            message.reactions.remove(i);
                        }
                    }
                    None => reaction.users.push(user),
                }
            }
            None => message.reactions.push(Reaction { emoji: emoji.to_string(), users: vec![user] }),
        }
        Ok(message.clone())
    }

    /// Message by id.
    pub fn get(&self, message_id: &Uuid) -> Option<&ChatMessage> {
        self.index.get(message_id).map(|&i| &self.messages[i])
    }

    /// Matching messages, oldest first.
    pub fn list(&self, filter: &MessageFilter) -> Vec<ChatMessage> {
        let matches: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| filter.since.map_or(true, |t| m.created_at >= t))
            .filter(|m| filter.before.map_or(true, |t| m.created_at < t))
            .filter(|m| filter.kind.map_or(true, |k| m.kind == k))
            .filter(|m| filter.author.map_or(true, |a| m.author == a))
            .collect();

        let skip = match filter.limit {
            Some(limit) => matches.len().saturating_sub(limit),
            None => 0,
        };
        matches.into_iter().skip(skip).cloned().collect()
    }

    /// Messages in the channel.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn message_mut(&mut self, message_id: Uuid) -> Result<&mut ChatMessage> {
        let i = *self
            .index
            .get(&message_id)
            .ok_or_else(|| CollabError::not_found(EntityKind::Message, message_id))?;
        Ok(&mut self.messages[i])
    }

    fn check_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(CollabError::invalid("empty message"));
        }
        let len = content.chars().count();
        if len > self.max_length {
            return Err(CollabError::invalid(format!(
                "message of {len} chars exceeds limit of {}",
                self.max_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChatChannel {
        ChatChannel::new(Uuid::new_v4(), 100)
    }

    #[test]
    fn test_send_assigns_sequence() {
        let mut ch = channel();
        let author = Uuid::new_v4();
        let m1 = ch.send(author, MessageDraft::text("hi")).unwrap();
        let m2 = ch.send(author, MessageDraft::text("there")).unwrap();

        assert_eq!(m1.sequence, 1);
        assert_eq!(m2.sequence, 2);
        assert_eq!(m1.room_id, ch.room_id());
        assert_ne!(m1.id, m2.id);
        assert!(!m1.edited);
    }

    #[test]
    fn test_send_rejects_bad_content() {
        let mut ch = channel();
        let author = Uuid::new_v4();
        assert!(ch.send(author, MessageDraft::text("   ")).is_err());
        assert!(ch.send(author, MessageDraft::text("x".repeat(101))).is_err());
        assert!(ch.is_empty());
    }

    #[test]
    fn test_reply_to_unknown_message() {
        let mut ch = channel();
        let err = ch
            .send(Uuid::new_v4(), MessageDraft::text("re").replying_to(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, CollabError::NotFound { kind: EntityKind::Message, .. }));
    }

    #[test]
    fn test_edit_sets_flag_author_only() {
        let mut ch = channel();
        let author = Uuid::new_v4();
        let m = ch.send(author, MessageDraft::text("helo")).unwrap();

        assert!(ch.edit(m.id, Uuid::new_v4(), "hijack".into()).is_err());

        let edited = ch.edit(m.id, author, "hello".into()).unwrap();
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());
        assert_eq!(ch.get(&m.id).unwrap().content, "hello");
    }

    #[test]
    fn test_react_toggles() {
        let mut ch = channel();
        let m = ch.send(Uuid::new_v4(), MessageDraft::text("ship it")).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        ch.react(m.id, a, "+1").unwrap();
        let msg = ch.react(m.id, b, "+1").unwrap();
        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].users, vec![a, b]);

        ch.react(m.id, a, "+1").unwrap();
        let msg = ch.react(m.id, b, "+1").unwrap();
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_list_filters_and_limit() {
        let mut ch = channel();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        ch.send(alice, MessageDraft::text("one")).unwrap();
        ch.send(bob, MessageDraft::text("fn main() {}").with_kind(MessageKind::Code)).unwrap();
        ch.send(alice, MessageDraft::text("three")).unwrap();
        ch.send(alice, MessageDraft::text("four")).unwrap();

        let all = ch.list(&MessageFilter::default());
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].sequence < w[1].sequence));

        let code = ch.list(&MessageFilter { kind: Some(MessageKind::Code), ..Default::default() });
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].author, bob);

        let recent = ch.list(&MessageFilter { author: Some(alice), limit: Some(2), ..Default::default() });
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four"]);
    }
}
