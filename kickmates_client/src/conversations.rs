use crate::models::{Conversation, LastMessage, Message};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Inbox view: conversations ordered by most recent activity.
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    conversations: Vec<Conversation>,
}

fn activity(conversation: &Conversation) -> Option<DateTime<Utc>> {
    conversation
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| {
            conversation
                .last_message
                .as_ref()
                .and_then(|last| parse_timestamp(&last.created_at))
        })
}

impl ConversationList {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        let mut list = Self::default();
        list.replace_all(conversations);
        list
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, conversation_id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        let mut next = conversations;
        // Stable: conversations without a usable timestamp keep server order
        // at the bottom.
        next.sort_by_key(|c| Reverse(activity(c)));
        self.conversations = next;
    }

    /// Updates the preview after the user sent `message` and moves the
    /// conversation to the top. Returns `false` for an unknown conversation.
    pub fn record_outgoing(&mut self, conversation_id: i64, message: &Message) -> bool {
        let Some(position) = self.conversations.iter().position(|c| c.id == conversation_id)
        else {
            tracing::debug!(conversation_id, "outgoing message for unknown conversation");
            return false;
        };
        let mut next = self.conversations.clone();
        let mut updated = next.remove(position);
        updated.last_message = Some(LastMessage {
            content: message.content.clone(),
            created_at: message.created_at.clone(),
            sender_id: message.sender_id,
        });
        updated.updated_at = Some(message.created_at.clone());
        next.insert(0, updated);
        self.conversations = next;
        true
    }

    pub fn mark_read(&mut self, conversation_id: i64) {
        self.conversations = self
            .conversations
            .iter()
            .map(|c| {
                if c.id == conversation_id {
                    Conversation {
                        unread_count: 0,
                        ..c.clone()
                    }
                } else {
                    c.clone()
                }
            })
            .collect();
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations
            .iter()
            .fold(0u32, |total, c| total.saturating_add(c.unread_count))
    }

    pub fn remove(&mut self, conversation_id: i64) -> Option<Conversation> {
        let position = self.conversations.iter().position(|c| c.id == conversation_id)?;
        let mut next = self.conversations.clone();
        let removed = next.remove(position);
        self.conversations = next;
        Some(removed)
    }
}
