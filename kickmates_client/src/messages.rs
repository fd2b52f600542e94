//! Optimistic message pipeline for a single conversation.
//!
//! Every outgoing message goes through `Pending -> Confirmed | Failed`. A
//! pending message is visible immediately under a temporary id taken from the
//! client clock; confirmation swaps in the server record under its real id,
//! failure removes it again. The message list is only ever replaced, never
//! edited in place.

use crate::error::{ClientError, Result};
use crate::models::{Message, User};
use crate::utils::{calendar_day, now_millis, now_utc_iso};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

/// Handle for an optimistic message awaiting the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub temp_id: i64,
    pub content: String,
    pub reply_to_id: Option<i64>,
}

/// Snapshot needed to undo an optimistic delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTicket {
    pub message_id: i64,
    previous: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup {
    /// `None` collects messages whose timestamp could not be parsed.
    pub day: Option<NaiveDate>,
    pub messages: Vec<Message>,
}

impl DateGroup {
    pub fn label(&self, today: NaiveDate) -> String {
        match self.day {
            Some(day) if day == today => "Today".to_string(),
            Some(day) if today.pred_opt() == Some(day) => "Yesterday".to_string(),
            Some(day) => day.format("%B %-d, %Y").to_string(),
            None => "Unknown date".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    conversation_id: i64,
    messages: Vec<Message>,
    pending: HashMap<i64, PendingSend>,
    failed: HashSet<i64>,
    last_temp_id: i64,
}

impl MessageLog {
    pub fn new(conversation_id: i64) -> Self {
        Self {
            conversation_id,
            ..Self::default()
        }
    }

    pub fn with_messages(conversation_id: i64, messages: Vec<Message>) -> Self {
        let mut log = Self::new(conversation_id);
        log.replace_all(messages);
        log
    }

    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn delivery_state(&self, message_id: i64) -> Option<DeliveryState> {
        if self.pending.contains_key(&message_id) {
            Some(DeliveryState::Pending)
        } else if self.failed.contains(&message_id) {
            Some(DeliveryState::Failed)
        } else if self.get(message_id).is_some() {
            Some(DeliveryState::Confirmed)
        } else {
            None
        }
    }

    /// Loads the server's copy of the conversation. Optimistic messages that
    /// are still waiting for an answer stay visible at the end. Failure
    /// records from earlier sends are dropped.
    pub fn replace_all(&mut self, server_messages: Vec<Message>) {
        self.failed.clear();
        let mut seen = HashSet::with_capacity(server_messages.len());
        let mut next: Vec<Message> = server_messages
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .collect();
        next.extend(
            self.messages
                .iter()
                .filter(|m| self.pending.contains_key(&m.id) && !seen.contains(&m.id))
                .cloned(),
        );
        self.messages = next;
    }

    /// Appends an optimistic message and returns the handle to settle it.
    pub fn begin_send(
        &mut self,
        sender: &User,
        content: &str,
        reply_to_id: Option<i64>,
    ) -> Result<PendingSend> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ClientError::validation("message may not be empty"));
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ClientError::validation(format!(
                "message may not exceed {MAX_MESSAGE_CHARS} characters"
            )));
        }
        if self
            .pending
            .values()
            .any(|p| p.content == trimmed && p.reply_to_id == reply_to_id)
        {
            return Err(ClientError::validation("this message is already being sent"));
        }

        let replied = match reply_to_id {
            Some(id) => Some(self.get(id).cloned().ok_or_else(|| {
                ClientError::validation(format!("cannot reply to message {id}: not in this conversation"))
            })?),
            None => None,
        };

        let temp_id = self.next_temp_id();
        let optimistic = Message {
            id: temp_id,
            sender_id: sender.id,
            sender_name: Some(sender.username.clone()),
            content: trimmed.to_string(),
            is_read: false,
            created_at: now_utc_iso(),
            reply_to_id,
            reply_to_content: replied.as_ref().map(|m| m.content.clone()),
            reply_to_sender: replied.and_then(|m| m.sender_name),
            is_liked: None,
            is_deleted: None,
        };

        let pending = PendingSend {
            temp_id,
            content: optimistic.content.clone(),
            reply_to_id,
        };
        let mut next = self.messages.clone();
        next.push(optimistic);
        self.messages = next;
        self.pending.insert(temp_id, pending.clone());
        Ok(pending)
    }

    /// Replaces the optimistic message with the server's record. Returns
    /// `false` when `temp_id` is not pending (already settled or unknown).
    pub fn confirm(&mut self, temp_id: i64, server: Message) -> bool {
        if self.pending.remove(&temp_id).is_none() {
            tracing::debug!(temp_id, "confirmation for message that is not pending");
            return false;
        }

        let already_present = self.messages.iter().any(|m| m.id == server.id);
        self.messages = if already_present {
            // A refetch delivered the canonical copy first; drop the ghost.
            self.messages
                .iter()
                .filter(|m| m.id != temp_id)
                .cloned()
                .collect()
        } else {
            self.messages
                .iter()
                .map(|m| {
                    if m.id == temp_id {
                        Message {
                            is_liked: server.is_liked.or(m.is_liked),
                            is_deleted: server.is_deleted.or(m.is_deleted),
                            ..server.clone()
                        }
                    } else {
                        m.clone()
                    }
                })
                .collect()
        };
        true
    }

    /// Drops a message the server rejected. The list is left exactly as it
    /// was before `begin_send`.
    pub fn fail(&mut self, temp_id: i64) -> Option<Message> {
        self.pending.remove(&temp_id)?;
        let removed = self.get(temp_id).cloned();
        self.messages = self
            .messages
            .iter()
            .filter(|m| m.id != temp_id)
            .cloned()
            .collect();
        self.failed.insert(temp_id);
        removed
    }

    pub fn begin_delete(&mut self, message_id: i64) -> Result<DeleteTicket> {
        if self.pending.contains_key(&message_id) {
            return Err(ClientError::validation("message is still being sent"));
        }
        let previous = self
            .get(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {message_id}")))?
            .is_deleted;
        self.set_deleted(message_id, Some(true));
        Ok(DeleteTicket {
            message_id,
            previous,
        })
    }

    /// The optimistic mark already matches the server; only the ticket is
    /// consumed.
    pub fn confirm_delete(&mut self, ticket: DeleteTicket) {
        tracing::debug!(message_id = ticket.message_id, "message delete confirmed");
    }

    pub fn rollback_delete(&mut self, ticket: DeleteTicket) {
        self.set_deleted(ticket.message_id, ticket.previous);
    }

    fn set_deleted(&mut self, message_id: i64, deleted: Option<bool>) {
        self.messages = self
            .messages
            .iter()
            .map(|m| {
                if m.id == message_id {
                    Message {
                        is_deleted: deleted,
                        ..m.clone()
                    }
                } else {
                    m.clone()
                }
            })
            .collect();
    }

    /// Flips the like flag optimistically and returns the new value.
    pub fn toggle_like(&mut self, message_id: i64) -> Option<bool> {
        let liked = !self.get(message_id)?.liked();
        self.set_liked(message_id, liked);
        Some(liked)
    }

    pub fn rollback_like(&mut self, message_id: i64, previous: bool) {
        self.set_liked(message_id, previous);
    }

    fn set_liked(&mut self, message_id: i64, liked: bool) {
        self.messages = self
            .messages
            .iter()
            .map(|m| {
                if m.id == message_id {
                    Message {
                        is_liked: Some(liked),
                        ..m.clone()
                    }
                } else {
                    m.clone()
                }
            })
            .collect();
    }

    pub fn date_groups(&self) -> Vec<DateGroup> {
        group_by_date(&self.messages)
    }

    fn next_temp_id(&mut self) -> i64 {
        let mut candidate = now_millis().max(self.last_temp_id + 1);
        while self.messages.iter().any(|m| m.id == candidate) {
            candidate += 1;
        }
        self.last_temp_id = candidate;
        candidate
    }
}

/// Buckets messages by calendar day, oldest day first, each bucket ordered
/// by numeric id.
pub fn group_by_date(messages: &[Message]) -> Vec<DateGroup> {
    let mut days: BTreeMap<NaiveDate, Vec<Message>> = BTreeMap::new();
    let mut undated = Vec::new();
    for message in messages {
        match calendar_day(&message.created_at) {
            Some(day) => days.entry(day).or_default().push(message.clone()),
            None => undated.push(message.clone()),
        }
    }

    let mut groups: Vec<DateGroup> = days
        .into_iter()
        .map(|(day, messages)| DateGroup {
            day: Some(day),
            messages,
        })
        .collect();
    if !undated.is_empty() {
        groups.push(DateGroup {
            day: None,
            messages: undated,
        });
    }
    for group in &mut groups {
        group.messages.sort_by_key(|m| m.id);
    }
    groups
}
