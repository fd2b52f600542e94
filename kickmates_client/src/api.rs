use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::comments::{CommentScope, CommentThread};
use crate::config::{sanitize_base_url, KickmatesConfig, DEFAULT_TIMEOUT_SECS};
use crate::conversations::ConversationList;
use crate::error::{ClientError, Result};
use crate::messages::MessageLog;
use crate::models::{
    AuthResponse, Comment, Conversation, CreateCommentInput, Discussion, ErrorBody, Event,
    LoginInput, Message, Notification, RegisterInput, SendMessageInput, User, Vote, VoteInput,
    VoteUpdate,
};
use crate::session::Session;
use crate::votes::toggle_vote;

/// Blocking client for the KickMates REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS), session)
    }

    pub fn from_config(config: &KickmatesConfig, session: Session) -> Result<Self> {
        Self::with_timeout(config.api_url.clone(), config.timeout, session)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Session,
    ) -> Result<Self> {
        let base_url = sanitize_base_url(base_url.into())
            .map_err(|err| ClientError::Config(format!("{err:#}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // --- auth ---

    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let input = LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.send_json(Method::POST, "/auth/login", &input)?;
        let user = auth.user.clone();
        self.session.establish(auth)?;
        Ok(user)
    }

    pub fn register(&self, input: &RegisterInput) -> Result<User> {
        let auth: AuthResponse = self.send_json(Method::POST, "/auth/register", input)?;
        let user = auth.user.clone();
        self.session.establish(auth)?;
        Ok(user)
    }

    pub fn profile(&self) -> Result<User> {
        self.get("/auth/profile")
    }

    // --- events ---

    pub fn list_events(&self) -> Result<Vec<Event>> {
        self.get("/events")
    }

    pub fn get_event(&self, event_id: i64) -> Result<Event> {
        self.get(&format!("/events/{event_id}"))
    }

    pub fn join_event(&self, event_id: i64) -> Result<()> {
        self.send_empty(Method::POST, &format!("/events/{event_id}/join"))
    }

    pub fn leave_event(&self, event_id: i64) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/events/{event_id}/join"))
    }

    pub fn bookmark_event(&self, event_id: i64) -> Result<()> {
        self.send_empty(Method::POST, &format!("/events/{event_id}/bookmark"))
    }

    pub fn unbookmark_event(&self, event_id: i64) -> Result<()> {
        self.delete(&format!("/events/{event_id}/bookmark"))
    }

    // --- discussions ---

    pub fn list_discussions(&self) -> Result<Vec<Discussion>> {
        self.get("/discussions")
    }

    pub fn get_discussion(&self, discussion_id: i64) -> Result<Discussion> {
        self.get(&format!("/discussions/{discussion_id}"))
    }

    // --- comments ---

    pub fn list_comments(&self, scope: CommentScope) -> Result<Vec<Comment>> {
        self.get(&scope.path())
    }

    pub fn create_comment(&self, scope: CommentScope, input: &CreateCommentInput) -> Result<Comment> {
        self.send_json(Method::POST, &scope.path(), input)
    }

    pub fn delete_comment(&self, scope: CommentScope, comment_id: i64) -> Result<()> {
        self.delete(&format!("{}/{comment_id}", scope.path()))
    }

    pub fn vote(
        &self,
        scope: CommentScope,
        comment_id: i64,
        vote_type: Option<Vote>,
    ) -> Result<VoteUpdate> {
        let mut update: VoteUpdate = self.send_json(
            Method::POST,
            &format!("{}/{comment_id}/vote", scope.path()),
            &VoteInput { vote_type },
        )?;
        update.comment_id = comment_id;
        Ok(update)
    }

    // --- messages ---

    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.get("/messages/conversations")
    }

    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.get(&format!("/messages/conversations/{conversation_id}/messages"))
    }

    pub fn post_message(&self, conversation_id: i64, input: &SendMessageInput) -> Result<Message> {
        self.send_json(
            Method::POST,
            &format!("/messages/conversations/{conversation_id}/messages"),
            input,
        )
    }

    pub fn remove_message(&self, message_id: i64) -> Result<()> {
        self.delete(&format!("/messages/{message_id}"))
    }

    pub fn like(&self, message_id: i64) -> Result<()> {
        self.send_empty(Method::POST, &format!("/messages/{message_id}/like"))
    }

    // --- notifications ---

    pub fn list_notifications(&self) -> Result<Vec<Notification>> {
        self.get("/notifications")
    }

    pub fn mark_notification_read(&self, notification_id: i64) -> Result<()> {
        self.send_empty(Method::PUT, &format!("/notifications/{notification_id}/read"))
    }

    // --- optimistic flows ---

    /// Sends a message through `log`: the message is visible as pending
    /// right away, then confirmed with the server copy or removed on failure.
    pub fn send_message(
        &self,
        log: &mut MessageLog,
        content: &str,
        reply_to_id: Option<i64>,
    ) -> Result<Message> {
        let sender = self.session.user().ok_or(ClientError::Unauthorized)?;
        let pending = log.begin_send(&sender, content, reply_to_id)?;
        let input = SendMessageInput {
            content: pending.content.clone(),
            reply_to_id,
        };
        match self.post_message(log.conversation_id(), &input) {
            Ok(server) => {
                log.confirm(pending.temp_id, server.clone());
                Ok(server)
            }
            Err(err) => {
                tracing::warn!(temp_id = pending.temp_id, error = %err, "message send failed");
                log.fail(pending.temp_id);
                Err(err)
            }
        }
    }

    /// [`Self::send_message`], then moves the conversation to the top of
    /// `inbox` with the new preview.
    pub fn send_and_update_inbox(
        &self,
        log: &mut MessageLog,
        inbox: &mut ConversationList,
        content: &str,
        reply_to_id: Option<i64>,
    ) -> Result<Message> {
        let message = self.send_message(log, content, reply_to_id)?;
        inbox.record_outgoing(log.conversation_id(), &message);
        Ok(message)
    }

    pub fn delete_message(&self, log: &mut MessageLog, message_id: i64) -> Result<()> {
        let ticket = log.begin_delete(message_id)?;
        match self.remove_message(message_id) {
            Ok(()) => {
                log.confirm_delete(ticket);
                Ok(())
            }
            Err(err) => {
                log.rollback_delete(ticket);
                Err(err)
            }
        }
    }

    pub fn like_message(&self, log: &mut MessageLog, message_id: i64) -> Result<bool> {
        let liked = log
            .toggle_like(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {message_id}")))?;
        if let Err(err) = self.like(message_id) {
            log.rollback_like(message_id, !liked);
            return Err(err);
        }
        Ok(liked)
    }

    pub fn load_comments(&self, thread: &mut CommentThread) -> Result<()> {
        let comments = self.list_comments(thread.scope())?;
        thread.replace_all(comments);
        Ok(())
    }

    pub fn post_comment(
        &self,
        thread: &mut CommentThread,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<Comment> {
        let ticket = thread.begin_submit(content, parent_comment_id)?;
        let input = CreateCommentInput {
            content: ticket.content().to_string(),
            parent_comment_id,
        };
        match self.create_comment(thread.scope(), &input) {
            Ok(comment) => {
                thread.complete_submit(&ticket, comment.clone());
                Ok(comment)
            }
            Err(err) => {
                thread.abort_submit(&ticket);
                Err(err)
            }
        }
    }

    /// Votes on a comment. Pressing the direction already chosen clears the
    /// vote. Totals are taken from the server response.
    pub fn vote_comment(
        &self,
        thread: &mut CommentThread,
        comment_id: i64,
        requested: Vote,
    ) -> Result<VoteUpdate> {
        let current = thread
            .comments()
            .iter()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| ClientError::NotFound(format!("comment {comment_id}")))?
            .user_vote;
        let update = self.vote(thread.scope(), comment_id, toggle_vote(current, requested))?;
        thread.apply_vote(&update);
        Ok(update)
    }

    pub fn remove_comment(&self, thread: &mut CommentThread, comment_id: i64) -> Result<usize> {
        self.delete_comment(thread.scope(), comment_id)?;
        Ok(thread.remove(comment_id))
    }

    // --- plumbing ---

    fn url(&self, path: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|err| ClientError::Config(format!("invalid URL {joined}: {err}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let mut builder = self.client.request(method, self.url(path)?);
        if let Some(bearer) = self.session.bearer() {
            builder = builder.header(AUTHORIZATION, bearer);
        }
        Ok(builder)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(self.request(Method::GET, path)?, path)?;
        decode(response)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.execute(self.request(method, path)?.json(body), path)?;
        decode(response)
    }

    fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        self.execute(self.request(method, path)?, path)?;
        Ok(())
    }

    /// DELETE where "already gone" counts as done.
    fn delete(&self, path: &str) -> Result<()> {
        match self.send_empty(Method::DELETE, path) {
            Err(ClientError::NotFound(_)) => {
                tracing::warn!(path, "delete target already gone, treating as success");
                Ok(())
            }
            other => other,
        }
    }

    fn execute(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder.send()?;
        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "api response");
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::UNAUTHORIZED if is_credential_path(path) => {
                Err(ClientError::validation("invalid email or password"))
            }
            StatusCode::UNAUTHORIZED => {
                if let Err(err) = self.session.invalidate() {
                    tracing::warn!(error = %err, "failed to clear stored session");
                }
                Err(ClientError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(path.to_string())),
            _ => {
                let body = response.text().unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .ok()
                    .and_then(ErrorBody::into_message)
                    .unwrap_or_else(|| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Endpoints that answer 401 for bad credentials rather than a stale token.
fn is_credential_path(path: &str) -> bool {
    matches!(path, "/auth/login" | "/auth/register")
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}
