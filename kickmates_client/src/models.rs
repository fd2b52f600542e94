use serde::{Deserialize, Serialize};

/// Direction of a comment vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Up => "up",
            Vote::Down => "down",
        }
    }
}

impl std::str::FromStr for Vote {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" | "+" | "+1" => Ok(Vote::Up),
            "down" | "-" | "-1" => Ok(Vote::Down),
            other => Err(format!("unknown vote direction '{other}' (expected up or down)")),
        }
    }
}

/// A comment as the server returns it, either under an event or a discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub thumbs_up: i64,
    #[serde(default)]
    pub thumbs_down: i64,
    #[serde(default)]
    pub user_vote: Option<Vote>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

/// A comment together with its direct replies. Always derived from a flat
/// comment list by [`crate::threading::build_comment_tree`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn leaf(comment: Comment) -> Self {
        Self {
            comment,
            replies: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.comment.id
    }
}

/// Server-confirmed vote totals for one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteUpdate {
    #[serde(default)]
    pub comment_id: i64,
    pub thumbs_up: i64,
    pub thumbs_down: i64,
    #[serde(default)]
    pub user_vote: Option<Vote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentInput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteInput {
    /// `None` clears the caller's vote.
    pub vote_type: Option<Vote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: String,
    #[serde(default)]
    pub reply_to_id: Option<i64>,
    #[serde(default)]
    pub reply_to_content: Option<String>,
    #[serde(default)]
    pub reply_to_sender: Option<String>,
    #[serde(default)]
    pub is_liked: Option<bool>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
}

impl Message {
    pub fn deleted(&self) -> bool {
        self.is_deleted.unwrap_or(false)
    }

    pub fn liked(&self) -> bool {
        self.is_liked.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
}

/// Snapshot of the most recent message, denormalised onto the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub created_at: String,
    pub sender_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    #[serde(default)]
    pub other_profile_image: Option<String>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sport_type: String,
    pub location: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    pub max_players: i64,
    #[serde(default)]
    pub current_players: i64,
    #[serde(default)]
    pub creator_id: Option<i64>,
    #[serde(default)]
    pub creator_username: Option<String>,
    #[serde(default)]
    pub is_joined: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub creator_username: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub related_id: Option<i64>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: String,
}

/// Error payload shape used by the server for non-success responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}
