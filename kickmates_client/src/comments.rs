use crate::error::{ClientError, Result};
use crate::models::{Comment, CommentNode, VoteUpdate};
use crate::threading::{thread_comments, CommentSort, ReplyOrder};
use crate::votes::apply_vote_to_list;
use std::collections::HashSet;

pub const MAX_COMMENT_CHARS: usize = 1000;

/// Where a comment list lives on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentScope {
    Event(i64),
    Discussion(i64),
}

impl CommentScope {
    pub fn path(&self) -> String {
        match self {
            CommentScope::Event(id) => format!("/events/{id}/comments"),
            CommentScope::Discussion(id) => format!("/discussions/{id}/comments"),
        }
    }

    /// Event pages show replies oldest first; discussion pages keep the
    /// order of the sorted list.
    pub fn default_reply_order(&self) -> ReplyOrder {
        match self {
            CommentScope::Event(_) => ReplyOrder::OldestFirst,
            CommentScope::Discussion(_) => ReplyOrder::Inherit,
        }
    }
}

/// Guard handed out while a comment submission is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionTicket {
    content: String,
    parent_comment_id: Option<i64>,
}

impl SubmissionTicket {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn parent_comment_id(&self) -> Option<i64> {
        self.parent_comment_id
    }
}

/// Owns the flat comment list for one event or discussion along with the
/// tree derived from it. Every change swaps in a new list and rebuilds.
#[derive(Debug, Clone)]
pub struct CommentThread {
    scope: CommentScope,
    comments: Vec<Comment>,
    sort: CommentSort,
    reply_order: ReplyOrder,
    tree: Vec<CommentNode>,
    in_flight: HashSet<SubmissionTicket>,
}

impl CommentThread {
    pub fn new(scope: CommentScope) -> Self {
        Self {
            scope,
            comments: Vec::new(),
            sort: CommentSort::default(),
            reply_order: scope.default_reply_order(),
            tree: Vec::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn with_comments(scope: CommentScope, comments: Vec<Comment>) -> Self {
        let mut thread = Self::new(scope);
        thread.replace_all(comments);
        thread
    }

    pub fn scope(&self) -> CommentScope {
        self.scope
    }

    pub fn sort(&self) -> CommentSort {
        self.sort
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn tree(&self) -> &[CommentNode] {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn contains(&self, comment_id: i64) -> bool {
        self.comments.iter().any(|c| c.id == comment_id)
    }

    pub fn set_sort(&mut self, sort: CommentSort) {
        self.sort = sort;
        self.rebuild();
    }

    pub fn set_reply_order(&mut self, reply_order: ReplyOrder) {
        self.reply_order = reply_order;
        self.rebuild();
    }

    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        let mut seen = HashSet::with_capacity(comments.len());
        self.comments = comments.into_iter().filter(|c| seen.insert(c.id)).collect();
        self.rebuild();
    }

    /// Validates a new comment and reserves it against double submission.
    pub fn begin_submit(
        &mut self,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<SubmissionTicket> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ClientError::validation("comment may not be empty"));
        }
        if trimmed.chars().count() > MAX_COMMENT_CHARS {
            return Err(ClientError::validation(format!(
                "comment may not exceed {MAX_COMMENT_CHARS} characters"
            )));
        }
        if let Some(parent) = parent_comment_id {
            if !self.contains(parent) {
                return Err(ClientError::validation(format!(
                    "cannot reply to comment {parent}: it is no longer in this thread"
                )));
            }
        }
        let ticket = SubmissionTicket {
            content: trimmed.to_string(),
            parent_comment_id,
        };
        if !self.in_flight.insert(ticket.clone()) {
            return Err(ClientError::validation("this comment is already being posted"));
        }
        Ok(ticket)
    }

    /// Records the server's copy of a submitted comment. Returns `false` when
    /// a comment with the same id is already present.
    pub fn complete_submit(&mut self, ticket: &SubmissionTicket, comment: Comment) -> bool {
        self.in_flight.remove(ticket);
        self.insert(comment)
    }

    pub fn abort_submit(&mut self, ticket: &SubmissionTicket) {
        self.in_flight.remove(ticket);
    }

    pub fn is_submitting(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Adds a comment unless one with the same id is already present.
    pub fn insert(&mut self, comment: Comment) -> bool {
        if self.contains(comment.id) {
            tracing::debug!(comment_id = comment.id, "comment already present, skipping insert");
            return false;
        }
        let mut next = self.comments.clone();
        next.push(comment);
        self.comments = next;
        self.rebuild();
        true
    }

    pub fn apply_vote(&mut self, update: &VoteUpdate) {
        self.comments = apply_vote_to_list(&self.comments, update);
        self.rebuild();
    }

    /// Removes a comment and every reply beneath it. Returns the number of
    /// comments removed.
    pub fn remove(&mut self, comment_id: i64) -> usize {
        if !self.contains(comment_id) {
            return 0;
        }
        let mut doomed = HashSet::from([comment_id]);
        loop {
            let before = doomed.len();
            for comment in &self.comments {
                if let Some(parent) = comment.parent_comment_id {
                    if doomed.contains(&parent) {
                        doomed.insert(comment.id);
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        let before = self.comments.len();
        self.comments = self
            .comments
            .iter()
            .filter(|c| !doomed.contains(&c.id))
            .cloned()
            .collect();
        self.rebuild();
        before - self.comments.len()
    }

    fn rebuild(&mut self) {
        self.tree = thread_comments(&self.comments, self.sort, self.reply_order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vote;
    use crate::threading::count_nodes;
    use crate::threading::tests::comment;

    fn thread() -> CommentThread {
        CommentThread::with_comments(
            CommentScope::Event(1),
            vec![
                comment(1, None, "2024-01-01"),
                comment(2, Some(1), "2024-01-02"),
                comment(3, Some(2), "2024-01-03"),
                comment(4, None, "2024-01-04"),
            ],
        )
    }

    #[test]
    fn double_submit_is_rejected_until_completion() {
        let mut thread = thread();
        let ticket = thread.begin_submit("  great game  ", None).expect("first submit");
        assert_eq!(ticket.content(), "great game");
        let err = thread.begin_submit("great game", None).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        assert!(thread.complete_submit(&ticket, comment(5, None, "2024-01-05")));
        assert!(!thread.is_submitting());
        assert!(thread.begin_submit("great game", None).is_ok());
    }

    #[test]
    fn late_response_does_not_duplicate_refetched_comment() {
        let mut thread = thread();
        let ticket = thread.begin_submit("late", None).expect("submit");
        let mut refetched = thread.comments().to_vec();
        refetched.push(comment(5, None, "2024-01-05"));
        thread.replace_all(refetched);
        assert!(!thread.complete_submit(&ticket, comment(5, None, "2024-01-05")));
        assert_eq!(thread.len(), 5);
        assert_eq!(count_nodes(thread.tree()), 5);
    }

    #[test]
    fn aborted_submit_releases_guard() {
        let mut thread = thread();
        let ticket = thread.begin_submit("retry me", Some(1)).expect("submit");
        thread.abort_submit(&ticket);
        assert!(thread.begin_submit("retry me", Some(1)).is_ok());
    }

    #[test]
    fn validation_blocks_bad_input() {
        let mut thread = thread();
        assert!(thread.begin_submit("   ", None).is_err());
        assert!(thread.begin_submit(&"x".repeat(MAX_COMMENT_CHARS + 1), None).is_err());
        assert!(thread.begin_submit("reply", Some(77)).is_err());
        assert!(!thread.is_submitting());
    }

    #[test]
    fn removing_a_comment_removes_its_subtree() {
        let mut thread = thread();
        assert_eq!(thread.remove(2), 2);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.remove(2), 0);
        assert_eq!(thread.tree().len(), 2);
    }

    #[test]
    fn vote_updates_rebuild_tree() {
        let mut thread = thread();
        thread.apply_vote(&VoteUpdate {
            comment_id: 3,
            thumbs_up: 0,
            thumbs_down: 2,
            user_vote: Some(Vote::Down),
        });
        let node = crate::threading::find_node(thread.tree(), 3).expect("node 3");
        assert_eq!(node.comment.thumbs_down, 2);
    }

    #[test]
    fn event_threads_show_oldest_reply_first() {
        let mut thread = CommentThread::with_comments(
            CommentScope::Event(9),
            vec![
                comment(1, None, "2024-01-01"),
                comment(2, Some(1), "2024-01-02"),
                comment(3, Some(1), "2024-01-03"),
            ],
        );
        let replies: Vec<i64> = thread.tree()[0].replies.iter().map(|n| n.id()).collect();
        assert_eq!(replies, vec![2, 3]);

        thread.set_sort(CommentSort::Oldest);
        assert_eq!(thread.sort(), CommentSort::Oldest);
        assert_eq!(CommentScope::Discussion(1).path(), "/discussions/1/comments");
    }
}
