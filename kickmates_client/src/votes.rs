//! Applies server-confirmed vote totals to comments.
//!
//! Vote fields are overwritten rather than incremented, so replaying the same
//! update any number of times leaves the tree exactly as the first
//! application did. An update for an id that is no longer present (stale
//! cache) leaves everything unchanged.

use crate::models::{Comment, CommentNode, Vote, VoteUpdate};

fn overwrite(comment: &Comment, update: &VoteUpdate) -> Comment {
    Comment {
        thumbs_up: update.thumbs_up,
        thumbs_down: update.thumbs_down,
        user_vote: update.user_vote,
        ..comment.clone()
    }
}

/// Returns a copy of `tree` with the matching node's vote fields replaced.
pub fn apply_vote(tree: &[CommentNode], update: &VoteUpdate) -> Vec<CommentNode> {
    if !tree_contains(tree, update.comment_id) {
        tracing::debug!(
            comment_id = update.comment_id,
            "vote update for unknown comment ignored"
        );
        return tree.to_vec();
    }
    map_nodes(tree, update)
}

fn map_nodes(nodes: &[CommentNode], update: &VoteUpdate) -> Vec<CommentNode> {
    nodes
        .iter()
        .map(|node| {
            if node.id() == update.comment_id {
                CommentNode {
                    comment: overwrite(&node.comment, update),
                    replies: node.replies.clone(),
                }
            } else if !node.replies.is_empty() {
                CommentNode {
                    comment: node.comment.clone(),
                    replies: map_nodes(&node.replies, update),
                }
            } else {
                node.clone()
            }
        })
        .collect()
}

/// Same overwrite, applied to the flat list the tree is derived from.
pub fn apply_vote_to_list(comments: &[Comment], update: &VoteUpdate) -> Vec<Comment> {
    comments
        .iter()
        .map(|comment| {
            if comment.id == update.comment_id {
                overwrite(comment, update)
            } else {
                comment.clone()
            }
        })
        .collect()
}

pub fn tree_contains(tree: &[CommentNode], comment_id: i64) -> bool {
    tree.iter()
        .any(|node| node.id() == comment_id || tree_contains(&node.replies, comment_id))
}

/// Vote to send when the user presses `requested`: pressing the active
/// direction again clears the vote.
pub fn toggle_vote(current: Option<Vote>, requested: Vote) -> Option<Vote> {
    if current == Some(requested) {
        None
    } else {
        Some(requested)
    }
}
