//! Turns the server's flat comment lists into reply trees.
//!
//! Replies whose parent is missing from the input (filtered out, deleted, or
//! part of a parent cycle) are promoted to top level so no comment is ever
//! dropped from the rendered thread.

use crate::models::{Comment, CommentNode};
use crate::utils::parse_timestamp;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
}

impl std::str::FromStr for CommentSort {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "newest" | "new" | "desc" => Ok(CommentSort::Newest),
            "oldest" | "old" | "asc" => Ok(CommentSort::Oldest),
            other => Err(format!("unknown sort '{other}' (expected newest or oldest)")),
        }
    }
}

/// How reply lists are ordered once the tree is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyOrder {
    /// Keep the order in which replies appeared in the sorted flat list.
    #[default]
    Inherit,
    /// Re-sort every reply list by creation time, oldest first.
    OldestFirst,
}

/// Total order on creation time. Unparsable timestamps sort after every
/// parsable one and compare among themselves as raw strings.
fn compare_created(a: &Comment, b: &Comment) -> Ordering {
    match (parse_timestamp(&a.created_at), parse_timestamp(&b.created_at)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    }
}

/// Stable sort of a flat comment list by creation time.
pub fn sort_comments(comments: &mut [Comment], sort: CommentSort) {
    match sort {
        CommentSort::Oldest => comments.sort_by(compare_created),
        CommentSort::Newest => comments.sort_by(|a, b| compare_created(b, a)),
    }
}

/// Two-pass grouping: index every comment by id, then hang each one under
/// its parent or at the top level.
pub fn build_comment_tree(comments: &[Comment]) -> Vec<CommentNode> {
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(comments.len());
    let mut unique: Vec<&Comment> = Vec::with_capacity(comments.len());
    for comment in comments {
        if index.contains_key(&comment.id) {
            tracing::debug!(comment_id = comment.id, "ignoring duplicate comment id");
            continue;
        }
        index.insert(comment.id, unique.len());
        unique.push(comment);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (position, comment) in unique.iter().enumerate() {
        match comment
            .parent_comment_id
            .filter(|parent| *parent != comment.id)
            .and_then(|parent| index.get(&parent))
        {
            Some(&parent) => children[parent].push(position),
            None => roots.push(position),
        }
    }

    let mut visited = HashSet::with_capacity(unique.len());
    let mut tree: Vec<CommentNode> = Vec::with_capacity(roots.len());
    for root in roots {
        tree.push(assemble(root, &unique, &children, &mut visited));
    }

    // Anything still unvisited hangs off a parent cycle; promote it.
    for position in 0..unique.len() {
        if !visited.contains(&position) {
            tracing::debug!(
                comment_id = unique[position].id,
                "promoting comment caught in a parent cycle"
            );
            tree.push(assemble(position, &unique, &children, &mut visited));
        }
    }

    tree
}

fn assemble(
    position: usize,
    comments: &[&Comment],
    children: &[Vec<usize>],
    visited: &mut HashSet<usize>,
) -> CommentNode {
    visited.insert(position);
    let replies = children[position]
        .iter()
        .filter(|child| !visited.contains(*child))
        .copied()
        .collect::<Vec<_>>()
        .into_iter()
        .map(|child| assemble(child, comments, children, visited))
        .collect();
    CommentNode {
        comment: comments[position].clone(),
        replies,
    }
}

/// Convenience wrapper: sort, build, then order replies.
pub fn thread_comments(
    comments: &[Comment],
    sort: CommentSort,
    reply_order: ReplyOrder,
) -> Vec<CommentNode> {
    let mut sorted = comments.to_vec();
    sort_comments(&mut sorted, sort);
    let mut tree = build_comment_tree(&sorted);
    if reply_order == ReplyOrder::OldestFirst {
        for node in &mut tree {
            sort_replies_oldest_first(node);
        }
    }
    tree
}

fn sort_replies_oldest_first(node: &mut CommentNode) {
    node.replies.sort_by(|a, b| compare_created(&a.comment, &b.comment));
    for reply in &mut node.replies {
        sort_replies_oldest_first(reply);
    }
}

/// Depth-first list of every id in the tree.
pub fn flatten_ids(tree: &[CommentNode]) -> Vec<i64> {
    let mut ids = Vec::new();
    collect_ids(tree, &mut ids);
    ids
}

fn collect_ids(nodes: &[CommentNode], ids: &mut Vec<i64>) {
    for node in nodes {
        ids.push(node.id());
        collect_ids(&node.replies, ids);
    }
}

pub fn count_nodes(tree: &[CommentNode]) -> usize {
    tree.iter().map(|node| 1 + count_nodes(&node.replies)).sum()
}

pub fn find_node(tree: &[CommentNode], comment_id: i64) -> Option<&CommentNode> {
    for node in tree {
        if node.id() == comment_id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.replies, comment_id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn comment(id: i64, parent: Option<i64>, created_at: &str) -> Comment {
        Comment {
            id,
            content: format!("comment {id}"),
            created_at: created_at.into(),
            user_id: 1,
            username: "player".into(),
            profile_image: None,
            parent_comment_id: parent,
            thumbs_up: 0,
            thumbs_down: 0,
            user_vote: None,
        }
    }

    fn root_ids(tree: &[CommentNode]) -> Vec<i64> {
        tree.iter().map(CommentNode::id).collect()
    }

    #[test]
    fn newest_sort_puts_latest_root_first() {
        let comments = vec![
            comment(1, None, "2024-01-01"),
            comment(2, Some(1), "2024-01-02"),
            comment(3, None, "2024-01-03"),
        ];
        let tree = thread_comments(&comments, CommentSort::Newest, ReplyOrder::Inherit);
        assert_eq!(root_ids(&tree), vec![3, 1]);
        assert_eq!(root_ids(&tree[1].replies), vec![2]);
    }

    #[test]
    fn sort_orders_follow_the_toggle() {
        let comments = vec![
            comment(2, None, "2024-01-02 09:00:00"),
            comment(1, None, "2024-01-01 09:00:00"),
            comment(3, None, "2024-01-03 09:00:00"),
        ];
        let newest = thread_comments(&comments, CommentSort::Newest, ReplyOrder::Inherit);
        let oldest = thread_comments(&comments, CommentSort::Oldest, ReplyOrder::Inherit);
        assert_eq!(root_ids(&newest), vec![3, 2, 1]);
        assert_eq!(root_ids(&oldest), vec![1, 2, 3]);
    }

    #[test]
    fn mixed_timestamp_formats_sort_consistently() {
        let comments = vec![
            comment(1, None, "2024-01-01T23:00:00+12:00"),
            comment(2, None, "2024-01-01 15:00:00"),
            comment(3, None, "2024-01-01 20:00 oops"),
            comment(4, None, "2024-01-01"),
            comment(5, None, "garbage"),
        ];
        for a in &comments {
            for b in &comments {
                assert_eq!(compare_created(a, b), compare_created(b, a).reverse());
                for c in &comments {
                    if compare_created(a, b).is_lt() && compare_created(b, c).is_lt() {
                        assert!(compare_created(a, c).is_lt());
                    }
                }
            }
        }

        let oldest = thread_comments(&comments, CommentSort::Oldest, ReplyOrder::Inherit);
        assert_eq!(root_ids(&oldest), vec![4, 1, 2, 3, 5]);
        let newest = thread_comments(&comments, CommentSort::Newest, ReplyOrder::Inherit);
        assert_eq!(root_ids(&newest), vec![5, 3, 2, 1, 4]);
    }

    #[test]
    fn orphans_are_promoted_not_dropped() {
        let comments = vec![comment(1, None, "2024-01-01"), comment(5, Some(99), "2024-01-02")];
        let tree = build_comment_tree(&comments);
        assert_eq!(root_ids(&tree), vec![1, 5]);
    }

    #[test]
    fn every_input_id_appears_exactly_once() {
        let comments = vec![
            comment(1, None, "2024-01-01"),
            comment(2, Some(1), "2024-01-02"),
            comment(3, Some(2), "2024-01-03"),
            comment(4, Some(1), "2024-01-04"),
            comment(5, Some(42), "2024-01-05"),
            comment(6, Some(7), "2024-01-06"),
            comment(7, Some(6), "2024-01-07"),
            comment(8, Some(8), "2024-01-08"),
        ];
        let tree = build_comment_tree(&comments);
        let mut ids = flatten_ids(&tree);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(count_nodes(&tree), comments.len());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut second = comment(1, None, "2024-01-02");
        second.content = "stale copy".into();
        let tree = build_comment_tree(&[comment(1, None, "2024-01-01"), second]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.content, "comment 1");
    }

    #[test]
    fn replies_can_be_resorted_oldest_first() {
        let comments = vec![
            comment(1, None, "2024-01-01"),
            comment(2, Some(1), "2024-01-02"),
            comment(3, Some(1), "2024-01-03"),
        ];
        let inherited = thread_comments(&comments, CommentSort::Newest, ReplyOrder::Inherit);
        assert_eq!(root_ids(&inherited[0].replies), vec![3, 2]);
        let sorted = thread_comments(&comments, CommentSort::Newest, ReplyOrder::OldestFirst);
        assert_eq!(root_ids(&sorted[0].replies), vec![2, 3]);
    }

    #[test]
    fn find_node_searches_nested_replies() {
        let comments = vec![
            comment(1, None, "2024-01-01"),
            comment(2, Some(1), "2024-01-02"),
            comment(3, Some(2), "2024-01-03"),
        ];
        let tree = build_comment_tree(&comments);
        assert_eq!(find_node(&tree, 3).map(CommentNode::id), Some(3));
        assert!(find_node(&tree, 4).is_none());
    }
}
