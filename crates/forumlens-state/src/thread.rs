//! Reply-thread reconstruction.
//!
//! Replies only store their direct `parent_id`; depth and display order are
//! recovered here by walking parent links.

use std::collections::HashMap;

use crate::storage_traits::ReplyRecord;

/// Maximum number of characters of a reply body shown by [`render_thread`].
pub const PREVIEW_CHARS: usize = 150;

/// Depth of every reply: the number of reply ancestors above it.
///
/// Top-level replies (parent is the submission, or an unknown id) have
/// depth 0. Walks are bounded by the number of replies, so a parent cycle
/// cannot loop forever.
pub fn reply_depths(replies: &[ReplyRecord]) -> HashMap<String, usize> {
    let by_id: HashMap<&str, &ReplyRecord> =
        replies.iter().map(|r| (r.reply_id.as_str(), r)).collect();

    let mut depths = HashMap::with_capacity(replies.len());
    for reply in replies {
        let mut depth = 0;
        let mut parent = reply.parent_id.as_str();
        while let Some(ancestor) = by_id.get(parent) {
            depth += 1;
            if depth >= replies.len() {
                break;
            }
            parent = ancestor.parent_id.as_str();
        }
        depths.insert(reply.reply_id.clone(), depth);
    }
    depths
}

/// Render replies as an indented outline, one line per reply.
///
/// Children follow their parent (depth-first, siblings in input order);
/// each level indents by four spaces. Bodies are flattened to one line and
/// cut to [`PREVIEW_CHARS`] characters.
pub fn render_thread(replies: &[ReplyRecord]) -> Vec<String> {
    let depths = reply_depths(replies);
    let known: HashMap<&str, usize> = replies
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.reply_id.as_str(), idx))
        .collect();

    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (idx, reply) in replies.iter().enumerate() {
        if known.contains_key(reply.parent_id.as_str()) && reply.parent_id != reply.reply_id {
            children
                .entry(reply.parent_id.as_str())
                .or_default()
                .push(idx);
        } else {
            roots.push(idx);
        }
    }

    let mut lines = Vec::with_capacity(replies.len());
    let mut visited = vec![false; replies.len()];
    // Replies caught in a parent cycle have no root; they are emitted last.
    let starts: Vec<usize> = roots.into_iter().chain(0..replies.len()).collect();
    for start in starts {
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            let reply = &replies[idx];
            let depth = depths.get(&reply.reply_id).copied().unwrap_or(0);
            lines.push(format!("{}- {}", "    ".repeat(depth), preview(&reply.body)));
            if let Some(kids) = children.get(reply.reply_id.as_str()) {
                stack.extend(kids.iter().rev().copied());
            }
        }
    }
    lines
}

fn preview(body: &str) -> String {
    body.chars()
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', "    ")
}
