//! Anchored discussion threads on documents.
//!
//! Comments live beside the edit stream and never interact with operation
//! ordering. A comment-id index makes reply/resolve O(1) instead of scanning
//! every document's thread list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::cursor::Vec2;
use crate::error::{CollabError, EntityKind, Result};

/// Where in a document a comment is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Anchor {
    Text { line: u32, offset: u32 },
    Point(Vec2),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub document_id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub anchor: Anchor,
    pub resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentFilter {
    pub resolved: Option<bool>,
    pub author: Option<Uuid>,
}

pub struct CommentStore {
    by_document: HashMap<Uuid, Vec<Comment>>,
    /// comment id -> (document id, index in that document's list)
    index: HashMap<Uuid, (Uuid, usize)>,
    max_length: usize,
}

impl CommentStore {
    /// Empty store rejecting content longer than `max_length` chars.
    pub fn new(max_length: usize) -> Self {
        Self {
            by_document: HashMap::new(),
            index: HashMap::new(),
            max_length,
        }
    }

    /// Open a new thread on `document_id` at `anchor`.
    pub fn add(
        &mut self,
        document_id: Uuid,
        author: Uuid,
        content: String,
        anchor: Anchor,
    ) -> Result<Comment> {
        self.check_content(&content)?;
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            document_id,
            author,
            content,
            anchor,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            replies: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let thread = self.by_document.entry(document_id).or_default();
        self.index.insert(comment.id, (document_id, thread.len()));
        thread.push(comment.clone());
        Ok(comment)
    }

    /// Append a reply. Returns the thread's document id with the reply.
    pub fn reply(&mut self, comment_id: Uuid, author: Uuid, content: String) -> Result<(Uuid, Reply)> {
        self.check_content(&content)?;
        let comment = self.comment_mut(comment_id)?;
        let reply = Reply {
            id: Uuid::new_v4(),
            author,
            content,
            created_at: Utc::now(),
        };
        comment.replies.push(reply.clone());
        comment.updated_at = reply.created_at;
        Ok((comment.document_id, reply))
    }

    /// Mark resolved. The comment stays listed; hiding resolved threads is
    /// up to the reader.
    pub fn resolve(&mut self, comment_id: Uuid, resolver: Uuid) -> Result<Comment> {
        let comment = self.comment_mut(comment_id)?;
        let now = Utc::now();
        comment.resolved = true;
        comment.resolved_by = Some(resolver);
        comment.resolved_at = Some(now);
        comment.updated_at = now;
        Ok(comment.clone())
    }

    /// Reopen a resolved thread, clearing resolver and time.
    pub fn unresolve(&mut self, comment_id: Uuid) -> Result<Comment> {
        let comment = self.comment_mut(comment_id)?;
        comment.resolved = false;
        comment.resolved_by = None;
        comment.resolved_at = None;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    /// Thread by id.
    pub fn get(&self, comment_id: &Uuid) -> Option<&Comment> {
        let (document_id, i) = self.index.get(comment_id)?;
        self.by_document.get(document_id).and_then(|thread| thread.get(*i))
    }

    /// Comments on a document, in creation order.
    pub fn list(&self, document_id: &Uuid, filter: &CommentFilter) -> Vec<Comment> {
        self.by_document
            .get(document_id)
            .map(|thread| {
                thread
                    .iter()
                    .filter(|c| filter.resolved.map_or(true, |r| c.resolved == r))
                    .filter(|c| filter.author.map_or(true, |a| c.author == a))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Threads across all documents.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn comment_mut(&mut self, comment_id: Uuid) -> Result<&mut Comment> {
        let not_found = || CollabError::not_found(EntityKind::Comment, comment_id);
        let (document_id, i) = *self.index.get(&comment_id).ok_or_else(not_found)?;
        self.by_document
            .get_mut(&document_id)
            .and_then(|thread| thread.get_mut(i))
            .ok_or_else(not_found)
    }

    fn check_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(CollabError::invalid("empty comment"));
        }
        if content.chars().count() > self.max_length {
            return Err(CollabError::invalid(format!(
                "comment exceeds limit of {} chars",
                self.max_length
            )));
        }
        Ok(())
    }
}
