//! Document edit operations and position transformation.
//!
//! Positions and lengths count Unicode scalar values (`char`s), never bytes,
//! so a client and the server agree on offsets regardless of encoding.
//!
//! ## Transform rules
//!
//! An operation created against `base_version` is rebased over every
//! operation committed after it, in commit order:
//!
//! ```text
//! prior insert at q (n chars)     incoming at p
//!   q <= p                        p += n
//!   p < q < p + len (delete)      len += n   (delete swallows the insert)
//!
//! prior delete [q, q + m)         incoming at p
//!   q + m <= p                    p -= m
//!   q < p < q + m                 p = q      (clamped at the boundary)
//!   ranges overlap (delete)       len -= overlap
//! ```
//!
//! A replace behaves as a delete followed by an insert at the same position.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CollabError, Result};

/// What an operation does at its target position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Insert { text: String },
    Delete { len: usize },
    Replace { len: usize, text: String },
}

impl OpKind {
    /// Number of chars removed at the target position.
    pub fn removed(&self) -> usize {
        match self {
            OpKind::Insert { .. } => 0,
            OpKind::Delete { len } | OpKind::Replace { len, .. } => *len,
        }
    }

    /// Number of chars inserted at the target position.
    pub fn inserted(&self) -> usize {
        match self {
            OpKind::Insert { text } | OpKind::Replace { text, .. } => text.chars().count(),
            OpKind::Delete { .. } => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Insert { .. } => "insert",
            OpKind::Delete { .. } => "delete",
            OpKind::Replace { .. } => "replace",
        }
    }

    fn removed_mut(&mut self) -> Option<&mut usize> {
        match self {
            OpKind::Insert { .. } => None,
            OpKind::Delete { len } | OpKind::Replace { len, .. } => Some(len),
        }
    }
}

/// A single edit submitted by one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub author: Uuid,
    pub position: usize,
    pub kind: OpKind,
    /// Version the author believed current when creating the operation
    pub base_version: u64,
    /// Assigned by the document actor at commit time
    pub applied_version: Option<u64>,
}

impl Operation {
    pub fn new(author: Uuid, position: usize, kind: OpKind, base_version: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            position,
            kind,
            base_version,
            applied_version: None,
        }
    }

    /// Insert `text` before char `position`.
    pub fn insert(author: Uuid, position: usize, text: impl Into<String>, base_version: u64) -> Self {
        Self::new(author, position, OpKind::Insert { text: text.into() }, base_version)
    }

    /// Remove `len` chars starting at `position`.
    pub fn delete(author: Uuid, position: usize, len: usize, base_version: u64) -> Self {
        Self::new(author, position, OpKind::Delete { len }, base_version)
    }

    /// Remove `len` chars at `position`, then insert `text` there.
    pub fn replace(
        author: Uuid,
        position: usize,
        len: usize,
        text: impl Into<String>,
        base_version: u64,
    ) -> Self {
        Self::new(
            author,
            position,
            OpKind::Replace { len, text: text.into() },
            base_version,
        )
    }

    /// Reject operations that would be malformed against any content.
    pub fn validate_shape(&self) -> Result<()> {
        match &self.kind {
            OpKind::Insert { text } if text.is_empty() => {
                Err(CollabError::invalid("insert with empty text"))
            }
            OpKind::Delete { len: 0 } => Err(CollabError::invalid("delete with zero length")),
            OpKind::Replace { len: 0, text } if text.is_empty() => {
                Err(CollabError::invalid("replace that neither removes nor inserts"))
            }
            _ => Ok(()),
        }
    }

    /// Check the target range fits inside content of `content_len` chars.
    pub fn check_bounds(&self, content_len: usize) -> Result<()> {
        if self.position > content_len {
            return Err(CollabError::invalid(format!(
                "position {} beyond content length {}",
                self.position, content_len
            )));
        }
        let end = self.position.checked_add(self.kind.removed()).ok_or_else(|| {
            CollabError::invalid("delete length overflows")
        })?;
        if end > content_len {
            return Err(CollabError::invalid(format!(
                "{} range {}..{} beyond content length {}",
                self.kind.name(),
                self.position,
                end,
                content_len
            )));
        }
        Ok(())
    }

    /// Apply this operation to `content`. Bounds are checked first, so a
    /// failed call leaves `content` unchanged.
    pub fn apply(&self, content: &mut String) -> Result<()> {
        let content_len = content.chars().count();
        self.check_bounds(content_len)?;

        let start = byte_offset(content, self.position);
        let end = byte_offset(content, self.position + self.kind.removed());
        match &self.kind {
            OpKind::Insert { text } => content.insert_str(start, text),
            OpKind::Delete { .. } => {
                content.replace_range(start..end, "");
            }
            OpKind::Replace { text, .. } => content.replace_range(start..end, text),
        }
        Ok(())
    }

    /// Rebase this operation over `prior`, an operation committed after
    /// this one's base version.
    pub fn transform_against(&mut self, prior: &Operation) {
        let q = prior.position;

        // Delete half of the prior operation.
        let m = prior.kind.removed();
        if m > 0 {
            let p = self.position;
            let len = self.kind.removed();
            let removed_before = m.min(p.saturating_sub(q));
            let overlap = p.saturating_add(len).min(q.saturating_add(m)).saturating_sub(p.max(q));
            self.position = p - removed_before;
            if let Some(l) = self.kind.removed_mut() {
                *l -= overlap;
            }
        }

        // Insert half of the prior operation.
        let n = prior.kind.inserted();
        if n > 0 {
            let p = self.position;
            let len = self.kind.removed();
            if q <= p {
                self.position = p.saturating_add(n);
            } else if q < p.saturating_add(len) {
                if let Some(l) = self.kind.removed_mut() {
                    *l = l.saturating_add(n);
                }
            }
        }
    }

    /// Rebase over a sequence of committed operations in commit order.
    pub fn transform_over<'a>(&mut self, committed: impl IntoIterator<Item = &'a Operation>) {
        for prior in committed {
            self.transform_against(prior);
        }
    }

    /// True when the operation changes nothing (a delete whose whole range
    /// was already removed by concurrent edits).
    pub fn is_noop(&self) -> bool {
        self.kind.removed() == 0 && self.kind.inserted() == 0
    }
}

/// Byte offset of the `index`-th char, or the end of the string.
fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map_or(s.len(), |(b, _)| b)
}
