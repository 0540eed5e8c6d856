//! Document state and the per-document actor that serializes edits.
//!
//! ```text
//!   DocumentHandle (Clone)      mpsc      DocumentActor (tokio task)
//!   ┌─────────────────────┐  ────────▶  ┌──────────────────────────────┐
//!   │ .submit()           │             │ Document (content, version,  │
//!   │ .update_cursor()    │  ◀────────  │   operation log, lock)       │
//!   │ .lock() / .unlock() │   oneshot   │ publishes on Topic::Document │
//!   └─────────────────────┘             └──────────────────────────────┘
//! ```
//!
//! The actor is the only writer of its document. Commands are handled one
//! at a time and each resulting event is published before the caller gets
//! its reply, so subscribers observe edits in applied-version order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::broadcast::BroadcastHub;
use crate::cursor::{Cursor, Selection};
use crate::error::{CollabError, Result};
use crate::event::{CollabEvent, Topic};
use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentKind {
    #[default]
    Text,
    Code,
    Whiteboard,
    Spreadsheet,
}

impl DocumentKind {
    /// Whether stale operations can be rebased. Other kinds require the
    /// author to be at the current version.
    pub fn supports_transform(&self) -> bool {
        matches!(self, DocumentKind::Text | DocumentKind::Code)
    }
}

/// Immutable identity of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub kind: DocumentKind,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl DocumentInfo {
    /// Fresh identity with a new id, stamped now.
    pub fn new(workspace_id: Uuid, title: impl Into<String>, kind: DocumentKind, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            title: title.into(),
            kind,
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub info: DocumentInfo,
    pub content: String,
    pub version: u64,
    pub collaborators: BTreeSet<Uuid>,
    pub cursors: BTreeMap<Uuid, Cursor>,
    pub selections: BTreeMap<Uuid, Selection>,
    pub locked_by: Option<Uuid>,
}

/// Outcome of a committed submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub applied_version: u64,
    /// The operation as committed: transformed position and range, applied
    /// version filled in.
    pub operation: Operation,
}

/// Content, version and operation log of one document.
///
/// `version` always equals the log length, and `content` always equals the
/// initial content with the log replayed over it.
pub struct Document {
    info: DocumentInfo,
    initial: String,
    content: String,
    version: u64,
    log: Vec<Operation>,
    collaborators: BTreeSet<Uuid>,
    cursors: BTreeMap<Uuid, Cursor>,
    selections: BTreeMap<Uuid, Selection>,
    locked_by: Option<Uuid>,
}

impl Document {
    /// Document at version 0 holding `initial_content`.
    pub fn new(info: DocumentInfo, initial_content: impl Into<String>) -> Self {
        let initial = initial_content.into();
        Self {
            info,
            content: initial.clone(),
            initial,
            version: 0,
            log: Vec::new(),
            collaborators: BTreeSet::new(),
            cursors: BTreeMap::new(),
            selections: BTreeMap::new(),
            locked_by: None,
        }
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Current content: the initial text with the whole log applied.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of committed operations.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Committed operations; `log()[i]` produced version `i + 1`.
    pub fn log(&self) -> &[Operation] {
        &self.log
    }

    /// Current lock holder, if any.
    pub fn locked_by(&self) -> Option<Uuid> {
        self.locked_by
    }

    /// Validate, rebase if stale, apply and commit `op`. On error nothing
    /// changes.
    pub fn submit(&mut self, mut op: Operation) -> Result<SubmitResult> {
        op.validate_shape()?;

        let base = op.base_version;
        if base > self.version {
            return Err(CollabError::InvalidVersion { base, current: self.version });
        }
        if let Some(holder) = self.locked_by {
            if holder != op.author {
                return Err(CollabError::DocumentLocked { holder });
            }
        }
        if base < self.version {
            if !self.info.kind.supports_transform() {
                return Err(CollabError::InvalidVersion { base, current: self.version });
            }
            // log[i] produced version i + 1
            let since = &self.log[base as usize..];
            op.check_bounds(self.content_len_at(since))?;
            op.transform_over(since);
        }

        op.apply(&mut self.content)?;
        self.version += 1;
        op.applied_version = Some(self.version);
        self.collaborators.insert(op.author);
        self.log.push(op.clone());

        Ok(SubmitResult { applied_version: self.version, operation: op })
    }

    /// Char length of the content before `since` was applied, where
    /// `since` is a suffix of the log.
    fn content_len_at(&self, since: &[Operation]) -> usize {
        since.iter().rev().fold(self.content.chars().count(), |len, op| {
            (len + op.kind.removed()).saturating_sub(op.kind.inserted())
        })
    }

    /// Take the exclusive lock. Returns `false` if `user` already held it.
    pub fn lock(&mut self, user: Uuid) -> Result<bool> {
        match self.locked_by {
            Some(holder) if holder == user => Ok(false),
            Some(holder) => Err(CollabError::DocumentLocked { holder }),
            None => {
                self.locked_by = Some(user);
                Ok(true)
            }
        }
    }

    /// Release the lock. Returns `false` if the document was not locked.
    pub fn unlock(&mut self, user: Uuid) -> Result<bool> {
        match self.locked_by {
            None => Ok(false),
            Some(holder) if holder == user => {
                self.locked_by = None;
                Ok(true)
            }
            Some(holder) => Err(CollabError::DocumentLocked { holder }),
        }
    }

    /// Record `user`'s cursor. Last write wins.
    pub fn set_cursor(&mut self, user: Uuid, cursor: Cursor) {
        self.cursors.insert(user, cursor);
    }

    /// Record `user`'s selection. Last write wins.
    pub fn set_selection(&mut self, user: Uuid, selection: Selection) {
        self.selections.insert(user, selection);
    }

    /// Committed operations with an applied version greater than `version`.
    pub fn operations_since(&self, version: u64) -> Result<Vec<Operation>> {
        if version > self.version {
            return Err(CollabError::InvalidVersion { base: version, current: self.version });
        }
        Ok(self.log[version as usize..].to_vec())
    }

    /// Rebuild the content from the initial text and the log.
    pub fn replay(&self) -> Result<String> {
        let mut content = self.initial.clone();
        for op in &self.log {
            op.apply(&mut content)?;
        }
        Ok(content)
    }

    /// Owned copy of the full document state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            info: self.info.clone(),
            content: self.content.clone(),
            version: self.version,
            collaborators: self.collaborators.clone(),
            cursors: self.cursors.clone(),
            selections: self.selections.clone(),
            locked_by: self.locked_by,
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

enum DocumentCommand {
    Submit {
        op: Operation,
        reply: oneshot::Sender<Result<SubmitResult>>,
    },
    UpdateCursor {
        user: Uuid,
        cursor: Cursor,
        reply: oneshot::Sender<()>,
    },
    UpdateSelection {
        user: Uuid,
        selection: Selection,
        reply: oneshot::Sender<()>,
    },
    Lock {
        user: Uuid,
        reply: oneshot::Sender<Result<bool>>,
    },
    Unlock {
        user: Uuid,
        reply: oneshot::Sender<Result<bool>>,
    },
    Snapshot {
        reply: oneshot::Sender<DocumentSnapshot>,
    },
    OperationsSince {
        version: u64,
        reply: oneshot::Sender<Result<Vec<Operation>>>,
    },
    /// Stop after the commands already queued.
    Close,
}

struct DocumentActor {
    document: Document,
    hub: Arc<BroadcastHub>,
    rx: mpsc::UnboundedReceiver<DocumentCommand>,
}

impl DocumentActor {
    async fn run(mut self) {
        let id = self.document.info.id;
        log::debug!("document actor {id} started");
        while let Some(cmd) = self.rx.recv().await {
            if let DocumentCommand::Close = cmd {
                break;
            }
            self.handle(cmd).await;
        }
        log::debug!("document actor {id} stopped at version {}", self.document.version);
    }

    async fn handle(&mut self, cmd: DocumentCommand) {
        match cmd {
            DocumentCommand::Submit { op, reply } => {
                let op_id = op.id;
                let result = self.document.submit(op);
                match &result {
                    Ok(committed) => {
                        log::debug!(
                            "document {}: {} by {} committed at v{}",
                            self.id(),
                            committed.operation.kind.name(),
                            committed.operation.author,
                            committed.applied_version
                        );
                        self.publish(CollabEvent::DocumentEdited {
                            document_id: self.id(),
                            operation: committed.operation.clone(),
                        })
                        .await;
                    }
                    Err(e) => log::warn!("document {}: rejected operation {op_id}: {e}", self.id()),
                }
                let _ = reply.send(result);
            }
            DocumentCommand::UpdateCursor { user, cursor, reply } => {
                log::trace!("document {}: cursor {user} -> {cursor:?}", self.id());
                self.document.set_cursor(user, cursor);
                self.publish(CollabEvent::CursorUpdated { document_id: self.id(), user_id: user, cursor })
                    .await;
                let _ = reply.send(());
            }
            DocumentCommand::UpdateSelection { user, selection, reply } => {
                log::trace!("document {}: selection {user} -> {selection:?}", self.id());
                self.document.set_selection(user, selection);
                self.publish(CollabEvent::SelectionUpdated {
                    document_id: self.id(),
                    user_id: user,
                    selection,
                })
                .await;
                let _ = reply.send(());
            }
            DocumentCommand::Lock { user, reply } => {
                let result = self.document.lock(user);
                if let Ok(true) = result {
                    log::info!("document {} locked by {user}", self.id());
                    self.publish(CollabEvent::DocumentLocked { document_id: self.id(), user_id: user })
                        .await;
                }
                let _ = reply.send(result);
            }
            DocumentCommand::Unlock { user, reply } => {
                let result = self.document.unlock(user);
                if let Ok(true) = result {
                    log::info!("document {} unlocked by {user}", self.id());
                    self.publish(CollabEvent::DocumentUnlocked { document_id: self.id(), user_id: user })
                        .await;
                }
                let _ = reply.send(result);
            }
            DocumentCommand::Snapshot { reply } => {
                let _ = reply.send(self.document.snapshot());
            }
            DocumentCommand::OperationsSince { version, reply } => {
                let _ = reply.send(self.document.operations_since(version));
            }
            DocumentCommand::Close => {}
        }
    }

    fn id(&self) -> Uuid {
        self.document.info.id
    }

    async fn publish(&self, event: CollabEvent) {
        self.hub.publish(Topic::Document(self.id()), event).await;
    }
}

/// Cloneable handle to a running document actor.
///
/// The actor stops once every handle has been dropped or after
/// [`DocumentHandle::close`].
#[derive(Clone)]
pub struct DocumentHandle {
    info: Arc<DocumentInfo>,
    tx: mpsc::UnboundedSender<DocumentCommand>,
}

impl DocumentHandle {
    /// Spawn an actor owning `document` on the current tokio runtime.
    pub fn spawn(document: Document, hub: Arc<BroadcastHub>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let info = Arc::new(document.info.clone());
        let actor = DocumentActor { document, hub, rx };
        tokio::spawn(actor.run());
        Self { info, tx }
    }

    /// Document id, without a round trip to the actor.
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Submit an edit; resolves once it is committed and published.
    pub async fn submit(&self, op: Operation) -> Result<SubmitResult> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::Submit { op, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)?
    }

    /// Set a cursor and publish `CursorUpdated`.
    pub async fn update_cursor(&self, user: Uuid, cursor: Cursor) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::UpdateCursor { user, cursor, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)
    }

    /// Set a selection and publish `SelectionUpdated`.
    pub async fn update_selection(&self, user: Uuid, selection: Selection) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::UpdateSelection { user, selection, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)
    }

    /// Take the exclusive lock. See [`Document::lock`].
    pub async fn lock(&self, user: Uuid) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::Lock { user, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)?
    }

    /// Release the lock. See [`Document::unlock`].
    pub async fn unlock(&self, user: Uuid) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::Unlock { user, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)?
    }

    pub async fn snapshot(&self) -> Result<DocumentSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::Snapshot { reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)
    }

    /// Committed operations after `version`, for replay.
    pub async fn operations_since(&self, version: u64) -> Result<Vec<Operation>> {
        let (reply, rx) = oneshot::channel();
        self.send(DocumentCommand::OperationsSince { version, reply })?;
        rx.await.map_err(|_| CollabError::ActorShutdown)?
    }

    /// Ask the actor to stop once the commands already sent are handled.
    /// Later calls on any clone fail with `ActorShutdown`.
    pub fn close(&self) {
        let _ = self.tx.send(DocumentCommand::Close);
    }

    /// True once the actor task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, cmd: DocumentCommand) -> Result<()> {
        self.tx.send(cmd).map_err(|_| CollabError::ActorShutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn text_doc(content: &str) -> Document {
        Document::new(
            DocumentInfo::new(Uuid::new_v4(), "notes", DocumentKind::Text, Uuid::new_v4()),
            content,
        )
    }

    #[test]
    fn test_concurrent_insert_scenario() {
        let mut doc = text_doc("hello");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let r1 = doc.submit(Operation::insert(a, 0, "X", 0)).unwrap();
        assert_eq!(r1.applied_version, 1);
        assert_eq!(doc.content(), "Xhello");

        let r2 = doc.submit(Operation::insert(b, 5, "Y", 0)).unwrap();
        assert_eq!(r2.applied_version, 2);
        assert_eq!(r2.operation.position, 6);
        assert_eq!(doc.content(), "XhelloY");
    }

    #[test]
    fn test_version_equals_log_length() {
        let mut doc = text_doc("");
        let user = Uuid::new_v4();
        for i in 0..25 {
            doc.submit(Operation::insert(user, 0, "a", i)).unwrap();
        }
        assert_eq!(doc.version(), 25);
        assert_eq!(doc.log().len(), 25);
        for (i, op) in doc.log().iter().enumerate() {
            assert_eq!(op.applied_version, Some(i as u64 + 1));
        }
        assert_eq!(doc.replay().unwrap(), doc.content());
    }

    #[test]
    fn test_same_base_inserts_both_survive() {
        let mut doc = text_doc("");
        doc.submit(Operation::insert(Uuid::new_v4(), 0, "X", 0)).unwrap();
        doc.submit(Operation::insert(Uuid::new_v4(), 0, "Y", 0)).unwrap();
        assert_eq!(doc.content(), "XY");
        assert_eq!(doc.replay().unwrap(), "XY");
    }

    #[test]
    fn test_future_base_rejected_without_mutation() {
        let mut doc = text_doc("abc");
        let before = doc.snapshot();
        let err = doc.submit(Operation::insert(Uuid::new_v4(), 0, "x", 1)).unwrap_err();
        assert_eq!(err, CollabError::InvalidVersion { base: 1, current: 0 });
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_malformed_rejected_without_mutation() {
        let mut doc = text_doc("abc");
        let user = Uuid::new_v4();
        assert_eq!(
            doc.submit(Operation::delete(user, 2, 5, 0)).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(
            doc.submit(Operation::insert(user, 4, "x", 0)).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.content(), "abc");
        assert!(doc.snapshot().collaborators.is_empty());
    }

    #[test]
    fn test_stale_out_of_range_rejected_without_mutation() {
        let mut doc = text_doc("hello");
        let user = Uuid::new_v4();
        doc.submit(Operation::insert(user, 0, "XY", 0)).unwrap();
        let before = doc.snapshot();

        for op in [
            Operation::insert(user, usize::MAX, "Z", 0),
            Operation::delete(user, 0, usize::MAX, 0),
            Operation::replace(user, 3, usize::MAX, "Z", 0),
            // In range now, but not at the base version.
            Operation::insert(user, 6, "Z", 0),
        ] {
            let err = doc.submit(op).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        }
        assert_eq!(doc.snapshot(), before);

        doc.submit(Operation::insert(user, 0, "ok", 1)).unwrap();
        assert_eq!(doc.content(), "okXYhello");
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn test_stale_bounds_use_base_content() {
        let mut doc = text_doc("hello");
        doc.submit(Operation::delete(Uuid::new_v4(), 0, 3, 0)).unwrap();

        // End of "hello", rebased to the end of "lo".
        let r = doc.submit(Operation::insert(Uuid::new_v4(), 5, "!", 0)).unwrap();
        assert_eq!(r.operation.position, 2);
        assert_eq!(doc.content(), "lo!");
    }

    #[test]
    fn test_overlapping_deletes_commit_noop() {
        let mut doc = text_doc("abcdef");
        doc.submit(Operation::delete(Uuid::new_v4(), 1, 3, 0)).unwrap();
        let r = doc.submit(Operation::delete(Uuid::new_v4(), 2, 1, 0)).unwrap();

        assert!(r.operation.is_noop());
        assert_eq!(r.applied_version, 2);
        assert_eq!(doc.content(), "aef");
        assert_eq!(doc.replay().unwrap(), "aef");
    }

    #[test]
    fn test_lock_blocks_other_authors() {
        let mut doc = text_doc("draft");
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(doc.lock(owner).unwrap());
        assert!(!doc.lock(owner).unwrap());
        assert_eq!(doc.lock(other).unwrap_err(), CollabError::DocumentLocked { holder: owner });

        let err = doc.submit(Operation::insert(other, 0, "x", 0)).unwrap_err();
        assert_eq!(err, CollabError::DocumentLocked { holder: owner });
        doc.submit(Operation::insert(owner, 0, "x", 0)).unwrap();

        assert!(doc.unlock(other).is_err());
        assert!(doc.unlock(owner).unwrap());
        assert!(!doc.unlock(owner).unwrap());
        doc.submit(Operation::insert(other, 0, "y", 1)).unwrap();
        assert_eq!(doc.content(), "yxdraft");
    }

    #[test]
    fn test_whiteboard_requires_current_base() {
        let info = DocumentInfo::new(Uuid::new_v4(), "board", DocumentKind::Whiteboard, Uuid::new_v4());
        let mut doc = Document::new(info, "");
        doc.submit(Operation::insert(Uuid::new_v4(), 0, "shape", 0)).unwrap();

        let err = doc.submit(Operation::insert(Uuid::new_v4(), 0, "line", 0)).unwrap_err();
        assert_eq!(err, CollabError::InvalidVersion { base: 0, current: 1 });
        doc.submit(Operation::insert(Uuid::new_v4(), 0, "line", 1)).unwrap();
    }

    #[test]
    fn test_operations_since() {
        let mut doc = text_doc("");
        let user = Uuid::new_v4();
        for i in 0..4 {
            doc.submit(Operation::insert(user, 0, "z", i)).unwrap();
        }
        let tail = doc.operations_since(2).unwrap();
        assert_eq!(tail.iter().map(|op| op.applied_version).collect::<Vec<_>>(), vec![Some(3), Some(4)]);
        assert!(doc.operations_since(4).unwrap().is_empty());
        assert!(doc.operations_since(5).is_err());
    }

    #[test]
    fn test_cursor_last_write_wins() {
        let mut doc = text_doc("");
        let user = Uuid::new_v4();
        doc.set_cursor(user, Cursor::text(0, 1));
        doc.set_cursor(user, Cursor::text(2, 3));
        assert_eq!(doc.snapshot().cursors.get(&user), Some(&Cursor::text(2, 3)));
    }

    #[tokio::test]
    async fn test_actor_publishes_in_version_order() {
        let hub = Arc::new(BroadcastHub::new(64));
        let doc = text_doc("");
        let id = doc.info().id;
        let mut rx = hub.subscribe(Topic::Document(id)).await;
        let handle = DocumentHandle::spawn(doc, hub.clone());

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.submit(Operation::insert(Uuid::new_v4(), 0, "a", 0)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for expected in 1..=10u64 {
            let event = rx.recv().await.unwrap();
            match event.as_ref() {
                CollabEvent::DocumentEdited { operation, .. } => {
                    assert_eq!(operation.applied_version, Some(expected));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.version, 10);
        assert_eq!(snapshot.content, "a".repeat(10));
        assert_eq!(snapshot.collaborators.len(), 10);
    }

    #[tokio::test]
    async fn test_actor_rejection_publishes_nothing() {
        let hub = Arc::new(BroadcastHub::new(8));
        let doc = text_doc("abc");
        let mut rx = hub.subscribe(Topic::Document(doc.info().id)).await;
        let handle = DocumentHandle::spawn(doc, hub.clone());

        assert!(handle.submit(Operation::insert(Uuid::new_v4(), 0, "x", 3)).await.is_err());
        handle.update_cursor(Uuid::new_v4(), Cursor::text(0, 0)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "cursor.updated");
    }

    #[tokio::test]
    async fn test_actor_survives_malformed_stale_submit() {
        let hub = Arc::new(BroadcastHub::new(8));
        let handle = DocumentHandle::spawn(text_doc("hello"), hub);
        let user = Uuid::new_v4();

        handle.submit(Operation::insert(user, 0, "XY", 0)).await.unwrap();
        let err = handle.submit(Operation::insert(user, usize::MAX, "Z", 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        let err = handle.submit(Operation::delete(user, 0, usize::MAX, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let r = handle.submit(Operation::insert(user, 0, "ok", 1)).await.unwrap();
        assert_eq!(r.applied_version, 2);
        assert_eq!(handle.snapshot().await.unwrap().content, "okXYhello");
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_actor_lock_events() {
        let hub = Arc::new(BroadcastHub::new(8));
        let doc = text_doc("");
        let mut rx = hub.subscribe(Topic::Document(doc.info().id)).await;
        let handle = DocumentHandle::spawn(doc, hub.clone());
        let user = Uuid::new_v4();

        assert!(handle.lock(user).await.unwrap());
        assert!(!handle.lock(user).await.unwrap());
        assert!(handle.unlock(user).await.unwrap());

        assert_eq!(rx.recv().await.unwrap().event_type(), "document.locked");
        assert_eq!(rx.recv().await.unwrap().event_type(), "document.unlocked");
        assert_eq!(handle.snapshot().await.unwrap().locked_by, None);
    }
}
