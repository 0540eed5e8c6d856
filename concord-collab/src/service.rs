//! Engine facade wiring workspaces, rooms, documents, presence, chat,
//! comments and the activity log together.
//!
//! Every mutating call validates, mutates, publishes its event and logs an
//! activity entry; a call that fails leaves all state unchanged and emits
//! nothing.
//!
//! Lock order: room, then workspace, then chat channel, then the comment and
//! activity stores. Code that walks a workspace's rooms copies the room ids
//! and releases the workspace lock first.

use serde_json::json;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::activity::{ActivityEntry, ActivityKind, ActivityLog, ActivityQuery};
use crate::broadcast::BroadcastHub;
use crate::chat::{ChatChannel, ChatMessage, MessageDraft, MessageFilter};
use crate::comments::{Anchor, Comment, CommentFilter, CommentStore, Reply};
use crate::config::CollabConfig;
use crate::cursor::{Cursor, Selection};
use crate::document::{
    Document, DocumentHandle, DocumentInfo, DocumentKind, DocumentSnapshot, SubmitResult,
};
use crate::error::{CollabError, EntityKind, Result};
use crate::event::{CollabEvent, Topic};
use crate::operation::Operation;
use crate::presence::{PresenceRecord, PresenceStatus, PresenceTracker, SweepReport};
use crate::room::{JoinInfo, MediaState, Participant, Room, RoomSettings, RoomType};
use crate::store::{MemoryStore, Store};
use crate::workspace::{InvitePolicy, Visibility, Workspace};

/// Engine-wide counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollabStats {
    pub workspaces: usize,
    pub rooms: usize,
    pub documents: usize,
    pub tracked_users: usize,
    pub active_users: usize,
    pub events_published: u64,
    pub events_unobserved: u64,
    /// Broadcast topics with live subscribers
    pub topics: usize,
    pub activity_entries: usize,
}

pub struct CollabService {
    config: CollabConfig,
    workspaces: Box<dyn Store<Uuid, Arc<RwLock<Workspace>>>>,
    rooms: Box<dyn Store<Uuid, Arc<RwLock<Room>>>>,
    documents: Box<dyn Store<Uuid, DocumentHandle>>,
    /// room id -> chat channel
    chats: Box<dyn Store<Uuid, Arc<Mutex<ChatChannel>>>>,
    comments: Mutex<CommentStore>,
    activity: Mutex<ActivityLog>,
    presence: Arc<PresenceTracker>,
    hub: Arc<BroadcastHub>,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl CollabService {
    /// Validate `config` and build an engine with empty in-memory stores.
    pub fn new(config: CollabConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::build(CollabConfig::default())
    }

    fn build(config: CollabConfig) -> Self {
        Self {
            workspaces: Box::new(MemoryStore::new()),
            rooms: Box::new(MemoryStore::new()),
            documents: Box::new(MemoryStore::new()),
            chats: Box::new(MemoryStore::new()),
            comments: Mutex::new(CommentStore::new(config.max_comment_length)),
            activity: Mutex::new(ActivityLog::new(config.activity_capacity)),
            presence: Arc::new(PresenceTracker::new(&config)),
            hub: Arc::new(BroadcastHub::new(config.broadcast_capacity)),
            sweeper: StdMutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    /// Spawn the periodic presence sweep. Returns `false` if it is already
    /// running.
    pub fn start(&self) -> bool {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let presence = self.presence.clone();
        let hub = self.hub.clone();
        let period = presence.timeout();
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                sweep_and_publish(&presence, &hub).await;
            }
        }));
        log::info!("presence sweep started (every {period:?})");
        true
    }

    /// Stop the sweep, close every document actor and release the handles.
    pub fn shutdown(&self) {
        let sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = sweeper {
            handle.abort();
        }
        for id in self.documents.keys() {
            if let Some(handle) = self.documents.delete(&id) {
                handle.close();
            }
        }
        log::info!("collaboration service shut down");
    }

    /// Receive every event published on `topic` from now on.
    pub async fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Arc<CollabEvent>> {
        self.hub.subscribe(topic).await
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    // ── Workspaces ───────────────────────────────────────────────────────

    /// Create a private, owner-invites workspace.
    pub async fn create_workspace(&self, name: &str, owner: Uuid) -> Result<Workspace> {
        self.create_workspace_with_policy(name, owner, Visibility::default(), InvitePolicy::default())
            .await
    }

    pub async fn create_workspace_with_policy(
        &self,
        name: &str,
        owner: Uuid,
        visibility: Visibility,
        invite_policy: InvitePolicy,
    ) -> Result<Workspace> {
        check_name("workspace", name)?;
        let workspace = Workspace::new(name.trim(), owner).with_policy(visibility, invite_policy);
        let id = workspace.id;
        self.workspaces.put(id, Arc::new(RwLock::new(workspace.clone())));

        log::info!("workspace {id} '{}' created by {owner}", workspace.name);
        self.hub
            .publish(Topic::Workspace(id), CollabEvent::WorkspaceCreated { workspace: workspace.clone() })
            .await;
        self.record(ActivityEntry::new(ActivityKind::WorkspaceCreated, owner).workspace(id))
            .await;
        Ok(workspace)
    }

    /// Copy of the workspace state.
    pub async fn get_workspace(&self, workspace_id: Uuid) -> Result<Workspace> {
        Ok(self.workspace(workspace_id)?.read().await.clone())
    }

    /// Add `user_id` on behalf of `inviter`. Returns `false` if the user was
    /// already a member.
    pub async fn add_member(&self, workspace_id: Uuid, inviter: Uuid, user_id: Uuid) -> Result<bool> {
        let handle = self.workspace(workspace_id)?;
        let added = handle.write().await.add_member(&inviter, user_id)?;
        if added {
            log::info!("workspace {workspace_id}: {inviter} added {user_id}");
            self.hub
                .publish(Topic::Workspace(workspace_id), CollabEvent::MemberAdded { workspace_id, user_id })
                .await;
            self.record(
                ActivityEntry::new(ActivityKind::MemberAdded, inviter)
                    .workspace(workspace_id)
                    .payload(json!({ "user_id": user_id })),
            )
            .await;
        }
        Ok(added)
    }

    // ── Rooms ────────────────────────────────────────────────────────────

    /// Create a room. `settings` defaults to the room type's defaults with
    /// the configured participant cap.
    pub async fn create_room(
        &self,
        workspace_id: Uuid,
        created_by: Uuid,
        name: &str,
        room_type: RoomType,
        settings: Option<RoomSettings>,
    ) -> Result<Room> {
        check_name("room", name)?;
        let settings = settings
            .unwrap_or_else(|| RoomSettings::for_type(room_type, self.config.default_max_participants));
        if settings.max_participants == 0 {
            return Err(CollabError::invalid("room capacity must be at least 1"));
        }

        let ws_handle = self.workspace(workspace_id)?;
        let room = {
            let mut ws = ws_handle.write().await;
            ws.check_access(&created_by)?;
            let room = Room::new(workspace_id, created_by, name.trim(), room_type, settings);
            ws.rooms.push(room.id);
            room
        };
        let room_id = room.id;
        self.chats.put(
            room_id,
            Arc::new(Mutex::new(ChatChannel::new(room_id, self.config.max_message_length))),
        );
        self.rooms.put(room_id, Arc::new(RwLock::new(room.clone())));

        log::info!("room {room_id} '{}' ({:?}) created in {workspace_id}", room.name, room_type);
        self.hub
            .publish(Topic::Workspace(workspace_id), CollabEvent::RoomCreated { room: room.clone() })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::RoomCreated, created_by)
                .workspace(workspace_id)
                .room(room_id),
        )
        .await;
        Ok(room)
    }

    /// Copy of the room state.
    pub async fn get_room(&self, room_id: Uuid) -> Result<Room> {
        Ok(self.room(room_id)?.read().await.clone())
    }

    /// Join a room. Joining again while present returns the current room
    /// state and emits nothing.
    pub async fn join_room(&self, room_id: Uuid, user_id: Uuid, info: JoinInfo) -> Result<Room> {
        let handle = self.room(room_id)?;
        let mut room = handle.write().await;
        if room.participant(&user_id).is_some() {
            return Ok(room.clone());
        }

        let ws_handle = self.workspace(room.workspace_id)?;
        let mut ws = ws_handle.write().await;
        ws.check_access(&user_id)?;
        room.join(user_id, info)?;
        let new_member = ws.admit(user_id)?;
        drop(ws);

        log::info!(
            "room {room_id}: {user_id} joined ({}/{})",
            room.participants.len(),
            room.settings.max_participants
        );
        if new_member {
            self.hub
                .publish(
                    Topic::Workspace(room.workspace_id),
                    CollabEvent::MemberAdded { workspace_id: room.workspace_id, user_id },
                )
                .await;
        }
        let record = self.presence.enter_room(user_id, room_id).await;
        self.hub
            .publish(
                Topic::Room(room_id),
                CollabEvent::RoomJoined {
                    room_id,
                    user_id,
                    participants: room.participants.clone(),
                },
            )
            .await;
        self.hub.publish(Topic::Presence, CollabEvent::PresenceUpdated { record }).await;
        self.record(
            ActivityEntry::new(ActivityKind::RoomJoined, user_id)
                .workspace(room.workspace_id)
                .room(room_id),
        )
        .await;
        Ok(room.clone())
    }

    /// Leave a room. Returns the removed participant, or `None` if the user
    /// was not present.
    pub async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> Result<Option<Participant>> {
        let handle = self.room(room_id)?;
        let mut room = handle.write().await;
        let Some(participant) = room.leave(&user_id) else {
            return Ok(None);
        };

        log::info!("room {room_id}: {user_id} left");
        self.hub
            .publish(
                Topic::Room(room_id),
                CollabEvent::RoomLeft {
                    room_id,
                    user_id,
                    participants: room.participants.clone(),
                },
            )
            .await;
        if let Some(record) = self.presence.leave_room(user_id, room_id).await {
            self.hub.publish(Topic::Presence, CollabEvent::PresenceUpdated { record }).await;
        }
        self.record(
            ActivityEntry::new(ActivityKind::RoomLeft, user_id)
                .workspace(room.workspace_id)
                .room(room_id),
        )
        .await;
        Ok(Some(participant))
    }

    /// Change a participant's media flags and publish `MediaUpdated`.
    pub async fn set_media(&self, room_id: Uuid, user_id: Uuid, media: MediaState) -> Result<Participant> {
        let handle = self.room(room_id)?;
        let mut room = handle.write().await;
        let participant = room.set_media(&user_id, media)?.clone();
        self.hub
            .publish(Topic::Room(room_id), CollabEvent::MediaUpdated { room_id, user_id, media })
            .await;
        Ok(participant)
    }

    /// Open a document of the room's workspace in the room. Returns `false`
    /// if it was already open.
    pub async fn open_document(&self, room_id: Uuid, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let doc = self.document(document_id)?;
        let handle = self.room(room_id)?;
        let mut room = handle.write().await;
        if doc.info().workspace_id != room.workspace_id {
            return Err(CollabError::not_found(EntityKind::Document, document_id));
        }
        if !room.open_document(document_id) {
            return Ok(false);
        }

        log::debug!("room {room_id}: opened document {document_id}");
        self.hub
            .publish(Topic::Room(room_id), CollabEvent::DocumentOpened { room_id, document_id })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::DocumentOpened, user_id)
                .workspace(room.workspace_id)
                .room(room_id)
                .document(document_id),
        )
        .await;
        Ok(true)
    }

    // ── Documents ────────────────────────────────────────────────────────

    /// Create a document and spawn its actor.
    pub async fn create_document(
        &self,
        workspace_id: Uuid,
        created_by: Uuid,
        title: &str,
        kind: DocumentKind,
        initial_content: &str,
    ) -> Result<DocumentInfo> {
        check_name("document", title)?;
        let ws_handle = self.workspace(workspace_id)?;
        let info = {
            let mut ws = ws_handle.write().await;
            ws.check_access(&created_by)?;
            let info = DocumentInfo::new(workspace_id, title.trim(), kind, created_by);
            ws.documents.push(info.id);
            info
        };

        let handle = DocumentHandle::spawn(Document::new(info.clone(), initial_content), self.hub.clone());
        self.documents.put(info.id, handle);

        log::info!("document {} '{}' ({:?}) created in {workspace_id}", info.id, info.title, kind);
        self.hub
            .publish(Topic::Workspace(workspace_id), CollabEvent::DocumentCreated { document: info.clone() })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::DocumentCreated, created_by)
                .workspace(workspace_id)
                .document(info.id),
        )
        .await;
        Ok(info)
    }

    /// Handle to a document's actor.
    pub fn document(&self, document_id: Uuid) -> Result<DocumentHandle> {
        self.documents
            .get(&document_id)
            .ok_or_else(|| CollabError::not_found(EntityKind::Document, document_id))
    }

    /// Submit an edit to the document actor and log it on success.
    pub async fn submit(&self, document_id: Uuid, op: Operation) -> Result<SubmitResult> {
        let doc = self.document(document_id)?;
        let author = op.author;
        let result = doc.submit(op).await?;
        self.record(
            ActivityEntry::new(ActivityKind::DocumentEdited, author)
                .workspace(doc.info().workspace_id)
                .document(document_id)
                .payload(json!({
                    "kind": result.operation.kind.name(),
                    "version": result.applied_version,
                })),
        )
        .await;
        Ok(result)
    }

    /// Update a user's cursor and mirror it onto their participant entry in
    /// every room that has the document open.
    pub async fn update_cursor(&self, document_id: Uuid, user_id: Uuid, cursor: Cursor) -> Result<()> {
        let doc = self.document(document_id)?;
        doc.update_cursor(user_id, cursor).await?;
        for handle in self.rooms_showing(&doc).await {
            handle.write().await.set_cursor(&user_id, cursor);
        }
        Ok(())
    }

    pub async fn update_selection(&self, document_id: Uuid, user_id: Uuid, selection: Selection) -> Result<()> {
        let doc = self.document(document_id)?;
        doc.update_selection(user_id, selection).await?;
        for handle in self.rooms_showing(&doc).await {
            handle.write().await.set_selection(&user_id, selection);
        }
        Ok(())
    }

    /// Take the exclusive lock. Returns `false` if `user_id` already held it.
    pub async fn lock_document(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let doc = self.document(document_id)?;
        let acquired = doc.lock(user_id).await?;
        if acquired {
            self.record(
                ActivityEntry::new(ActivityKind::DocumentLocked, user_id)
                    .workspace(doc.info().workspace_id)
                    .document(document_id),
            )
            .await;
        }
        Ok(acquired)
    }

    /// Release the lock. Returns `false` if the document was not locked.
    pub async fn unlock_document(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let doc = self.document(document_id)?;
        let released = doc.unlock(user_id).await?;
        if released {
            self.record(
                ActivityEntry::new(ActivityKind::DocumentUnlocked, user_id)
                    .workspace(doc.info().workspace_id)
                    .document(document_id),
            )
            .await;
        }
        Ok(released)
    }

    /// Current document state.
    pub async fn snapshot(&self, document_id: Uuid) -> Result<DocumentSnapshot> {
        self.document(document_id)?.snapshot().await
    }

    /// Committed operations after `version`, for late joiners.
    pub async fn operations_since(&self, document_id: Uuid, version: u64) -> Result<Vec<Operation>> {
        self.document(document_id)?.operations_since(version).await
    }

    // ── Presence ─────────────────────────────────────────────────────────

    /// Record a heartbeat and publish the updated presence.
    pub async fn heartbeat(
        &self,
        user_id: Uuid,
        status: Option<PresenceStatus>,
        room_id: Option<Uuid>,
        document_id: Option<Uuid>,
    ) -> PresenceRecord {
        let record = self.presence.heartbeat(user_id, status, room_id, document_id).await;
        self.hub
            .publish(Topic::Presence, CollabEvent::PresenceUpdated { record: record.clone() })
            .await;
        record
    }

    pub async fn presence(&self, user_id: Uuid) -> Result<PresenceRecord> {
        self.presence
            .get(&user_id)
            .await
            .ok_or_else(|| CollabError::not_found(EntityKind::User, user_id))
    }

    pub async fn list_presence(&self) -> Vec<PresenceRecord> {
        self.presence.list_all().await
    }

    /// Presence of users whose current room is `room_id`.
    pub async fn room_presence(&self, room_id: Uuid) -> Vec<PresenceRecord> {
        self.presence.list_in_room(room_id).await
    }

    /// Run one sweep pass now, publish the resulting changes and drop
    /// broadcast topics nobody listens to any more.
    pub async fn sweep_presence(&self) -> SweepReport {
        sweep_and_publish(&self.presence, &self.hub).await
    }

    pub fn presence_tracker(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    // ── Chat ─────────────────────────────────────────────────────────────

    /// Send a chat message. The room must have chat enabled.
    pub async fn send_message(&self, room_id: Uuid, author: Uuid, draft: MessageDraft) -> Result<ChatMessage> {
        let workspace_id = self.chat_room(room_id).await?;
        let channel = self.channel(room_id)?;
        let mut channel = channel.lock().await;
        let message = channel.send(author, draft)?;

        log::debug!("room {room_id}: message #{} from {author}", message.sequence);
        self.hub
            .publish(Topic::Room(room_id), CollabEvent::MessageSent { message: message.clone() })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::MessageSent, author)
                .workspace(workspace_id)
                .room(room_id)
                .payload(json!({ "message_id": message.id })),
        )
        .await;
        Ok(message)
    }

    /// Edit a message. Only its author may edit.
    pub async fn edit_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        editor: Uuid,
        content: String,
    ) -> Result<ChatMessage> {
        let workspace_id = self.chat_room(room_id).await?;
        let channel = self.channel(room_id)?;
        let mut channel = channel.lock().await;
        let message = channel.edit(message_id, editor, content)?;

        self.hub
            .publish(Topic::Room(room_id), CollabEvent::MessageEdited { message: message.clone() })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::MessageEdited, editor)
                .workspace(workspace_id)
                .room(room_id)
                .payload(json!({ "message_id": message_id })),
        )
        .await;
        Ok(message)
    }

    /// Toggle a reaction.
    pub async fn react(&self, room_id: Uuid, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<ChatMessage> {
        self.chat_room(room_id).await?;
        let channel = self.channel(room_id)?;
        let mut channel = channel.lock().await;
        let message = channel.react(message_id, user_id, emoji)?;
        self.hub
            .publish(Topic::Room(room_id), CollabEvent::ReactionsUpdated { message: message.clone() })
            .await;
        Ok(message)
    }

    pub async fn list_messages(&self, room_id: Uuid, filter: &MessageFilter) -> Result<Vec<ChatMessage>> {
        let channel = self.channel(room_id)?;
        let channel = channel.lock().await;
        Ok(channel.list(filter))
    }

    // ── Comments ─────────────────────────────────────────────────────────

    /// Open a comment thread on a document.
    pub async fn add_comment(
        &self,
        document_id: Uuid,
        author: Uuid,
        content: String,
        anchor: Anchor,
    ) -> Result<Comment> {
        let doc = self.document(document_id)?;
        let comment = self.comments.lock().await.add(document_id, author, content, anchor)?;

        log::debug!("document {document_id}: comment {} by {author}", comment.id);
        self.hub
            .publish(Topic::Document(document_id), CollabEvent::CommentAdded { comment: comment.clone() })
            .await;
        self.record(
            ActivityEntry::new(ActivityKind::CommentAdded, author)
                .workspace(doc.info().workspace_id)
                .document(document_id)
                .payload(json!({ "comment_id": comment.id })),
        )
        .await;
        Ok(comment)
    }

    /// Reply to a thread.
    pub async fn reply_comment(&self, comment_id: Uuid, author: Uuid, content: String) -> Result<Reply> {
        let (document_id, reply) = self.comments.lock().await.reply(comment_id, author, content)?;
        self.hub
            .publish(
                Topic::Document(document_id),
                CollabEvent::CommentReplied { document_id, comment_id, reply: reply.clone() },
            )
            .await;
        self.record(
            self.comment_activity(ActivityKind::CommentReplied, author, document_id)
                .payload(json!({ "comment_id": comment_id, "reply_id": reply.id })),
        )
        .await;
        Ok(reply)
    }

    /// Mark a thread resolved by `resolver`.
    pub async fn resolve_comment(&self, comment_id: Uuid, resolver: Uuid) -> Result<Comment> {
        let comment = self.comments.lock().await.resolve(comment_id, resolver)?;
        let document_id = comment.document_id;
        self.hub
            .publish(Topic::Document(document_id), CollabEvent::CommentResolved { comment: comment.clone() })
            .await;
        self.record(
            self.comment_activity(ActivityKind::CommentResolved, resolver, document_id)
                .payload(json!({ "comment_id": comment_id })),
        )
        .await;
        Ok(comment)
    }

    /// Reopen a resolved thread.
    pub async fn reopen_comment(&self, comment_id: Uuid, user_id: Uuid) -> Result<Comment> {
        let comment = self.comments.lock().await.unresolve(comment_id)?;
        let document_id = comment.document_id;
        self.hub
            .publish(Topic::Document(document_id), CollabEvent::CommentReopened { comment: comment.clone() })
            .await;
        self.record(
            self.comment_activity(ActivityKind::Custom("comment_reopened".into()), user_id, document_id)
                .payload(json!({ "comment_id": comment_id })),
        )
        .await;
        Ok(comment)
    }

    /// Threads on a document in creation order.
    pub async fn list_comments(&self, document_id: Uuid, filter: &CommentFilter) -> Result<Vec<Comment>> {
        self.document(document_id)?;
        Ok(self.comments.lock().await.list(&document_id, filter))
    }

    // ── Activity ─────────────────────────────────────────────────────────

    /// Append an externally produced entry and publish it on the activity
    /// topic. Returns the entry evicted to make room, if any.
    pub async fn log_activity(&self, entry: ActivityEntry) -> Option<ActivityEntry> {
        self.record(entry).await
    }

    /// Matching entries, most recent first.
    pub async fn query_activity(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        self.activity.lock().await.query(query)
    }

    /// Snapshot of engine-wide counters.
    pub async fn stats(&self) -> CollabStats {
        let broadcast = self.hub.stats().await;
        CollabStats {
            workspaces: self.workspaces.len(),
            rooms: self.rooms.len(),
            documents: self.documents.len(),
            tracked_users: self.presence.tracked_count(),
            active_users: self.presence.active_count(),
            events_published: broadcast.events_published,
            events_unobserved: broadcast.events_unobserved,
            topics: broadcast.topics,
            activity_entries: self.activity.lock().await.len(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn workspace(&self, id: Uuid) -> Result<Arc<RwLock<Workspace>>> {
        self.workspaces
            .get(&id)
            .ok_or_else(|| CollabError::not_found(EntityKind::Workspace, id))
    }

    fn room(&self, id: Uuid) -> Result<Arc<RwLock<Room>>> {
        self.rooms.get(&id).ok_or_else(|| CollabError::not_found(EntityKind::Room, id))
    }

    fn channel(&self, room_id: Uuid) -> Result<Arc<Mutex<ChatChannel>>> {
        self.chats
            .get(&room_id)
            .ok_or_else(|| CollabError::not_found(EntityKind::Room, room_id))
    }

    /// Check the room exists with chat enabled; returns its workspace id.
    async fn chat_room(&self, room_id: Uuid) -> Result<Uuid> {
        let handle = self.room(room_id)?;
        let room = handle.read().await;
        room.ensure_chat_enabled()?;
        Ok(room.workspace_id)
    }

    /// Rooms of the document's workspace that have it open.
    async fn rooms_showing(&self, doc: &DocumentHandle) -> Vec<Arc<RwLock<Room>>> {
        let Ok(ws) = self.workspace(doc.info().workspace_id) else {
            return Vec::new();
        };
        let room_ids = ws.read().await.rooms.clone();
        let mut out = Vec::new();
        for id in room_ids {
            if let Some(handle) = self.rooms.get(&id) {
                if handle.read().await.has_document(&doc.id()) {
                    out.push(handle);
                }
            }
        }
        out
    }

    fn comment_activity(&self, kind: ActivityKind, actor: Uuid, document_id: Uuid) -> ActivityEntry {
        let entry = ActivityEntry::new(kind, actor).document(document_id);
        match self.documents.get(&document_id) {
            Some(doc) => entry.workspace(doc.info().workspace_id),
            None => entry,
        }
    }

    async fn record(&self, entry: ActivityEntry) -> Option<ActivityEntry> {
        let evicted = self.activity.lock().await.log(entry.clone());
        if let Some(old) = &evicted {
            log::trace!("activity entry {} evicted", old.id);
        }
        self.hub.publish(Topic::Activity, CollabEvent::ActivityLogged { entry }).await;
        evicted
    }
}

impl Drop for CollabService {
    fn drop(&mut self) {
        let sweeper = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = sweeper {
            handle.abort();
        }
    }
}

async fn sweep_and_publish(presence: &PresenceTracker, hub: &BroadcastHub) -> SweepReport {
    let report = presence.sweep().await;
    if report.skipped > 0 {
        log::warn!("presence sweep skipped {} records", report.skipped);
    }
    if !report.changed.is_empty() || report.evicted > 0 {
        log::debug!(
            "presence sweep: {} away, {} offline, {} evicted",
            report.demoted_to_away,
            report.demoted_to_offline,
            report.evicted
        );
    }
    for record in &report.changed {
        hub.publish(Topic::Presence, CollabEvent::PresenceUpdated { record: record.clone() })
            .await;
    }
    hub.prune_idle().await;
    report
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CollabError::invalid(format!("{what} name must not be empty")));
    }
    Ok(())
}
