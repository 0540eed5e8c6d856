//! Bounded audit feed.
//!
//! A fixed-capacity ring buffer: once full, each new entry evicts the
//! oldest one. Queries return the most recent entries first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    WorkspaceCreated,
    MemberAdded,
    RoomCreated,
    RoomJoined,
    RoomLeft,
    DocumentCreated,
    DocumentOpened,
    DocumentEdited,
    DocumentLocked,
    DocumentUnlocked,
    MessageSent,
    MessageEdited,
    CommentAdded,
    CommentReplied,
    CommentResolved,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub workspace_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
    pub actor: Uuid,
    #[serde(with = "json_payload")]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    /// Entry with a fresh id stamped now and no scope.
    pub fn new(kind: ActivityKind, actor: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            workspace_id: None,
            room_id: None,
            document_id: None,
            actor,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn workspace(mut self, id: Uuid) -> Self {
        self.workspace_id = Some(id);
        self
    }

    pub fn room(mut self, id: Uuid) -> Self {
        self.room_id = Some(id);
        self
    }

    pub fn document(mut self, id: Uuid) -> Self {
        self.document_id = Some(id);
        self
    }

    /// Attach a free-form JSON payload.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityQuery {
    pub workspace: Option<Uuid>,
    pub room: Option<Uuid>,
    pub document: Option<Uuid>,
    pub user: Option<Uuid>,
    pub kind: Option<ActivityKind>,
    pub limit: Option<usize>,
}

pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
    evicted: u64,
}

impl ActivityLog {
    /// Empty log holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append an entry; returns the entry evicted to make room, if any.
    pub fn log(&mut self, entry: ActivityEntry) -> Option<ActivityEntry> {
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.evicted += 1;
            return self.entries.pop_front();
        }
        None
    }

    /// Matching entries, most recent first.
    pub fn query(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| query.workspace.map_or(true, |id| e.workspace_id == Some(id)))
            .filter(|e| query.room.map_or(true, |id| e.room_id == Some(id)))
            .filter(|e| query.document.map_or(true, |id| e.document_id == Some(id)))
            .filter(|e| query.user.map_or(true, |id| e.actor == id))
            .filter(|e| query.kind.as_ref().map_or(true, |k| e.kind == *k))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Binary formats cannot carry a self-describing `Value`, so there the
/// payload travels as JSON text.
mod json_payload {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Value, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        if deserializer.is_human_readable() {
            Value::deserialize(deserializer)
        } else {
            let text = String::deserialize(deserializer)?;
            serde_json::from_str(&text).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bounded_at_capacity() {
        let mut log = ActivityLog::new(1000);
        let actor = Uuid::new_v4();
        let mut first_id = None;

        for i in 0..1001 {
            let entry = ActivityEntry::new(ActivityKind::DocumentEdited, actor).payload(json!({ "n": i }));
            if i == 0 {
                first_id = Some(entry.id);
            }
            let evicted = log.log(entry);
            if i < 1000 {
                assert!(evicted.is_none());
            } else {
                assert_eq!(evicted.unwrap().id, first_id.unwrap());
            }
        }

        assert_eq!(log.len(), 1000);
        assert_eq!(log.evicted(), 1);
        let all = log.query(&ActivityQuery::default());
        assert_eq!(all.first().unwrap().payload, json!({ "n": 1000 }));
        assert_eq!(all.last().unwrap().payload, json!({ "n": 1 }));
    }

    #[test]
    fn test_query_filters_most_recent_first() {
        let mut log = ActivityLog::new(10);
        let ws = Uuid::new_v4();
        let room = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        log.log(ActivityEntry::new(ActivityKind::RoomJoined, alice).workspace(ws).room(room));
        log.log(ActivityEntry::new(ActivityKind::RoomJoined, bob).workspace(ws).room(room));
        log.log(ActivityEntry::new(ActivityKind::MessageSent, alice).workspace(ws).room(room));
        log.log(ActivityEntry::new(ActivityKind::WorkspaceCreated, bob).workspace(Uuid::new_v4()));

        let joins = log.query(&ActivityQuery { kind: Some(ActivityKind::RoomJoined), ..Default::default() });
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0].actor, bob);

        let alice_in_ws = log.query(&ActivityQuery { workspace: Some(ws), user: Some(alice), ..Default::default() });
        assert_eq!(alice_in_ws.len(), 2);
        assert_eq!(alice_in_ws[0].kind, ActivityKind::MessageSent);

        let limited = log.query(&ActivityQuery { room: Some(room), limit: Some(1), ..Default::default() });
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].kind, ActivityKind::MessageSent);
    }

    #[test]
    fn test_custom_kind_filter() {
        let mut log = ActivityLog::new(4);
        let actor = Uuid::new_v4();
        log.log(ActivityEntry::new(ActivityKind::Custom("deploy".into()), actor));
        log.log(ActivityEntry::new(ActivityKind::Custom("rollback".into()), actor));

        let q = ActivityQuery { kind: Some(ActivityKind::Custom("deploy".into())), ..Default::default() };
        assert_eq!(log.query(&q).len(), 1);
    }
}
