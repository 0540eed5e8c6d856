//! Events emitted by every mutating call, for the transport layer to fan
//! out to connected clients.
//!
//! Events are published on a [`Topic`]. A client connected to a room
//! subscribes to that room's topic plus the topic of every document it has
//! open; presence changes also go to the global presence topic, and every
//! activity entry to the activity topic.
//!
//! Transports that need bytes use [`CollabEvent::encode`] (bincode, standard
//! config). The engine itself never serializes events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::chat::ChatMessage;
use crate::comments::{Comment, Reply};
use crate::cursor::{Cursor, Selection};
use crate::document::DocumentInfo;
use crate::error::{CollabError, Result};
use crate::operation::Operation;
use crate::presence::PresenceRecord;
use crate::room::{MediaState, Participant, Room};
use crate::workspace::Workspace;

/// Fan-out scope of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Workspace(Uuid),
    Room(Uuid),
    Document(Uuid),
    Presence,
    Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollabEvent {
    WorkspaceCreated {
        workspace: Workspace,
    },
    MemberAdded {
        workspace_id: Uuid,
        user_id: Uuid,
    },
    RoomCreated {
        room: Room,
    },
    /// A participant joined; carries the full updated participant list.
    RoomJoined {
        room_id: Uuid,
        user_id: Uuid,
        participants: Vec<Participant>,
    },
    /// A participant left; carries the full updated participant list.
    RoomLeft {
        room_id: Uuid,
        user_id: Uuid,
        participants: Vec<Participant>,
    },
    MediaUpdated {
        room_id: Uuid,
        user_id: Uuid,
        media: MediaState,
    },
    DocumentOpened {
        room_id: Uuid,
        document_id: Uuid,
    },
    DocumentCreated {
        document: DocumentInfo,
    },
    /// A committed operation, with its final position and applied version.
    DocumentEdited {
        document_id: Uuid,
        operation: Operation,
    },
    DocumentLocked {
        document_id: Uuid,
        user_id: Uuid,
    },
    DocumentUnlocked {
        document_id: Uuid,
        user_id: Uuid,
    },
    CursorUpdated {
        document_id: Uuid,
        user_id: Uuid,
        cursor: Cursor,
    },
    SelectionUpdated {
        document_id: Uuid,
        user_id: Uuid,
        selection: Selection,
    },
    PresenceUpdated {
        record: PresenceRecord,
    },
    MessageSent {
        message: ChatMessage,
    },
    MessageEdited {
        message: ChatMessage,
    },
    ReactionsUpdated {
        message: ChatMessage,
    },
    CommentAdded {
        comment: Comment,
    },
    CommentReplied {
        document_id: Uuid,
        comment_id: Uuid,
        reply: Reply,
    },
    CommentResolved {
        comment: Comment,
    },
    CommentReopened {
        comment: Comment,
    },
    ActivityLogged {
        entry: ActivityEntry,
    },
}

impl CollabEvent {
    /// Dotted event name for transports that route by string.
    pub fn event_type(&self) -> &'static str {
        match self {
            CollabEvent::WorkspaceCreated { .. } => "workspace.created",
            CollabEvent::MemberAdded { .. } => "workspace.member_added",
            CollabEvent::RoomCreated { .. } => "room.created",
            CollabEvent::RoomJoined { .. } => "room.joined",
            CollabEvent::RoomLeft { .. } => "room.left",
            CollabEvent::MediaUpdated { .. } => "room.media_updated",
            CollabEvent::DocumentOpened { .. } => "room.document_opened",
            CollabEvent::DocumentCreated { .. } => "document.created",
            CollabEvent::DocumentEdited { .. } => "document.edited",
            CollabEvent::DocumentLocked { .. } => "document.locked",
            CollabEvent::DocumentUnlocked { .. } => "document.unlocked",
            CollabEvent::CursorUpdated { .. } => "cursor.updated",
            CollabEvent::SelectionUpdated { .. } => "selection.updated",
            CollabEvent::PresenceUpdated { .. } => "presence.updated",
            CollabEvent::MessageSent { .. } => "message.sent",
            CollabEvent::MessageEdited { .. } => "message.edited",
            CollabEvent::ReactionsUpdated { .. } => "message.reactions_updated",
            CollabEvent::CommentAdded { .. } => "comment.added",
            CollabEvent::CommentReplied { .. } => "comment.replied",
            CollabEvent::CommentResolved { .. } => "comment.resolved",
            CollabEvent::CommentReopened { .. } => "comment.reopened",
            CollabEvent::ActivityLogged { .. } => "activity.logged",
        }
    }

    /// Encode for the transport with bincode.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CollabError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CollabError::Codec(e.to_string()))?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;
    use crate::operation::Operation;

    #[test]
    fn test_event_type_names() {
        let doc = Uuid::new_v4();
        let edited = CollabEvent::DocumentEdited {
            document_id: doc,
            operation: Operation::insert(Uuid::new_v4(), 0, "x", 0),
        };
        assert_eq!(edited.event_type(), "document.edited");

        let locked = CollabEvent::DocumentLocked { document_id: doc, user_id: Uuid::new_v4() };
        assert_eq!(locked.event_type(), "document.locked");
    }

    #[test]
    fn test_edit_event_survives_wire() {
        let mut op = Operation::replace(Uuid::new_v4(), 3, 2, "héllo", 4);
        op.applied_version = Some(7);
        let event = CollabEvent::DocumentEdited { document_id: Uuid::new_v4(), operation: op };

        let bytes = event.encode().unwrap();
        assert_eq!(CollabEvent::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_activity_payload_survives_wire() {
        let entry = ActivityEntry::new(ActivityKind::Custom("import".into()), Uuid::new_v4())
            .payload(serde_json::json!({ "rows": 120, "source": "csv", "ok": true }));
        let event = CollabEvent::ActivityLogged { entry };

        let bytes = event.encode().unwrap();
        assert_eq!(CollabEvent::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let err = CollabEvent::decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CollabError::Codec(_)));
    }
}
