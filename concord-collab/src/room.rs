//! Rooms: bounded membership plus per-room feature flags.
//!
//! A room never owns document content. It records who is present, what
//! they are allowed to turn on, and which documents are open in it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cursor::{Cursor, CursorColor, Selection};
use crate::error::{CollabError, EntityKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomType {
    #[default]
    General,
    Document,
    Meeting,
    Chat,
}

/// Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub max_participants: usize,
    /// Gates participant audio and video
    pub video_enabled: bool,
    pub chat_enabled: bool,
    pub screen_share_enabled: bool,
    pub recording_enabled: bool,
}

impl RoomSettings {
    /// Defaults for a room type with the given capacity.
    pub fn for_type(room_type: RoomType, max_participants: usize) -> Self {
        Self {
            max_participants,
            video_enabled: room_type == RoomType::Meeting,
            chat_enabled: true,
            screen_share_enabled: room_type == RoomType::Meeting,
            recording_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticipantRole {
    Owner,
    #[default]
    Editor,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaState {
    pub audio: bool,
    pub video: bool,
    pub screen_share: bool,
}

/// What a user brings when joining.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinInfo {
    pub display_name: String,
    pub role: ParticipantRole,
    pub media: MediaState,
}

impl JoinInfo {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), ..Self::default() }
    }

    /// Join with `role` instead of the default editor role.
    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = role;
        self
    }

    /// Join with media already enabled. Checked against the room flags.
    pub fn with_media(mut self, media: MediaState) -> Self {
        self.media = media;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub color: CursorColor,
    pub cursor: Option<Cursor>,
    pub selection: Option<Selection>,
    pub media: MediaState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub room_type: RoomType,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub settings: RoomSettings,
    pub participants: Vec<Participant>,
    /// Documents open in this room, in the order they were opened
    pub documents: Vec<Uuid>,
}

impl Room {
    pub fn new(
        workspace_id: Uuid,
        created_by: Uuid,
        name: impl Into<String>,
        room_type: RoomType,
        settings: RoomSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            name: name.into(),
            room_type,
            created_by,
            created_at: Utc::now(),
            settings,
            participants: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Add a participant. Returns `false` when the user was already present,
    /// in which case nothing changes.
    pub fn join(&mut self, user_id: Uuid, info: JoinInfo) -> Result<bool> {
        if self.participant(&user_id).is_some() {
            return Ok(false);
        }
        if self.is_full() {
            return Err(CollabError::RoomFull { capacity: self.settings.max_participants });
        }
        self.check_media(&info.media)?;

        self.participants.push(Participant {
            user_id,
            display_name: info.display_name,
            role: info.role,
            joined_at: Utc::now(),
            color: CursorColor::from_uuid(user_id),
            cursor: None,
            selection: None,
            media: info.media,
        });
        Ok(true)
    }

    /// Remove a participant; `None` if they were not present.
    pub fn leave(&mut self, user_id: &Uuid) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.user_id == *user_id)?;
        Some(self.participants.remove(index))
    }

    /// Participant entry for `user_id`, if present.
    pub fn participant(&self, user_id: &Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == *user_id)
    }

    fn participant_mut(&mut self, user_id: &Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == *user_id)
    }

    /// True when no further user can join.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.settings.max_participants
    }

    /// Change a participant's media flags, gated by the room settings.
    pub fn set_media(&mut self, user_id: &Uuid, media: MediaState) -> Result<&Participant> {
        self.check_media(&media)?;
        let id = self.id;
        let participant = self
            .participant_mut(user_id)
            .ok_or_else(|| CollabError::not_found(EntityKind::Participant, *user_id))?;
        log::debug!("room {id}: media for {user_id} -> {media:?}");
        participant.media = media;
        Ok(participant)
    }

    /// Returns `false` if the document was already open.
    pub fn open_document(&mut self, document_id: Uuid) -> bool {
        if self.documents.contains(&document_id) {
            return false;
        }
        self.documents.push(document_id);
        true
    }

    pub fn has_document(&self, document_id: &Uuid) -> bool {
        self.documents.contains(document_id)
    }

    /// Mirror a document cursor onto the participant entry. Returns `false`
    /// if the user is not in this room.
    pub fn set_cursor(&mut self, user_id: &Uuid, cursor: Cursor) -> bool {
        match self.participant_mut(user_id) {
            Some(p) => {
                p.cursor = Some(cursor);
                true
            }
            None => false,
        }
    }

    /// Mirror a document selection. Returns `false` if the user is absent.
    pub fn set_selection(&mut self, user_id: &Uuid, selection: Selection) -> bool {
        match self.participant_mut(user_id) {
            Some(p) => {
                p.selection = Some(selection);
                true
            }
            None => false,
        }
    }

    /// Fails with `Disabled("chat")` when chat is switched off.
    pub fn ensure_chat_enabled(&self) -> Result<()> {
        if self.settings.chat_enabled {
            Ok(())
        } else {
            Err(CollabError::Disabled("chat"))
        }
    }

    fn check_media(&self, media: &MediaState) -> Result<()> {
        if (media.video || media.audio) && !self.settings.video_enabled {
            return Err(CollabError::Disabled("video"));
        }
        if media.screen_share && !self.settings.screen_share_enabled {
            return Err(CollabError::Disabled("screen_share"));
        }
        Ok(())
    }
}
