//! Error taxonomy shared by every collaboration component.
//!
//! All errors are returned synchronously to the caller of the mutating
//! operation. A call that fails leaves every piece of state untouched.

use thiserror::Error;
use uuid::Uuid;

/// Kind of entity a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Workspace,
    Room,
    Document,
    Message,
    Comment,
    Participant,
    User,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Workspace => "workspace",
            EntityKind::Room => "room",
            EntityKind::Document => "document",
            EntityKind::Message => "message",
            EntityKind::Comment => "comment",
            EntityKind::Participant => "participant",
            EntityKind::User => "user",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollabError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Invalid version: base {base} does not fit current version {current}")]
    InvalidVersion { base: u64, current: u64 },
    #[error("Document is locked by {holder}")]
    DocumentLocked { holder: Uuid },
    #[error("Room is full ({capacity} participants)")]
    RoomFull { capacity: usize },
    #[error("Feature disabled: {0}")]
    Disabled(&'static str),
    #[error("User {user} is not a member of workspace {workspace}")]
    NotMember { workspace: Uuid, user: Uuid },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Document actor shut down")]
    ActorShutdown,
}

/// Flat classification of [`CollabError`] for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    InvalidVersion,
    DocumentLocked,
    RoomFull,
    Disabled,
    NotMember,
    Config,
    Codec,
    Shutdown,
}

impl CollabError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        CollabError::NotFound { kind, id }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        CollabError::InvalidOperation(reason.into())
    }

    /// Classify for callers that only branch on the kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollabError::NotFound { .. } => ErrorKind::NotFound,
            CollabError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            CollabError::InvalidVersion { .. } => ErrorKind::InvalidVersion,
            CollabError::DocumentLocked { .. } => ErrorKind::DocumentLocked,
            CollabError::RoomFull { .. } => ErrorKind::RoomFull,
            CollabError::Disabled(_) => ErrorKind::Disabled,
            CollabError::NotMember { .. } => ErrorKind::NotMember,
            CollabError::Config(_) => ErrorKind::Config,
            CollabError::Codec(_) => ErrorKind::Codec,
            CollabError::ActorShutdown => ErrorKind::Shutdown,
        }
    }
}

pub type Result<T> = std::result::Result<T, CollabError>;
