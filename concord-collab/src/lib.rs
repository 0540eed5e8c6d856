//! # concord-collab: Real-time collaboration engine
//!
//! Shared documents, rooms, presence, chat, comments and an activity feed
//! for small teams, ordered by a single in-memory authority.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!   clients ────► │ CollabService │ ──── Store (workspaces, rooms, docs, chats)
//!                 └───────┬───────┘
//!          ┌──────────────┼──────────────────────┐
//!          ▼              ▼                      ▼
//!   ┌─────────────┐ ┌──────────────┐     ┌────────────────┐
//!   │ Room        │ │ DocumentActor│     │ PresenceTracker│
//!   │ (members,   │ │ (one task per│     │ (heartbeats +  │
//!   │  flags)     │ │  document)   │     │  sweep task)   │
//!   └─────────────┘ └──────┬───────┘     └────────────────┘
//!                          │ applied ops, in version order
//!                          ▼
//!                  ┌───────────────┐
//!                  │ BroadcastHub  │ ──► transport layer (out of scope)
//!                  │ (per topic)   │
//!                  └───────────────┘
//! ```
//!
//! Concurrent edits are reconciled by a base-version + position-transform
//! protocol: each document's actor rebases stale operations over everything
//! committed since their base version, then applies them in one agreed
//! order.
//!
//! ## Modules
//!
//! - [`operation`]: Edit operations, apply and transform
//! - [`document`]: Document state, actor and handle
//! - [`presence`]: Liveness state machine with periodic sweep
//! - [`room`]: Bounded membership and feature flags
//! - [`chat`]: Per-room ordered message log
//! - [`comments`]: Anchored comment threads
//! - [`activity`]: Bounded audit ring buffer
//! - [`workspace`]: Top-level container and membership policy
//! - [`broadcast`]: Topic-based event fan-out
//! - [`service`]: Facade wiring everything together

pub mod activity;
pub mod broadcast;
pub mod chat;
pub mod comments;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod event;
pub mod operation;
pub mod presence;
pub mod room;
pub mod service;
pub mod store;
pub mod workspace;

// Re-exports for convenience
pub use activity::{ActivityEntry, ActivityKind, ActivityLog, ActivityQuery};
pub use broadcast::{BroadcastGroup, BroadcastHub, BroadcastStats};
pub use chat::{ChatChannel, ChatMessage, MessageDraft, MessageFilter, MessageKind, Reaction};
pub use comments::{Anchor, Comment, CommentFilter, CommentStore, Reply};
pub use config::CollabConfig;
pub use cursor::{Cursor, CursorColor, Selection, Vec2};
pub use document::{
    Document, DocumentHandle, DocumentInfo, DocumentKind, DocumentSnapshot, SubmitResult,
};
pub use error::{CollabError, EntityKind, ErrorKind, Result};
pub use event::{CollabEvent, Topic};
pub use operation::{OpKind, Operation};
pub use presence::{PresenceRecord, PresenceStatus, PresenceTracker, SweepReport};
pub use room::{
    JoinInfo, MediaState, Participant, ParticipantRole, Room, RoomSettings, RoomType,
};
pub use service::{CollabService, CollabStats};
pub use store::{MemoryStore, Store};
pub use workspace::{InvitePolicy, Visibility, Workspace};
