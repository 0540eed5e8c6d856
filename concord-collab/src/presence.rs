//! User liveness tracking.
//!
//! ## State machine
//!
//! ```text
//!            heartbeat (any status, default online)
//!      ┌──────────────────────────────────────────────┐
//!      ▼                                              │
//! online/active ──(silent > timeout)──▶ away ──(silent > 5×timeout)──▶ offline
//! ```
//!
//! Only a heartbeat promotes. The sweep only ever demotes, based on time
//! elapsed since the last heartbeat, so a sweep never undoes a heartbeat.
//!
//! The number of active users is maintained incrementally: every status
//! change goes through [`PresenceTracker::transition`] while the record's
//! lock is held, so the counter always equals a recount of all records.
//!
//! The sweep snapshots the key set and then locks each record on its own,
//! so heartbeats for other users are never blocked by a running sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::CollabConfig;
use crate::store::{MemoryStore, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[default]
    Online,
    /// Alias of online reported by clients that are actively typing
    Active,
    Away,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Active => "active",
            PresenceStatus::Away => "away",
            PresenceStatus::Offline => "offline",
        }
    }

    /// Counted in the active-user total.
    pub fn is_active(&self) -> bool {
        matches!(self, PresenceStatus::Online | PresenceStatus::Active)
    }

    /// Demotion order: larger is less present.
    fn rank(&self) -> u8 {
        match self {
            PresenceStatus::Online | PresenceStatus::Active => 0,
            PresenceStatus::Away => 1,
            PresenceStatus::Offline => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub current_room: Option<Uuid>,
    pub current_document: Option<Uuid>,
    pub last_seen_at: DateTime<Utc>,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub demoted_to_away: usize,
    pub demoted_to_offline: usize,
    pub evicted: usize,
    /// Records skipped because their timestamps were unusable
    pub skipped: usize,
    /// Records whose status changed, for fan-out
    pub changed: Vec<PresenceRecord>,
}

struct Tracked {
    record: PresenceRecord,
    last_seen: Instant,
    /// Set under the lock when the sweep drops the record, so a heartbeat
    /// that raced the eviction re-inserts instead of updating an orphan.
    evicted: bool,
}

impl Tracked {
    fn new(user_id: Uuid, now: Instant) -> Self {
        Self {
            record: PresenceRecord {
                user_id,
                status: PresenceStatus::Offline,
                current_room: None,
                current_document: None,
                last_seen_at: Utc::now(),
            },
            last_seen: now,
            evicted: false,
        }
    }
}

pub struct PresenceTracker {
    records: Box<dyn Store<Uuid, Arc<Mutex<Tracked>>>>,
    active: AtomicUsize,
    timeout: Duration,
    offline_after: Duration,
    eviction_after: Option<Duration>,
}

impl PresenceTracker {
    /// Empty tracker using the presence thresholds from `config`.
    pub fn new(config: &CollabConfig) -> Self {
        Self {
            records: Box::new(MemoryStore::new()),
            active: AtomicUsize::new(0),
            timeout: config.presence_timeout(),
            offline_after: config.presence_offline_after(),
            eviction_after: config.presence_eviction_after(),
        }
    }

    /// Silence after which a user is demoted to away.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a heartbeat. Sets the status unconditionally (default online)
    /// and refreshes last-seen. `room`/`document` overwrite the current
    /// location when given and are kept otherwise.
    pub async fn heartbeat(
        &self,
        user_id: Uuid,
        status: Option<PresenceStatus>,
        room: Option<Uuid>,
        document: Option<Uuid>,
    ) -> PresenceRecord {
        let status = status.unwrap_or_default();
        let mut tracked = self.entry(user_id).await;
        let now = Instant::now();

        self.transition(&mut tracked, status);
        tracked.last_seen = now;
        tracked.record.last_seen_at = Utc::now();
        if room.is_some() {
            tracked.record.current_room = room;
        }
        if document.is_some() {
            tracked.record.current_document = document;
        }
        log::trace!("heartbeat {user_id}: {}", status.as_str());
        tracked.record.clone()
    }

    /// Mark the user's current room on join. A user seen for the first time
    /// is treated as having sent an online heartbeat.
    pub async fn enter_room(&self, user_id: Uuid, room_id: Uuid) -> PresenceRecord {
        if let Some(handle) = self.records.get(&user_id) {
            let mut tracked = handle.lock().await;
            if !tracked.evicted {
                tracked.record.current_room = Some(room_id);
                return tracked.record.clone();
            }
        }
        self.heartbeat(user_id, None, Some(room_id), None).await
    }

    /// Clear the user's current room on leave, if it is still `room_id`.
    pub async fn leave_room(&self, user_id: Uuid, room_id: Uuid) -> Option<PresenceRecord> {
        let handle = self.records.get(&user_id)?;
        let mut tracked = handle.lock().await;
        if tracked.evicted {
            return None;
        }
        if tracked.record.current_room == Some(room_id) {
            tracked.record.current_room = None;
            tracked.record.current_document = None;
        }
        Some(tracked.record.clone())
    }

    /// Current record for `user_id`.
    pub async fn get(&self, user_id: &Uuid) -> Option<PresenceRecord> {
        let handle = self.records.get(user_id)?;
        let tracked = handle.lock().await;
        (!tracked.evicted).then(|| tracked.record.clone())
    }

    /// Every tracked record, in no particular order.
    pub async fn list_all(&self) -> Vec<PresenceRecord> {
        let mut out = Vec::new();
        for handle in self.records.values() {
            let tracked = handle.lock().await;
            if !tracked.evicted {
                out.push(tracked.record.clone());
            }
        }
        out
    }

    /// Records whose current room is `room_id`.
    pub async fn list_in_room(&self, room_id: Uuid) -> Vec<PresenceRecord> {
        self.list_all()
            .await
            .into_iter()
            .filter(|r| r.current_room == Some(room_id))
            .collect()
    }

    /// Incrementally maintained active-user count.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Count active users by inspecting every record.
    pub async fn recount_active(&self) -> usize {
        self.list_all().await.iter().filter(|r| r.status.is_active()).count()
    }

    /// Records currently held, evicted ones excluded.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// Sweep relative to the current instant.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now()).await
    }

    /// Demote silent users relative to `now`.
    pub async fn sweep_at(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();

        for user_id in self.records.keys() {
            let Some(handle) = self.records.get(&user_id) else {
                continue;
            };
            let mut tracked = handle.lock().await;
            if tracked.evicted {
                continue;
            }

            let Some(elapsed) = now.checked_duration_since(tracked.last_seen) else {
                log::warn!("presence record for {user_id} has last-seen in the future; skipping");
                report.skipped += 1;
                continue;
            };

            let target = if elapsed > self.offline_after {
                PresenceStatus::Offline
            } else if elapsed > self.timeout {
                PresenceStatus::Away
            } else {
                continue;
            };

            let current = tracked.record.status;
            if target.rank() > current.rank() {
                self.transition(&mut tracked, target);
                match target {
                    PresenceStatus::Away => report.demoted_to_away += 1,
                    _ => report.demoted_to_offline += 1,
                }
                log::debug!("presence {user_id}: {} -> {}", current.as_str(), target.as_str());
                report.changed.push(tracked.record.clone());
            }

            if tracked.record.status == PresenceStatus::Offline {
                if let Some(evict_after) = self.eviction_after {
                    if elapsed > self.offline_after + evict_after {
                        tracked.evicted = true;
                        self.records.delete(&user_id);
                        report.evicted += 1;
                        log::debug!("presence {user_id}: evicted after prolonged offline");
                    }
                }
            }
        }

        report
    }

    /// Lock the user's live record, creating it if absent or evicted.
    async fn entry(&self, user_id: Uuid) -> tokio::sync::OwnedMutexGuard<Tracked> {
        loop {
            let fresh = Arc::new(Mutex::new(Tracked::new(user_id, Instant::now())));
            let (handle, _) = self.records.get_or_insert(user_id, fresh);
            let guard = handle.lock_owned().await;
            if !guard.evicted {
                return guard;
            }
        }
    }

    /// Change status, keeping the active counter in step. Caller holds the
    /// record's lock.
    fn transition(&self, tracked: &mut Tracked, status: PresenceStatus) {
        let was = tracked.record.status.is_active();
        let now = status.is_active();
        if was && !now {
            self.active.fetch_sub(1, Ordering::SeqCst);
        } else if !was && now {
            self.active.fetch_add(1, Ordering::SeqCst);
        }
        tracked.record.status = status;
    }
}
