//! The authoritative in-memory capsule collection and its operations.
//!
//! The store owns the ordered capsule list and mutates it first; persistence
//! through the backend follows as a best-effort side effect. A failed
//! persistence call never rolls the mutation back, it is recorded in the
//! sync status so the shell can warn the user.

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};

use crate::{
    lifecycle::{effective_state, sealed_at_creation, today, CapsuleState},
    Capsule, CapsuleBackend, CapsuleDraft, CapsuleError, CapsuleId, Result,
};

/// Whether the backing store reflects the in-memory collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The most recent persistence attempt succeeded
    InSync,
    /// The most recent persistence attempt failed; in-memory state is ahead
    Failed { detail: String },
}

/// Owns the capsule collection and performs all mutations on it.
pub struct CapsuleStore {
    /// Insertion-ordered collection, the single source of truth
    capsules: Vec<Capsule>,
    /// Persistence port selected at startup
    backend: Box<dyn CapsuleBackend>,
    /// Outcome of the most recent persistence attempt
    sync: SyncStatus,
}

impl CapsuleStore {
    /// Loads the collection from the backend. A failed load logs a warning
    /// and starts empty so the tool stays usable offline.
    pub async fn load(backend: Box<dyn CapsuleBackend>) -> Self {
        match backend.load().await {
            Ok(capsules) => {
                debug!("Store loaded with {} capsules", capsules.len());
                Self {
                    capsules,
                    backend,
                    sync: SyncStatus::InSync,
                }
            }
            Err(e) => {
                warn!("Could not load capsules from {}: {}", backend.describe(), e);
                Self {
                    capsules: Vec::new(),
                    backend,
                    sync: SyncStatus::Failed {
                        detail: e.to_string(),
                    },
                }
            }
        }
    }

    /// Validates a draft and seals it into a new capsule. Validation failure
    /// aborts before any mutation or persistence attempt.
    pub async fn create(&mut self, draft: CapsuleDraft) -> Result<Capsule> {
        let open_date = validate(&draft)?;

        let sealed = sealed_at_creation(open_date, today());
        let capsule = Capsule::new(
            self.next_id(),
            draft.title.trim().to_string(),
            draft.message,
            open_date,
            draft.mood,
            draft.color,
            sealed,
        );
        info!(
            "Creating capsule {} ({})",
            capsule.id,
            if sealed { "sealed" } else { "unlocked" }
        );

        // The collection is the source of truth; persistence follows
        self.capsules.push(capsule);
        let index = self.capsules.len() - 1;

        match self
            .backend
            .create(&self.capsules[index], &self.capsules)
            .await
        {
            Ok(Some(stored)) => {
                // Server-assigned fields win over the locally built record
                debug!("Backend assigned id {} to the new capsule", stored.id);
                self.capsules[index] = stored;
                self.sync = SyncStatus::InSync;
            }
            Ok(None) => {
                self.sync = SyncStatus::InSync;
            }
            Err(e) => {
                warn!("Capsule kept in memory but not persisted: {}", e);
                self.sync = SyncStatus::Failed {
                    detail: e.to_string(),
                };
            }
        }

        Ok(self.capsules[index].clone())
    }

    /// Snapshot of the collection in insertion order.
    pub fn list(&self) -> Vec<Capsule> {
        self.capsules.clone()
    }

    /// Looks up a capsule by id.
    pub fn get(&self, id: CapsuleId) -> Option<&Capsule> {
        self.capsules.iter().find(|c| c.id == id)
    }

    /// Opens a capsule: clears the lock and stamps `opened_at` on the first
    /// open. Unknown ids are a no-op (`None`); a capsule that is still
    /// sealed is returned unchanged; re-opening changes nothing and causes
    /// no persistence traffic.
    pub async fn open(&mut self, id: CapsuleId) -> Option<Capsule> {
        let index = match self.capsules.iter().position(|c| c.id == id) {
            Some(index) => index,
            None => {
                debug!("Open requested for unknown capsule {}", id);
                return None;
            }
        };

        // The shell never offers open for sealed capsules; re-check anyway
        if effective_state(&self.capsules[index], today()) == CapsuleState::Sealed {
            info!(
                "Capsule {} is still sealed until {}",
                id, self.capsules[index].open_date
            );
            return Some(self.capsules[index].clone());
        }

        let mut changed = false;
        {
            let capsule = &mut self.capsules[index];
            if capsule.is_locked {
                capsule.is_locked = false;
                changed = true;
            }
            if capsule.opened_at.is_none() {
                // First open wins; the transition is one-way
                capsule.opened_at = Some(Utc::now());
                changed = true;
            }
        }

        if changed {
            info!("Capsule {} opened", id);
            match self
                .backend
                .patch(&self.capsules[index], &self.capsules)
                .await
            {
                Ok(_) => self.sync = SyncStatus::InSync,
                Err(e) => {
                    warn!("Open kept in memory but not persisted: {}", e);
                    self.sync = SyncStatus::Failed {
                        detail: e.to_string(),
                    };
                }
            }
        } else {
            debug!("Capsule {} was already open, nothing to persist", id);
        }

        Some(self.capsules[index].clone())
    }

    /// Removes a capsule. Deleting an absent id is not an error, it returns
    /// `false` and causes no persistence traffic.
    pub async fn delete(&mut self, id: CapsuleId) -> bool {
        let index = match self.capsules.iter().position(|c| c.id == id) {
            Some(index) => index,
            None => {
                debug!("Delete requested for unknown capsule {}, nothing to do", id);
                return false;
            }
        };

        let removed = self.capsules.remove(index);
        info!("Capsule {} ('{}') deleted", removed.id, removed.title);

        match self.backend.delete(id, &self.capsules).await {
            Ok(_) => self.sync = SyncStatus::InSync,
            Err(e) => {
                warn!("Removal kept in memory but not persisted: {}", e);
                self.sync = SyncStatus::Failed {
                    detail: e.to_string(),
                };
            }
        }

        true
    }

    /// Outcome of the most recent persistence attempt.
    pub fn sync_status(&self) -> &SyncStatus {
        &self.sync
    }

    /// Description of the selected backend, for logs and the config command.
    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }

    /// Next free id: the current millisecond timestamp, floor-guarded
    /// against existing ids so ids stay unique and increasing even when the
    /// collection carries records from a fast clock.
    fn next_id(&self) -> CapsuleId {
        let max_existing = self.capsules.iter().map(|c| c.id).max().unwrap_or(0);
        Utc::now().timestamp_millis().max(max_existing.saturating_add(1))
    }
}

fn validate(draft: &CapsuleDraft) -> Result<NaiveDate> {
    if draft.title.trim().is_empty() {
        return Err(CapsuleError::Validation {
            message: "Title must not be empty".to_string(),
        });
    }
    if draft.message.trim().is_empty() {
        return Err(CapsuleError::Validation {
            message: "Message must not be empty".to_string(),
        });
    }

    let raw_date = draft.open_date.trim();
    if raw_date.is_empty() {
        return Err(CapsuleError::Validation {
            message: "Open date must not be empty".to_string(),
        });
    }
    NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| CapsuleError::Validation {
        message: format!("Open date must be a calendar date (YYYY-MM-DD): {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapsuleColor, Mood};
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Accepts every persistence call and records which were made.
    struct RecordingBackend {
        seed: Vec<Capsule>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingBackend {
        fn new(seed: Vec<Capsule>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    seed,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl CapsuleBackend for RecordingBackend {
        fn describe(&self) -> String {
            "recording test backend".to_string()
        }

        async fn load(&self) -> Result<Vec<Capsule>> {
            Ok(self.seed.clone())
        }

        async fn save_all(&self, _capsules: &[Capsule]) -> Result<()> {
            self.record("save_all");
            Ok(())
        }

        async fn create(&self, _capsule: &Capsule, _all: &[Capsule]) -> Result<Option<Capsule>> {
            self.record("create");
            Ok(None)
        }

        async fn patch(&self, _capsule: &Capsule, _all: &[Capsule]) -> Result<()> {
            self.record("patch");
            Ok(())
        }

        async fn delete(&self, _id: CapsuleId, _all: &[Capsule]) -> Result<()> {
            self.record("delete");
            Ok(())
        }
    }

    /// Fails every call, like an unreachable service.
    struct FailingBackend;

    fn backend_down() -> CapsuleError {
        CapsuleError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "backend down",
        ))
    }

    #[async_trait]
    impl CapsuleBackend for FailingBackend {
        fn describe(&self) -> String {
            "failing test backend".to_string()
        }

        async fn load(&self) -> Result<Vec<Capsule>> {
            Err(backend_down())
        }

        async fn save_all(&self, _capsules: &[Capsule]) -> Result<()> {
            Err(backend_down())
        }

        async fn create(&self, _capsule: &Capsule, _all: &[Capsule]) -> Result<Option<Capsule>> {
            Err(backend_down())
        }

        async fn patch(&self, _capsule: &Capsule, _all: &[Capsule]) -> Result<()> {
            Err(backend_down())
        }

        async fn delete(&self, _id: CapsuleId, _all: &[Capsule]) -> Result<()> {
            Err(backend_down())
        }
    }

    /// Returns a record with its own id on create, like the remote service.
    struct AssigningBackend;

    #[async_trait]
    impl CapsuleBackend for AssigningBackend {
        fn describe(&self) -> String {
            "assigning test backend".to_string()
        }

        async fn load(&self) -> Result<Vec<Capsule>> {
            Ok(Vec::new())
        }

        async fn save_all(&self, _capsules: &[Capsule]) -> Result<()> {
            Ok(())
        }

        async fn create(&self, capsule: &Capsule, _all: &[Capsule]) -> Result<Option<Capsule>> {
            let mut stored = capsule.clone();
            stored.id = 777;
            Ok(Some(stored))
        }

        async fn patch(&self, _capsule: &Capsule, _all: &[Capsule]) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _id: CapsuleId, _all: &[Capsule]) -> Result<()> {
            Ok(())
        }
    }

    fn draft(title: &str, open_date: &str) -> CapsuleDraft {
        CapsuleDraft {
            title: title.to_string(),
            message: "a message".to_string(),
            open_date: open_date.to_string(),
            mood: Mood::Hopeful,
            color: CapsuleColor::Blue,
        }
    }

    fn seeded(id: CapsuleId, open_date: (i32, u32, u32), sealed: bool) -> Capsule {
        Capsule::new(
            id,
            format!("capsule {}", id),
            "sealed words".to_string(),
            NaiveDate::from_ymd_opt(open_date.0, open_date.1, open_date.2).unwrap(),
            Mood::Hopeful,
            CapsuleColor::Blue,
            sealed,
        )
    }

    async fn store_with(seed: Vec<Capsule>) -> (CapsuleStore, Arc<Mutex<Vec<String>>>) {
        let (backend, calls) = RecordingBackend::new(seed);
        (CapsuleStore::load(Box::new(backend)).await, calls)
    }

    #[tokio::test]
    async fn create_locks_future_dates_and_unlocks_past_ones() {
        let (mut store, _) = store_with(Vec::new()).await;

        let sealed = store.create(draft("far", "2099-01-01")).await.unwrap();
        assert!(sealed.is_locked);
        assert!(sealed.opened_at.is_none());

        let open = store.create(draft("long ago", "2000-01-01")).await.unwrap();
        assert!(!open.is_locked);
        assert!(open.opened_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_before_touching_the_backend() {
        let (mut store, calls) = store_with(Vec::new()).await;

        let blank_title = store.create(draft("   ", "2099-01-01")).await;
        assert!(matches!(
            blank_title,
            Err(CapsuleError::Validation { .. })
        ));

        let mut no_message = draft("ok", "2099-01-01");
        no_message.message = "  \n ".to_string();
        assert!(matches!(
            store.create(no_message).await,
            Err(CapsuleError::Validation { .. })
        ));

        assert!(matches!(
            store.create(draft("ok", "not-a-date")).await,
            Err(CapsuleError::Validation { .. })
        ));
        assert!(matches!(
            store.create(draft("ok", "")).await,
            Err(CapsuleError::Validation { .. })
        ));

        assert!(store.list().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_capsules_keep_insertion_order_and_unique_ids() {
        let (mut store, _) = store_with(Vec::new()).await;

        let first = store.create(draft("first", "2099-01-01")).await.unwrap();
        let second = store.create(draft("second", "2099-01-01")).await.unwrap();

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "first");
        assert_eq!(listed[1].title, "second");
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn id_assignment_stays_ahead_of_existing_records() {
        // A record dated year 2100 in milliseconds
        let far_future_id = 4102444800000;
        let (mut store, _) = store_with(vec![seeded(far_future_id, (2099, 1, 1), true)]).await;

        let created = store.create(draft("new", "2099-01-01")).await.unwrap();
        assert_eq!(created.id, far_future_id + 1);
    }

    #[tokio::test]
    async fn id_assignment_saturates_at_the_ceiling() {
        // A stored id of i64::MAX must not wrap the next id negative
        let (mut store, _) = store_with(vec![seeded(i64::MAX, (2099, 1, 1), true)]).await;

        let created = store.create(draft("new", "2099-01-01")).await.unwrap();
        assert_eq!(created.id, i64::MAX);
    }

    #[tokio::test]
    async fn server_assigned_record_replaces_the_local_one() {
        let mut store = CapsuleStore::load(Box::new(AssigningBackend)).await;

        let created = store.create(draft("mine", "2099-01-01")).await.unwrap();
        assert_eq!(created.id, 777);
        assert_eq!(store.list()[0].id, 777);
        assert_eq!(*store.sync_status(), SyncStatus::InSync);
    }

    #[tokio::test]
    async fn failed_load_starts_empty_and_reports_out_of_sync() {
        let store = CapsuleStore::load(Box::new(FailingBackend)).await;
        assert!(store.list().is_empty());
        assert!(matches!(store.sync_status(), SyncStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn create_survives_a_dead_backend() {
        let mut store = CapsuleStore::load(Box::new(FailingBackend)).await;

        let created = store.create(draft("kept", "2099-01-01")).await.unwrap();

        // Read-your-writes: the capsule is visible despite the failure
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get(created.id).map(|c| c.title.as_str()), Some("kept"));
        assert!(matches!(store.sync_status(), SyncStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn open_unknown_id_is_a_silent_no_op() {
        let (mut store, calls) = store_with(vec![seeded(1, (2000, 1, 1), true)]).await;

        assert!(store.open(999).await.is_none());
        assert_eq!(store.list().len(), 1);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_refuses_to_unseal_a_future_capsule() {
        let (mut store, calls) = store_with(vec![seeded(1, (2099, 1, 1), true)]).await;

        let unchanged = store.open(1).await.unwrap();
        assert!(unchanged.is_locked);
        assert!(unchanged.opened_at.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_unlocks_and_stamps_exactly_once() {
        let (mut store, calls) = store_with(vec![seeded(1, (2000, 1, 1), true)]).await;

        let opened = store.open(1).await.unwrap();
        assert!(!opened.is_locked);
        let first_stamp = opened.opened_at.unwrap();

        // Second open changes nothing and causes no persistence traffic
        let again = store.open(1).await.unwrap();
        assert!(!again.is_locked);
        assert_eq!(again.opened_at.unwrap(), first_stamp);
        assert_eq!(calls.lock().unwrap().as_slice(), ["patch"]);
    }

    #[tokio::test]
    async fn open_stamps_a_capsule_born_unlocked() {
        let (mut store, _) = store_with(vec![seeded(1, (2000, 1, 1), false)]).await;

        let opened = store.open(1).await.unwrap();
        assert!(!opened.is_locked);
        assert!(opened.opened_at.is_some());
    }

    #[tokio::test]
    async fn open_keeps_its_effect_when_persistence_fails() {
        let mut store = CapsuleStore::load(Box::new(FailingBackend)).await;
        store.create(draft("kept", "2000-01-01")).await.unwrap();
        let id = store.list()[0].id;

        let opened = store.open(id).await.unwrap();
        assert!(opened.opened_at.is_some());
        assert_eq!(store.get(id).unwrap().opened_at, opened.opened_at);
        assert!(matches!(store.sync_status(), SyncStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn delete_removes_the_capsule_and_persists() {
        let (mut store, calls) =
            store_with(vec![seeded(1, (2099, 1, 1), true), seeded(2, (2099, 1, 1), true)]).await;

        assert!(store.delete(1).await);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].id, 2);
        assert_eq!(calls.lock().unwrap().as_slice(), ["delete"]);
    }

    #[tokio::test]
    async fn delete_unknown_id_leaves_everything_untouched() {
        let seed = vec![seeded(1, (2099, 1, 1), true)];
        let (mut store, calls) = store_with(seed.clone()).await;

        assert!(!store.delete(999).await);
        assert_eq!(store.list(), seed);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (mut store, _) = store_with(vec![seeded(1, (2099, 1, 1), true)]).await;

        assert!(store.delete(1).await);
        assert!(!store.delete(1).await);
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn title_is_trimmed_but_message_is_kept_verbatim() {
        let (mut store, _) = store_with(Vec::new()).await;

        let mut padded = draft("  spaced out  ", "2099-01-01");
        padded.message = "line one\n\nline two\n".to_string();
        let created = store.create(padded).await.unwrap();

        assert_eq!(created.title, "spaced out");
        assert_eq!(created.message, "line one\n\nline two\n");
    }
}
