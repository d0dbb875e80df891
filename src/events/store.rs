use crate::error::{EngineError, EngineResult};
use crate::events::model::{AuditEntry, Event, Response, ResponseStatus, clamp_score};
use crate::events::schema;
use crate::logging::ndjson;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EVENTS_KEY: &str = "events";
const RESPONSE_ENGAGEMENT_BONUS: f64 = 5.0;

/// Opaque key/value durability layer under the event store.
pub trait BlobStore {
    fn load(&self, key: &str) -> EngineResult<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> EngineResult<()>;
}

pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    pub fn open(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Persistence(format!("create db parent dir {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }
}

impl BlobStore for SqliteBlobStore {
    fn load(&self, key: &str) -> EngineResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn save(&mut self, key: &str, value: &str) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> EngineResult<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The canonical event collection. Insertion order is preserved and is the
/// "original order" every stable sort and search tie-break refers to.
pub struct EventStore {
    backend: Box<dyn BlobStore>,
    events: Vec<Event>,
    mirror: Option<PathBuf>,
}

impl EventStore {
    pub fn open(backend: Box<dyn BlobStore>) -> EngineResult<Self> {
        let events = match backend.load(EVENTS_KEY)? {
            Some(raw) => serde_json::from_str::<Vec<Event>>(&raw)
                .map_err(|e| EngineError::Persistence(format!("decode stored events: {e}")))?,
            None => Vec::new(),
        };
        debug!(count = events.len(), "loaded event collection");
        Ok(Self {
            backend,
            events,
            mirror: None,
        })
    }

    pub fn open_sqlite(path: &Path) -> EngineResult<Self> {
        Self::open(Box::new(SqliteBlobStore::open(path)?))
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBlobStore::default()),
            events: Vec::new(),
            mirror: None,
        }
    }

    /// Mirror every mutation as an NDJSON line to `path`.
    pub fn with_mirror(mut self, path: PathBuf) -> Self {
        self.mirror = Some(path);
        self
    }

    pub fn get_all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> EngineResult<&Event> {
        self.events
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| EngineError::not_found(id))
    }

    pub fn upsert(&mut self, event: Event) -> EngineResult<Event> {
        self.upsert_at(event, Utc::now())
    }

    pub fn upsert_at(&mut self, mut event: Event, now: DateTime<Utc>) -> EngineResult<Event> {
        if event.id.trim().is_empty() {
            return Err(EngineError::validation("event id must not be empty"));
        }
        event.normalize();

        let mut next = self.events.clone();
        match next.iter().position(|e| e.id == event.id) {
            Some(idx) => {
                let existing = &next[idx];
                if let Err(err) = existing.check_recipient_progress(&event) {
                    warn!(event_id = %event.id, "rejected recipient status regression");
                    return Err(err);
                }
                event.created_at = existing.created_at;
                event.system.version = existing.system.version + 1;
                event.system.audit_trail = existing.system.audit_trail.clone();
                event.last_modified = now;
                event.system.audit_trail.push(AuditEntry {
                    at: now,
                    action: "updated".to_string(),
                    actor: event.creator.id.clone(),
                    details: Some(format!("version {}", event.system.version)),
                });
                next[idx] = event.clone();
            }
            None => {
                event.system.version = 1;
                event.last_modified = now;
                event.system.audit_trail.push(AuditEntry {
                    at: now,
                    action: "created".to_string(),
                    actor: event.creator.id.clone(),
                    details: None,
                });
                next.push(event.clone());
            }
        }

        self.commit(next)?;
        self.mirror_mutation("upsert", &event);
        debug!(event_id = %event.id, version = event.system.version, "upserted event");
        Ok(event)
    }

    pub fn delete(&mut self, id: &str) -> EngineResult<Event> {
        let idx = self
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::not_found(id))?;
        let mut next = self.events.clone();
        let removed = next.remove(idx);
        self.commit(next)?;
        self.mirror_mutation("delete", &removed);
        debug!(event_id = %id, "deleted event");
        Ok(removed)
    }

    pub fn record_view(&mut self, id: &str, now: DateTime<Utc>) -> EngineResult<Event> {
        let mut event = self.get_by_id(id)?.clone();
        event.tracking.view_count += 1;
        self.upsert_at(event, now)
    }

    /// Append a response, advance the responding recipient and refresh the
    /// engagement block.
    pub fn record_response(
        &mut self,
        id: &str,
        response: Response,
        now: DateTime<Utc>,
    ) -> EngineResult<Event> {
        let mut event = self.get_by_id(id)?.clone();
        if let Some(recipient) = event
            .recipients
            .iter_mut()
            .find(|r| r.id == response.participant_id)
        {
            recipient.response_status = ResponseStatus::Responded;
        }

        let engagement = &mut event.tracking.engagement;
        if engagement.time_to_response_minutes.is_none() {
            let anchor = event.executed_at.unwrap_or(event.created_at);
            let minutes = (response.at - anchor).num_seconds() as f64 / 60.0;
            engagement.time_to_response_minutes = Some(minutes.max(0.0));
        }
        engagement.score = clamp_score(engagement.score + RESPONSE_ENGAGEMENT_BONUS);
        event.tracking.interaction_count += 1;
        event.tracking.responses.push(response);
        event.tracking.engagement.response_rate = event.recipient_response_rate();

        self.upsert_at(event, now)
    }

    fn commit(&mut self, next: Vec<Event>) -> EngineResult<()> {
        let raw = serde_json::to_string(&next)
            .map_err(|e| EngineError::Persistence(format!("encode events: {e}")))?;
        self.backend.save(EVENTS_KEY, &raw)?;
        self.events = next;
        Ok(())
    }

    fn mirror_mutation(&self, action: &str, event: &Event) {
        if let Some(path) = self.mirror.as_deref()
            && let Err(err) = ndjson::mirror_mutation(path, action, event)
        {
            warn!(path = %path.display(), "failed to mirror mutation: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::Recipient;
    use crate::ingest::{EventDraft, build_event};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn sample(title: &str) -> Event {
        let mut draft = EventDraft::new(title, "c1", "Camille");
        draft.recipients = vec![Recipient::pending("r1", "Romain")];
        build_event(draft, at(9))
    }

    struct FailingBlobStore;

    impl BlobStore for FailingBlobStore {
        fn load(&self, _key: &str) -> EngineResult<Option<String>> {
            Ok(None)
        }

        fn save(&mut self, _key: &str, _value: &str) -> EngineResult<()> {
            Err(EngineError::Persistence("disk unplugged".to_string()))
        }
    }

    #[test]
    fn insert_starts_at_version_one_and_updates_bump() {
        let mut store = EventStore::in_memory();
        let stored = store.upsert_at(sample("Call back"), at(10)).unwrap();
        assert_eq!(stored.system.version, 1);

        let mut edited = stored.clone();
        edited.title = "Call back tomorrow".to_string();
        let updated = store.upsert_at(edited, at(11)).unwrap();
        assert_eq!(updated.system.version, 2);
        assert_eq!(updated.last_modified, at(11));
        assert_eq!(updated.created_at, stored.created_at);
        assert_eq!(updated.system.audit_trail.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stale_version_in_payload_does_not_lower_counter() {
        let mut store = EventStore::in_memory();
        let stored = store.upsert_at(sample("Quote"), at(10)).unwrap();
        let second = store.upsert_at(stored.clone(), at(11)).unwrap();
        let third = store.upsert_at(stored, at(12)).unwrap();
        assert_eq!(second.system.version, 2);
        assert_eq!(third.system.version, 3);
    }

    #[test]
    fn get_and_delete_unknown_ids_are_not_found() {
        let mut store = EventStore::in_memory();
        assert!(matches!(
            store.get_by_id("nope"),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("nope"),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn recipient_status_regression_is_rejected() {
        let mut store = EventStore::in_memory();
        let mut event = sample("Follow-up");
        event.advance_recipient("r1", ResponseStatus::Read).unwrap();
        let stored = store.upsert_at(event, at(10)).unwrap();

        let mut regressed = stored.clone();
        regressed.recipients[0].response_status = ResponseStatus::Delivered;
        let err = store.upsert_at(regressed, at(11)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(store.get_by_id(&stored.id).unwrap().system.version, 1);
    }

    #[test]
    fn persistence_failure_leaves_collection_untouched() {
        let mut store = EventStore::open(Box::new(FailingBlobStore)).unwrap();
        let err = store.upsert_at(sample("Lost"), at(10)).unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn scores_are_clamped_on_upsert() {
        let mut store = EventStore::in_memory();
        let mut event = sample("Scores");
        event.insights.risk_score = 140.0;
        event.tracking.engagement.score = -3.0;
        let stored = store.upsert_at(event, at(10)).unwrap();
        assert_eq!(stored.insights.risk_score, 100.0);
        assert_eq!(stored.tracking.engagement.score, 0.0);
    }

    #[test]
    fn response_updates_tracking_and_recipient() {
        let mut store = EventStore::in_memory();
        let stored = store.upsert_at(sample("Ping"), at(9)).unwrap();
        let updated = store
            .record_response(
                &stored.id,
                Response {
                    participant_id: "r1".to_string(),
                    response_type: "reply".to_string(),
                    content: "ok".to_string(),
                    at: at(10),
                    sentiment: None,
                },
                at(10),
            )
            .unwrap();
        assert_eq!(updated.recipients[0].response_status, ResponseStatus::Responded);
        assert_eq!(updated.tracking.engagement.time_to_response_minutes, Some(60.0));
        assert_eq!(updated.tracking.engagement.response_rate, Some(100.0));
        assert_eq!(updated.tracking.interaction_count, 1);
        assert_eq!(updated.system.version, 2);
    }

    #[test]
    fn sqlite_backend_survives_reopen() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("events.db");
        let id = {
            let mut store = EventStore::open_sqlite(&db).unwrap();
            let stored = store.upsert_at(sample("Persisted"), at(10)).unwrap();
            store.record_view(&stored.id, at(11)).unwrap();
            stored.id
        };
        let store = EventStore::open_sqlite(&db).unwrap();
        let event = store.get_by_id(&id).unwrap();
        assert_eq!(event.tracking.view_count, 1);
        assert_eq!(event.system.version, 2);
    }

    #[test]
    fn delete_removes_event_and_persists() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("events.db");
        let (gone, kept) = {
            let mut store = EventStore::open_sqlite(&db).unwrap();
            let gone = store.upsert_at(sample("Obsolete"), at(10)).unwrap();
            let kept = store.upsert_at(sample("Current"), at(10)).unwrap();
            let removed = store.delete(&gone.id).unwrap();
            assert_eq!(removed.id, gone.id);
            assert_eq!(removed.title, "Obsolete");
            assert_eq!(store.len(), 1);
            assert!(matches!(
                store.get_by_id(&gone.id),
                Err(EngineError::NotFound { .. })
            ));
            (gone.id, kept.id)
        };
        let store = EventStore::open_sqlite(&db).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_all()[0].id, kept);
        assert!(matches!(
            store.get_by_id(&gone),
            Err(EngineError::NotFound { .. })
        ));
    }
}
