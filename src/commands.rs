//! Command handlers behind the CLI. Each takes an open [`Session`] and an
//! explicit `now`, and returns serializable output for the caller to print.

use crate::config::{EngineConfig, load_config};
use crate::events::legacy::{convert_legacy, legacy_priority};
use crate::events::{Event, EventStore, Response, Sentiment};
use crate::ingest::{EventDraft, build_event, enrich};
use crate::insights::{
    AnalyticsReport, AnalyticsWindow, PatternInsight, PredictionInsight, analytics,
    detect_patterns, generate_predictions,
};
use crate::logging::ndjson;
use crate::query::{
    EventQuery, SearchHit, TimeWindow, classic_search, filter_events, semantic_search,
};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct Session {
    pub config: EngineConfig,
    pub store: EventStore,
    query_log: Option<PathBuf>,
}

impl Session {
    /// Load `.tidings/config.toml` under `root` and open the SQLite store it
    /// names, unless `state_db` overrides it. Relative configured paths are
    /// resolved against `root`.
    pub fn open(root: &Path, state_db: Option<PathBuf>) -> Result<Self> {
        let config = load_config(root)?;
        let db_path = state_db.unwrap_or_else(|| root.join(config.store_path()));
        let store = EventStore::open_sqlite(&db_path)
            .with_context(|| format!("open event store {}", db_path.display()))?;
        info!(path = %db_path.display(), events = store.len(), "opened event store");
        let log = config.logging.ndjson.as_ref().map(|p| root.join(p));
        Ok(Self::with_store(config, store, log))
    }

    pub fn with_store(config: EngineConfig, store: EventStore, log: Option<PathBuf>) -> Self {
        let store = match log.clone() {
            Some(path) => store.with_mirror(path),
            None => store,
        };
        Self {
            config,
            store,
            query_log: log,
        }
    }
}

/// Accepts either one JSON object or an array of them.
fn json_items(raw: &str, what: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw).with_context(|| format!("parse {what} JSON"))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        _ => bail!("{what} must be a JSON object or an array of objects"),
    }
}

pub fn ingest(session: &mut Session, raw: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
    let mut stored = Vec::new();
    for (idx, item) in json_items(raw, "draft")?.into_iter().enumerate() {
        let draft: EventDraft =
            serde_json::from_value(item).with_context(|| format!("decode draft #{idx}"))?;
        let event = build_event(draft, now);
        stored.push(session.store.upsert_at(event, now)?);
    }
    info!(count = stored.len(), "ingested drafts");
    Ok(stored)
}

/// Convert flat legacy records, classify their text, and store them. An
/// explicit legacy priority and the default scores survive classification.
pub fn import_legacy(session: &mut Session, raw: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
    let mut stored = Vec::new();
    for item in json_items(raw, "legacy records")? {
        let mut event = convert_legacy(&item, now);
        enrich(&mut event, legacy_priority(&item));
        stored.push(session.store.upsert_at(event, now)?);
    }
    info!(count = stored.len(), "imported legacy records");
    Ok(stored)
}

pub fn record_view(session: &mut Session, id: &str, now: DateTime<Utc>) -> Result<Event> {
    Ok(session.store.record_view(id, now)?)
}

pub fn record_response(
    session: &mut Session,
    id: &str,
    participant_id: &str,
    response_type: &str,
    content: &str,
    sentiment: Option<Sentiment>,
    now: DateTime<Utc>,
) -> Result<Event> {
    let response = Response {
        participant_id: participant_id.to_string(),
        response_type: response_type.to_string(),
        content: content.to_string(),
        at: now,
        sentiment,
    };
    Ok(session.store.record_response(id, response, now)?)
}

pub fn run_query(session: &Session, query: &EventQuery, now: DateTime<Utc>) -> Result<Vec<Event>> {
    query.validate()?;
    let matched = filter_events(session.store.get_all(), query, now)?;
    if let Some(log) = session.query_log.as_deref()
        && let Err(err) = ndjson::mirror_query(log, query, matched.len())
    {
        warn!(path = %log.display(), "failed to log query: {err:#}");
    }
    Ok(matched.into_iter().cloned().collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub fingerprint: String,
    pub matched: usize,
}

/// Re-run every query found in an NDJSON log against the current collection.
pub fn replay(session: &Session, log: &Path, now: DateTime<Utc>) -> Result<Vec<ReplayOutcome>> {
    let mut outcomes = Vec::new();
    for query in ndjson::replay_queries(log)? {
        let matched = filter_events(session.store.get_all(), &query, now)?;
        outcomes.push(ReplayOutcome {
            fingerprint: ndjson::query_fingerprint(&query)?,
            matched: matched.len(),
        });
    }
    Ok(outcomes)
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SearchOutput<'a> {
    Ranked(Vec<SearchHit<'a>>),
    Literal(Vec<&'a Event>),
}

impl SearchOutput<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Ranked(hits) => hits.len(),
            Self::Literal(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn search<'a>(session: &'a Session, text: &str, classic: bool) -> SearchOutput<'a> {
    let min_len = session.config.search.min_token_len;
    let events = session.store.get_all();
    if classic {
        SearchOutput::Literal(classic_search(text, events, min_len))
    } else {
        SearchOutput::Ranked(semantic_search(text, events, min_len))
    }
}

pub fn analytics_report(session: &Session, window: AnalyticsWindow) -> Result<AnalyticsReport> {
    Ok(analytics(
        session.store.get_all(),
        window,
        session.config.analytics.top_n,
    )?)
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub analysed: usize,
    pub patterns: Vec<PatternInsight>,
    pub predictions: Vec<PredictionInsight>,
}

pub fn patterns(
    session: &Session,
    window: Option<TimeWindow>,
    now: DateTime<Utc>,
) -> Result<PatternReport> {
    let query = EventQuery {
        time: window,
        ..EventQuery::default()
    };
    let events = filter_events(session.store.get_all(), &query, now)?;
    Ok(PatternReport {
        analysed: events.len(),
        patterns: detect_patterns(&events, now),
        predictions: generate_predictions(&events, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn session(log: Option<PathBuf>) -> Session {
        Session::with_store(EngineConfig::default(), EventStore::in_memory(), log)
    }

    #[test]
    fn ingest_accepts_object_or_array() {
        let mut s = session(None);
        let one = r#"{"title": "Appel", "creator": {"id": "c1", "name": "Camille"}}"#;
        assert_eq!(ingest(&mut s, one, now()).unwrap().len(), 1);
        let many = r#"[
            {"title": "Devis", "content": "envoyer le devis", "creator": {"id": "c1", "name": "Camille"}},
            {"title": "Relance", "creator": {"id": "c2", "name": "Bruno"}}
        ]"#;
        assert_eq!(ingest(&mut s, many, now()).unwrap().len(), 2);
        assert_eq!(s.store.len(), 3);
        assert!(ingest(&mut s, "42", now()).is_err());
    }

    #[test]
    fn legacy_import_keeps_priority_and_adds_keywords() {
        let mut s = session(None);
        let raw = r#"[{"id": "l1", "title": "Devis urgent", "priority": "low", "type": "email"}]"#;
        let events = import_legacy(&mut s, raw, now()).unwrap();
        let event = &events[0];
        assert_eq!(event.classification.priority, crate::events::Priority::Low);
        assert_eq!(event.insights.risk_score, 20.0);
        assert!(event.enrichment.keywords.contains(&"devis".to_string()));
    }

    #[test]
    fn queries_are_logged_and_replayable() {
        let tmp = tempdir().unwrap();
        let log = tmp.path().join("tidings.ndjson");
        let mut s = session(Some(log.clone()));
        ingest(
            &mut s,
            r#"{"title": "Problème urgent", "creator": {"id": "c1", "name": "Camille"}}"#,
            now(),
        )
        .unwrap();

        let mut query = EventQuery::default();
        query.classification.priorities = vec![crate::events::Priority::Urgent];
        assert_eq!(run_query(&s, &query, now()).unwrap().len(), 1);

        let outcomes = replay(&s, &log, now()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].matched, 1);
        assert_eq!(
            outcomes[0].fingerprint,
            ndjson::query_fingerprint(&query).unwrap()
        );
    }

    #[test]
    fn search_mode_follows_flag() {
        let mut s = session(None);
        ingest(
            &mut s,
            r#"{"title": "Sinistre", "content": "déclaration de sinistre", "creator": {"id": "c1", "name": "Camille"}}"#,
            now(),
        )
        .unwrap();
        assert!(matches!(search(&s, "sinistre", false), SearchOutput::Ranked(_)));
        assert!(matches!(search(&s, "camille", true), SearchOutput::Literal(_)));
        assert_eq!(search(&s, "camille", true).len(), 1);
        assert!(search(&s, "camille", false).is_empty());
    }

    #[test]
    fn response_marks_recipient_and_view_counts() {
        let mut s = session(None);
        let raw = r#"{"id": "e1", "title": "Relance", "creator": {"id": "c1", "name": "Camille"},
            "recipients": [{"id": "r1", "name": "Rita", "is_internal": false}]}"#;
        ingest(&mut s, raw, now()).unwrap();
        record_view(&mut s, "e1", now()).unwrap();
        let event = record_response(&mut s, "e1", "r1", "email", "merci", None, now()).unwrap();
        assert_eq!(event.tracking.view_count, 1);
        assert_eq!(event.tracking.engagement.response_rate, Some(100.0));
        assert_eq!(event.system.version, 3);
        assert!(record_view(&mut s, "missing", now()).is_err());
    }
}
