use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::fs;
use tempfile::tempdir;
use tidings::commands::{self, Session};
use tidings::config::EngineConfig;
use tidings::events::legacy::convert_legacy;
use tidings::events::{
    Category, EventStore, EventType, Priority, RecommendationKind, Sentiment, Source, Urgency,
};
use tidings::insights::patterns::PatternKind;
use tidings::query::EventQuery;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

#[test]
fn record_without_priority_gets_default_scores() {
    let event = convert_legacy(
        &json!({"id": 17, "title": "Visite agence", "type": "visit", "createdBy": "marie"}),
        now(),
    );
    assert_eq!(event.id, "17");
    assert_eq!(event.insights.risk_score, 20.0);
    assert_eq!(event.insights.opportunity_score, 50.0);
    assert_eq!(event.tracking.engagement.score, 50.0);
    assert_eq!(event.classification.event_type, EventType::Communication);
    assert_eq!(event.classification.category, Category::Note);
    assert_eq!(event.classification.sub_type.as_deref(), Some("visit"));
}

#[test]
fn garbled_created_at_falls_back_to_now() {
    let event = convert_legacy(&json!({"createdAt": "last tuesday"}), now());
    assert_eq!(event.created_at, now());
}

#[test]
fn import_through_a_configured_session() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let cfg_dir = root.join(".tidings");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("config.toml"),
        r#"
version = 1
[store]
path = "state/events.db"
[logging]
ndjson = "logs/tidings.ndjson"
"#,
    )
    .unwrap();

    let raw = json!([
        {"id": "l1", "title": "Appel devis", "type": "call", "priority": "high",
         "participants": ["Alice"], "createdAt": "2026-02-28T10:00:00Z"},
        {"id": "l2", "title": "Réunion", "type": "meeting", "status": "completed",
         "date": "2026-02-27", "time": "15:00"}
    ])
    .to_string();

    {
        let mut session = Session::open(root, None).unwrap();
        let imported = commands::import_legacy(&mut session, &raw, now()).unwrap();
        assert_eq!(imported.len(), 2);
        assert!(imported.iter().all(|e| e.system.source == Source::Legacy));
        assert_eq!(imported[0].classification.priority, Priority::High);
        assert_eq!(imported[1].executed_at, imported[1].scheduled_at);
    }

    assert!(root.join("state").join("events.db").exists());
    let session = Session::open(root, None).unwrap();
    assert_eq!(session.store.len(), 2);

    let mut query = EventQuery::default();
    query.classification.categories = vec![Category::Meeting];
    let found = commands::run_query(&session, &query, now()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].classification.event_type, EventType::Sales);

    let log = fs::read_to_string(root.join("logs").join("tidings.ndjson")).unwrap();
    let kinds: Vec<String> = log
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["kind"].to_string())
        .collect();
    assert_eq!(kinds.iter().filter(|k| k.contains("mutation")).count(), 2);
    assert_eq!(kinds.iter().filter(|k| k.contains("query")).count(), 1);
}

#[test]
fn imported_text_is_classified_and_feeds_patterns() {
    let mut session = Session::with_store(EngineConfig::default(), EventStore::in_memory(), None);
    let raw = json!([
        {"id": "a", "title": "Urgent: problème, retard, plainte", "type": "call"},
        {"id": "b", "title": "Urgent: problème, retard, plainte inacceptable", "type": "call",
         "priority": "low"}
    ])
    .to_string();
    let imported = commands::import_legacy(&mut session, &raw, now()).unwrap();

    let a = &imported[0];
    assert_eq!(a.classification.sentiment, Sentiment::VeryNegative);
    assert_eq!(a.classification.urgency, Urgency::Asap);
    assert_eq!(a.classification.priority, Priority::Urgent);
    let kinds: Vec<_> = a.insights.recommended_actions.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RecommendationKind::Escalation, RecommendationKind::Action]);
    assert_eq!(a.insights.risk_score, 20.0);
    assert_eq!(a.insights.opportunity_score, 50.0);
    assert_eq!(a.tracking.engagement.score, 50.0);

    assert_eq!(imported[1].classification.priority, Priority::Low);

    let report = commands::patterns(&session, None, now()).unwrap();
    assert!(report.patterns.iter().any(|p| p.kind == PatternKind::Behavioral));
}
