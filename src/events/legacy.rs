//! Conversion of the old flat event records into full [`Event`]s.
//!
//! The flat shape carried `id, title, description, type, date, time, status,
//! priority, participants, createdAt, createdBy, attachments`. Conversion
//! never fails: anything missing or unreadable falls back to a default.

use crate::events::{
    Attachment, Category, Event, EventType, Participant, Priority, Recipient, Source,
    WorkflowStatus,
};
use crate::ingest::blank_event;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled event";
pub const UNKNOWN_CREATOR: &str = "unknown";

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn convert_legacy(legacy: &Value, now: DateTime<Utc>) -> Event {
    let id = str_field(legacy, "id")
        .map(ToString::to_string)
        .or_else(|| legacy.get("id").and_then(|v| v.as_i64()).map(|n| n.to_string()))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let title = str_field(legacy, "title").unwrap_or(UNTITLED).to_string();
    let created_at = str_field(legacy, "createdAt")
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let creator_name = str_field(legacy, "createdBy").unwrap_or(UNKNOWN_CREATOR);
    let creator = Participant::creator(creator_name, creator_name, true);

    let mut event = blank_event(id, title, creator, created_at, Source::Legacy);
    event.description = str_field(legacy, "description").unwrap_or("").to_string();

    let (event_type, category) = map_type(str_field(legacy, "type"));
    event.classification.event_type = event_type;
    event.classification.category = category;
    event.channel.primary = category;
    if let Some(raw) = str_field(legacy, "type") {
        event.classification.sub_type = Some(raw.to_lowercase());
    }

    if let Some(priority) = legacy_priority(legacy) {
        event.classification.priority = priority;
    }

    event.scheduled_at = scheduled_at(
        str_field(legacy, "date"),
        str_field(legacy, "time"),
    );
    event.workflow.status = str_field(legacy, "status")
        .and_then(map_status)
        .unwrap_or(match event.scheduled_at {
            Some(at) if at > now => WorkflowStatus::Scheduled,
            _ => WorkflowStatus::Draft,
        });
    if event.workflow.status == WorkflowStatus::Completed {
        event.executed_at = event.scheduled_at;
    }

    event.recipients = legacy
        .get("participants")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(map_participant).collect())
        .unwrap_or_default();

    event.attachments = legacy
        .get("attachments")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| map_attachment(&event.id, idx, item))
                .collect()
        })
        .unwrap_or_default();

    event
}

/// The priority a legacy record states explicitly, if it names a known one.
pub fn legacy_priority(legacy: &Value) -> Option<Priority> {
    str_field(legacy, "priority").and_then(map_priority)
}

fn map_type(raw: Option<&str>) -> (EventType, Category) {
    match raw.map(str::to_lowercase).as_deref() {
        Some("call") => (EventType::Communication, Category::Call),
        Some("email") => (EventType::Communication, Category::Email),
        Some("meeting") => (EventType::Sales, Category::Meeting),
        _ => (EventType::Communication, Category::Note),
    }
}

fn map_priority(raw: &str) -> Option<Priority> {
    match raw.to_lowercase().as_str() {
        "low" | "basse" => Some(Priority::Low),
        "normal" | "medium" | "moyenne" => Some(Priority::Normal),
        "high" | "haute" => Some(Priority::High),
        "urgent" => Some(Priority::Urgent),
        "critical" | "critique" => Some(Priority::Critical),
        _ => None,
    }
}

fn map_status(raw: &str) -> Option<WorkflowStatus> {
    match raw.to_lowercase().as_str() {
        "draft" => Some(WorkflowStatus::Draft),
        "scheduled" | "planned" | "pending" => Some(WorkflowStatus::Scheduled),
        "in_progress" | "in-progress" | "ongoing" => Some(WorkflowStatus::InProgress),
        "completed" | "done" => Some(WorkflowStatus::Completed),
        "cancelled" | "canceled" => Some(WorkflowStatus::Cancelled),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::default()))
        })
        .map(|naive| naive.and_utc())
}

fn scheduled_at(date: Option<&str>, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date?, "%Y-%m-%d").ok()?;
    let time = time
        .and_then(|t| {
            NaiveTime::parse_from_str(t, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
                .ok()
        })
        .unwrap_or_default();
    Some(date.and_time(time).and_utc())
}

fn map_participant(item: &Value) -> Option<Recipient> {
    match item {
        Value::String(s) if !s.trim().is_empty() => {
            Some(Recipient::pending(s.trim(), s.trim()))
        }
        Value::Object(_) => {
            let id = str_field(item, "id").or_else(|| str_field(item, "name"))?;
            let name = str_field(item, "name").unwrap_or(id);
            Some(Recipient::pending(id, name))
        }
        _ => None,
    }
}

fn map_attachment(event_id: &str, idx: usize, item: &Value) -> Option<Attachment> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(Attachment {
            id: format!("{event_id}-att-{idx}"),
            name: s.rsplit('/').next().unwrap_or(s).to_string(),
            kind: "file".to_string(),
            url: s.clone(),
            size: None,
            mime_type: None,
        }),
        Value::Object(_) => {
            let name = str_field(item, "name").or_else(|| str_field(item, "url"))?;
            Some(Attachment {
                id: str_field(item, "id")
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("{event_id}-att-{idx}")),
                name: name.to_string(),
                kind: str_field(item, "type").unwrap_or("file").to_string(),
                url: str_field(item, "url").unwrap_or("").to_string(),
                size: item.get("size").and_then(|v| v.as_u64()),
                mime_type: str_field(item, "mimeType").map(ToString::to_string),
            })
        }
        _ => None,
    }
}
