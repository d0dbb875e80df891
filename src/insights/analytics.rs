use crate::error::{EngineError, EngineResult};
use crate::events::{Event, WorkflowStatus};
use crate::insights::patterns::{
    PatternInsight, PredictionInsight, detect_patterns, generate_predictions,
};
use crate::query::{
    EventQuery, SortDirection, SortDirective, SortField, TimeWindow, filter_events, sort_events,
    sort_key,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_TOP_N: usize = 5;

/// Inclusive creation-time range an analytics report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalyticsWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let window: Self = serde_json::from_str(raw)
            .map_err(|e| EngineError::validation(format!("invalid analytics window: {e}")))?;
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.start > self.end {
            return Err(EngineError::validation(format!(
                "analytics window start {} is after end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributions {
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_sentiment: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopEvents {
    pub most_engaging: Vec<EventSummary>,
    pub fastest_response: Vec<EventSummary>,
    pub most_viewed: Vec<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub window: AnalyticsWindow,
    pub overview: Overview,
    pub average_engagement: f64,
    /// Mean time-to-response in minutes over events that have one.
    pub average_response_minutes: Option<f64>,
    pub distributions: Distributions,
    pub top: TopEvents,
    pub patterns: Vec<PatternInsight>,
    pub predictions: Vec<PredictionInsight>,
}

pub fn analytics(
    events: &[Event],
    window: AnalyticsWindow,
    top_n: usize,
) -> EngineResult<AnalyticsReport> {
    window.validate()?;
    if top_n == 0 {
        return Err(EngineError::validation("top_n must be at least 1"));
    }
    let query = EventQuery {
        time: Some(TimeWindow::between(window.start, window.end)),
        ..EventQuery::default()
    };
    let windowed = filter_events(events, &query, window.end)?;
    debug!(
        total = events.len(),
        windowed = windowed.len(),
        "computing analytics"
    );

    let overview = Overview {
        total: windowed.len(),
        active: count_status(&windowed, WorkflowStatus::InProgress),
        completed: count_status(&windowed, WorkflowStatus::Completed),
    };

    let average_engagement = mean(windowed.iter().map(|e| e.tracking.engagement.score))
        .unwrap_or(0.0);
    let average_response_minutes = mean(windowed.iter().filter_map(|e| e.time_to_response()));

    let mut distributions = Distributions::default();
    for event in &windowed {
        let c = &event.classification;
        *distributions
            .by_type
            .entry(c.event_type.as_str().to_string())
            .or_default() += 1;
        *distributions
            .by_category
            .entry(c.category.as_str().to_string())
            .or_default() += 1;
        *distributions
            .by_sentiment
            .entry(c.sentiment.as_str().to_string())
            .or_default() += 1;
    }

    let top = TopEvents {
        most_engaging: top_by(&windowed, SortField::EngagementScore, SortDirection::Desc, top_n),
        fastest_response: top_by(&windowed, SortField::TimeToResponse, SortDirection::Asc, top_n),
        most_viewed: top_by(&windowed, SortField::ViewCount, SortDirection::Desc, top_n),
    };

    Ok(AnalyticsReport {
        window,
        overview,
        average_engagement,
        average_response_minutes,
        distributions,
        top,
        patterns: detect_patterns(&windowed, window.end),
        predictions: generate_predictions(&windowed, window.end),
    })
}

fn count_status(events: &[&Event], status: WorkflowStatus) -> usize {
    events.iter().filter(|e| e.workflow.status == status).count()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

// Events lacking the field are dropped rather than padded in at the tail.
fn top_by(
    events: &[&Event],
    field: SortField,
    direction: SortDirection,
    n: usize,
) -> Vec<EventSummary> {
    let mut ranked = events.to_vec();
    sort_events(&mut ranked, &SortDirective { field, direction });
    ranked
        .into_iter()
        .filter_map(|event| {
            sort_key(event, field).map(|value| EventSummary {
                id: event.id.clone(),
                title: event.title.clone(),
                value,
            })
        })
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Category, EventType, Sentiment};
    use crate::ingest::{EventDraft, build_event};
    use chrono::{Duration, TimeZone};

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap()
    }

    fn window() -> AnalyticsWindow {
        AnalyticsWindow::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(), end()).unwrap()
    }

    fn event(id: &str, days_before_end: i64) -> Event {
        let mut draft = EventDraft::new(format!("Event {id}"), "c1", "Camille");
        draft.id = Some(id.to_string());
        draft.created_at = Some(end() - Duration::days(days_before_end));
        build_event(draft, end())
    }

    #[test]
    fn response_average_skips_unmeasured_events() {
        let mut a = event("a", 1);
        a.tracking.engagement.time_to_response_minutes = Some(10.0);
        let b = event("b", 2);
        let report = analytics(&[a, b], window(), DEFAULT_TOP_N).unwrap();
        assert_eq!(report.average_response_minutes, Some(10.0));
        assert_eq!(report.top.fastest_response.len(), 1);
        assert_eq!(report.top.fastest_response[0].id, "a");
    }

    #[test]
    fn empty_window_reports_zero_engagement() {
        let report = analytics(&[event("old", 90)], window(), DEFAULT_TOP_N).unwrap();
        assert_eq!(report.overview.total, 0);
        assert_eq!(report.average_engagement, 0.0);
        assert_eq!(report.average_response_minutes, None);
        assert!(report.patterns.is_empty());
        assert_eq!(report.predictions[0].predicted_value, 0);
    }

    #[test]
    fn overview_and_distributions_cover_the_window_only() {
        let mut a = event("a", 1);
        a.workflow.status = WorkflowStatus::InProgress;
        a.classification.event_type = EventType::Sales;
        a.classification.category = Category::Call;
        a.tracking.engagement.score = 80.0;
        let mut b = event("b", 3);
        b.workflow.status = WorkflowStatus::Completed;
        b.classification.sentiment = Sentiment::Negative;
        b.tracking.engagement.score = 40.0;
        let c = event("c", 60);
        let report = analytics(&[a, b, c], window(), DEFAULT_TOP_N).unwrap();

        assert_eq!(
            report.overview,
            Overview {
                total: 2,
                active: 1,
                completed: 1
            }
        );
        assert_eq!(report.average_engagement, 60.0);
        assert_eq!(report.distributions.by_type["sales"], 1);
        assert_eq!(report.distributions.by_type["communication"], 1);
        assert_eq!(report.distributions.by_category["note"], 1);
        assert_eq!(report.distributions.by_sentiment["negative"], 1);
        assert!(!report.distributions.by_type.contains_key("support"));
    }

    #[test]
    fn top_lists_are_capped_and_ordered() {
        let mut events: Vec<Event> = (0..8).map(|i| event(&format!("e{i}"), i)).collect();
        for (i, e) in events.iter_mut().enumerate() {
            e.tracking.engagement.score = (i * 10) as f64;
            e.tracking.view_count = (8 - i) as u64;
        }
        let report = analytics(&events, window(), 3).unwrap();
        let engaging: Vec<_> = report.top.most_engaging.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(engaging, vec!["e7", "e6", "e5"]);
        let viewed: Vec<_> = report.top.most_viewed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(viewed, vec!["e0", "e1", "e2"]);
        assert_eq!(report.top.most_viewed[0].value, 8.0);
    }

    #[test]
    fn window_parses_and_rejects_inverted_bounds() {
        let ok = AnalyticsWindow::from_json(
            r#"{"start": "2026-03-01T00:00:00Z", "end": "2026-03-31T23:59:59Z"}"#,
        )
        .unwrap();
        assert_eq!(ok, window());

        let err = AnalyticsWindow::from_json(
            r#"{"start": "2026-04-01T00:00:00Z", "end": "2026-03-01T00:00:00Z"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(analytics(&[], window(), 0).is_err());
    }
}
