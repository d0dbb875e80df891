use crate::error::EngineResult;
use crate::events::Event;
use crate::query::{
    ClassificationFilter, ContentFilter, EventQuery, ParticipantFilter, SortDirection,
    SortDirective, SortField,
};
use chrono::{DateTime, Utc};

impl ParticipantFilter {
    pub fn is_active(&self) -> bool {
        !self.creators.is_empty() || !self.recipients.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.is_active() {
            return true;
        }
        self.creators.contains(&event.creator.id)
            || event
                .recipients
                .iter()
                .any(|r| self.recipients.contains(&r.id))
    }
}

impl ClassificationFilter {
    pub fn is_active(&self) -> bool {
        !self.types.is_empty()
            || !self.categories.is_empty()
            || !self.priorities.is_empty()
            || !self.sentiments.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.is_active() {
            return true;
        }
        let c = &event.classification;
        self.types.contains(&c.event_type)
            || self.categories.contains(&c.category)
            || self.priorities.contains(&c.priority)
            || self.sentiments.contains(&c.sentiment)
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

impl ContentFilter {
    pub fn is_active(&self) -> bool {
        !self.keywords.is_empty() || !self.hashtags.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.is_active() {
            return true;
        }
        let keyword_hit = self.keywords.iter().any(|wanted| {
            let wanted = wanted.trim().to_lowercase();
            event
                .enrichment
                .keywords
                .iter()
                .any(|k| k.to_lowercase() == wanted)
        });
        keyword_hit
            || self.hashtags.iter().any(|wanted| {
                let wanted = normalize_tag(wanted);
                event
                    .enrichment
                    .hashtags
                    .iter()
                    .any(|t| normalize_tag(t) == wanted)
            })
    }
}

fn in_window(event: &Event, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|s| event.created_at >= s) && end.is_none_or(|e| event.created_at <= e)
}

/// Apply `query` to `events`: time window, participants, classification,
/// content, then sort. The input is never reordered; the result borrows from it.
pub fn filter_events<'a>(
    events: &'a [Event],
    query: &EventQuery,
    now: DateTime<Utc>,
) -> EngineResult<Vec<&'a Event>> {
    let (start, end) = match &query.time {
        Some(window) => window.bounds(now)?,
        None => (None, None),
    };

    let mut out: Vec<&Event> = events.iter().collect();
    out.retain(|e| in_window(e, start, end));
    out.retain(|e| query.participants.matches(e));
    out.retain(|e| query.classification.matches(e));
    out.retain(|e| query.content.matches(e));
    if let Some(directive) = &query.sort {
        sort_events(&mut out, directive);
    }
    Ok(out)
}

/// The comparable value of `field`, or `None` when the event has none.
pub fn sort_key(event: &Event, field: SortField) -> Option<f64> {
    match field {
        SortField::CreatedAt => Some(event.created_at.timestamp_millis() as f64),
        SortField::ScheduledAt => event.scheduled_at.map(|t| t.timestamp_millis() as f64),
        SortField::ExecutedAt => event.executed_at.map(|t| t.timestamp_millis() as f64),
        SortField::Priority => Some(f64::from(event.classification.priority.rank())),
        SortField::EngagementScore => Some(event.tracking.engagement.score),
        SortField::RiskScore => Some(event.insights.risk_score),
        SortField::OpportunityScore => Some(event.insights.opportunity_score),
        SortField::ViewCount => Some(event.tracking.view_count as f64),
        SortField::TimeToResponse => event.time_to_response(),
    }
}

/// Stable sort; events without a value for the field go last in either
/// direction, keeping their relative order.
pub fn sort_events(events: &mut Vec<&Event>, directive: &SortDirective) {
    let mut keyed = Vec::with_capacity(events.len());
    let mut missing = Vec::new();
    for event in events.drain(..) {
        match sort_key(event, directive.field) {
            Some(key) => keyed.push((key, event)),
            None => missing.push(event),
        }
    }
    keyed.sort_by(|(a, _), (b, _)| match directive.direction {
        SortDirection::Asc => a.total_cmp(b),
        SortDirection::Desc => b.total_cmp(a),
    });
    events.extend(keyed.into_iter().map(|(_, event)| event));
    events.extend(missing);
}
