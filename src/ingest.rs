use crate::analysis::content::{BUSINESS_WORDS, ContentAnalysis, analyze};
use crate::analysis::recommend::recommend;
use crate::events::model::clamp_score;
use crate::events::{
    AiInsights, Attachment, BusinessImpact, Category, Channel, Classification, DeliveryStatus,
    Engagement, Enrichment, Event, EventType, Participant, ParticipantRole, Permissions, Priority,
    Recipient, Relationships, Sentiment, Source, SystemMeta, Tracking, Urgency, Workflow,
    WorkflowStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ENGAGEMENT_SCORE: f64 = 50.0;
pub const DEFAULT_RISK_SCORE: f64 = 20.0;
pub const DEFAULT_OPPORTUNITY_SCORE: f64 = 50.0;

/// A new interaction as entered by a user or delivered by a channel sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_event_type")]
    pub event_type: EventType,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default = "default_category")]
    pub category: Category,
    pub creator: Participant,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub mentions: Vec<Participant>,
    #[serde(default)]
    pub watchers: Vec<Participant>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default = "default_source")]
    pub source: Source,
}

fn default_event_type() -> EventType {
    EventType::Communication
}

fn default_category() -> Category {
    Category::Note
}

fn default_source() -> Source {
    Source::Manual
}

impl EventDraft {
    pub fn new(
        title: impl Into<String>,
        creator_id: impl Into<String>,
        creator_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            content: String::new(),
            event_type: default_event_type(),
            sub_type: None,
            category: default_category(),
            creator: Participant::creator(creator_id, creator_name, true),
            recipients: Vec::new(),
            mentions: Vec::new(),
            watchers: Vec::new(),
            created_at: None,
            scheduled_at: None,
            hashtags: Vec::new(),
            attachments: Vec::new(),
            status: None,
            source: default_source(),
        }
    }
}

/// An event with every classification field at its neutral default.
pub(crate) fn blank_event(
    id: String,
    title: String,
    creator: Participant,
    created_at: DateTime<Utc>,
    source: Source,
) -> Event {
    Event {
        id,
        created_at,
        scheduled_at: None,
        executed_at: None,
        last_modified: created_at,
        title,
        description: String::new(),
        content: String::new(),
        creator,
        recipients: Vec::new(),
        mentions: Vec::new(),
        watchers: Vec::new(),
        classification: Classification {
            event_type: EventType::Communication,
            sub_type: None,
            category: Category::Note,
            priority: Priority::Normal,
            urgency: Urgency::ThisWeek,
            sentiment: Sentiment::Neutral,
            business_impact: BusinessImpact::Medium,
        },
        channel: Channel {
            primary: Category::Note,
            address: None,
            delivery_status: Default::default(),
        },
        enrichment: Enrichment::default(),
        relationships: Relationships::default(),
        tracking: Tracking {
            view_count: 0,
            interaction_count: 0,
            responses: Vec::new(),
            engagement: Engagement {
                score: DEFAULT_ENGAGEMENT_SCORE,
                response_rate: None,
                time_to_response_minutes: None,
            },
        },
        insights: AiInsights {
            predicted_outcome: None,
            recommended_actions: Vec::new(),
            similar_events: Vec::new(),
            risk_score: DEFAULT_RISK_SCORE,
            opportunity_score: DEFAULT_OPPORTUNITY_SCORE,
            next_best_action: None,
        },
        workflow: Workflow {
            status: WorkflowStatus::Draft,
            stage: None,
            next_steps: Vec::new(),
            automation_rules: Vec::new(),
        },
        attachments: Vec::new(),
        system: SystemMeta {
            source,
            version: 1,
            archived: false,
            deleted: false,
            permissions: Permissions::default(),
            audit_trail: Vec::new(),
        },
    }
}

pub fn build_event(draft: EventDraft, now: DateTime<Utc>) -> Event {
    let id = draft
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = draft.created_at.unwrap_or(now);
    let mut creator = draft.creator;
    creator.role = ParticipantRole::Creator;

    let mut event = blank_event(id, draft.title, creator, created_at, draft.source);
    event.description = draft.description;
    event.content = draft.content;
    event.scheduled_at = draft.scheduled_at;
    event.classification.event_type = draft.event_type;
    event.classification.sub_type = draft.sub_type;
    event.classification.category = draft.category;
    event.channel.primary = draft.category;
    event.channel.delivery_status = draft
        .recipients
        .iter()
        .map(|r| (r.id.clone(), DeliveryStatus::Queued))
        .collect();
    event.recipients = draft.recipients;
    event.mentions = with_role(draft.mentions, ParticipantRole::Mention);
    event.watchers = with_role(draft.watchers, ParticipantRole::Watcher);
    event.attachments = draft.attachments;
    event.enrichment.hashtags = draft
        .hashtags
        .iter()
        .map(|t| t.trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    event.workflow.status = draft.status.unwrap_or(match draft.scheduled_at {
        Some(at) if at > now => WorkflowStatus::Scheduled,
        _ => WorkflowStatus::Draft,
    });

    classify(&mut event);
    event
}

fn with_role(mut people: Vec<Participant>, role: ParticipantRole) -> Vec<Participant> {
    for p in &mut people {
        p.role = role;
    }
    people
}

/// Full ingestion-time classification: sentiment, priority, urgency, derived
/// scores and impact, enrichment and recommendations.
pub fn classify(event: &mut Event) {
    let analysis = analyze(&event.analysis_text());
    event.classification.sentiment = analysis.sentiment;
    event.classification.priority = analysis.priority;
    event.classification.urgency = analysis.urgency;
    event.classification.business_impact = business_impact(&analysis);
    event.insights.risk_score = risk_score(&analysis);
    event.insights.opportunity_score = opportunity_score(&analysis);
    event.insights.predicted_outcome = predicted_outcome(analysis.sentiment);
    apply_enrichment(event, analysis);
    refresh_recommendations(event);
}

/// Classification for records that arrive already scored, such as legacy
/// imports: sentiment, urgency and enrichment come from the text, priority
/// only when `priority` is `None`. Risk, opportunity and engagement are kept.
pub fn enrich(event: &mut Event, priority: Option<Priority>) {
    let analysis = analyze(&event.analysis_text());
    event.classification.sentiment = analysis.sentiment;
    event.classification.urgency = analysis.urgency;
    event.classification.priority = priority.unwrap_or(analysis.priority);
    event.insights.predicted_outcome = predicted_outcome(analysis.sentiment);
    apply_enrichment(event, analysis);
    refresh_recommendations(event);
}

fn apply_enrichment(event: &mut Event, analysis: ContentAnalysis) {
    let enrichment = &mut event.enrichment;
    for tag in analysis.hashtags {
        if !enrichment.hashtags.contains(&tag) {
            enrichment.hashtags.push(tag);
        }
    }
    let mut topics = analysis.topics;
    for tag in &enrichment.hashtags {
        let tag = tag.to_lowercase();
        if !topics.contains(&tag) {
            topics.push(tag);
        }
    }
    enrichment.keywords = analysis.keywords;
    enrichment.entities = analysis.entities;
    enrichment.topics = topics;
    enrichment.language = analysis.language;
    enrichment.reading_time_minutes = Some(analysis.reading_time_minutes);
}

fn refresh_recommendations(event: &mut Event) {
    let recs = recommend(event);
    event.insights.next_best_action = recs.first().map(|r| r.title.clone());
    event.insights.recommended_actions = recs;
}

fn has_business_keyword(analysis: &ContentAnalysis) -> bool {
    analysis
        .keywords
        .iter()
        .any(|k| BUSINESS_WORDS.contains(&k.as_str()))
}

fn business_impact(analysis: &ContentAnalysis) -> BusinessImpact {
    let pressing = matches!(analysis.priority, Priority::Urgent | Priority::Critical);
    match (pressing, has_business_keyword(analysis)) {
        (true, true) => BusinessImpact::Critical,
        (true, false) => BusinessImpact::High,
        (false, true) => BusinessImpact::Medium,
        (false, false) => BusinessImpact::Low,
    }
}

fn risk_score(analysis: &ContentAnalysis) -> f64 {
    let sentiment = match analysis.sentiment {
        Sentiment::VeryNegative => 35.0,
        Sentiment::Negative => 15.0,
        _ => 0.0,
    };
    let urgency = match analysis.urgency {
        Urgency::Asap => 20.0,
        Urgency::Today => 10.0,
        _ => 0.0,
    };
    clamp_score(DEFAULT_RISK_SCORE + sentiment + urgency)
}

fn opportunity_score(analysis: &ContentAnalysis) -> f64 {
    let business = if has_business_keyword(analysis) {
        20.0
    } else {
        0.0
    };
    let sentiment = match analysis.sentiment {
        Sentiment::VeryPositive => 20.0,
        Sentiment::Positive => 10.0,
        Sentiment::Neutral => 0.0,
        Sentiment::Negative => -10.0,
        Sentiment::VeryNegative => -20.0,
    };
    clamp_score(DEFAULT_OPPORTUNITY_SCORE + business + sentiment)
}

fn predicted_outcome(sentiment: Sentiment) -> Option<String> {
    match sentiment {
        Sentiment::VeryPositive | Sentiment::Positive => {
            Some("Favourable outcome likely".to_string())
        }
        Sentiment::Negative | Sentiment::VeryNegative => {
            Some("At risk: dissatisfaction detected".to_string())
        }
        Sentiment::Neutral => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecommendationKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn draft_is_classified_at_ingestion() {
        let mut draft = EventDraft::new("Devis flotte", "c1", "Camille");
        draft.content = "Urgent : le client est mécontent, problème de retard. #flotte".to_string();
        draft.category = Category::Email;
        draft.recipients = vec![Recipient::pending("r1", "Romain")];
        let event = build_event(draft, now());

        assert_eq!(event.system.version, 1);
        assert_eq!(event.created_at, now());
        assert_eq!(event.classification.priority, Priority::Urgent);
        assert_eq!(event.classification.urgency, Urgency::Asap);
        assert_eq!(event.classification.sentiment, Sentiment::VeryNegative);
        assert_eq!(event.classification.business_impact, BusinessImpact::Critical);
        assert_eq!(event.insights.risk_score, 75.0);
        assert_eq!(event.insights.opportunity_score, 50.0);
        assert_eq!(event.enrichment.hashtags, vec!["flotte"]);
        assert!(event.enrichment.topics.contains(&"flotte".to_string()));
        assert_eq!(
            event.channel.delivery_status.get("r1"),
            Some(&DeliveryStatus::Queued)
        );
        let kinds: Vec<_> = event
            .insights
            .recommended_actions
            .iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::Escalation,
                RecommendationKind::Action,
                RecommendationKind::FollowUp
            ]
        );
        assert_eq!(
            event.insights.next_best_action.as_deref(),
            Some("Escalate to an account manager")
        );
    }

    #[test]
    fn future_schedule_marks_event_scheduled() {
        let mut draft = EventDraft::new("Rendez-vous", "c1", "Camille");
        draft.scheduled_at = Some(now() + chrono::Duration::days(2));
        assert_eq!(
            build_event(draft, now()).workflow.status,
            WorkflowStatus::Scheduled
        );
    }

    #[test]
    fn explicit_id_is_kept_and_blank_id_replaced() {
        let mut draft = EventDraft::new("A", "c1", "Camille");
        draft.id = Some("evt-1".to_string());
        assert_eq!(build_event(draft, now()).id, "evt-1");

        let mut draft = EventDraft::new("B", "c1", "Camille");
        draft.id = Some("  ".to_string());
        assert_eq!(build_event(draft, now()).id.len(), 36);
    }

    #[test]
    fn enrich_keeps_existing_scores() {
        let mut event = blank_event(
            "e1".to_string(),
            "Merci pour le devis".to_string(),
            Participant::creator("c1", "Camille", true),
            now(),
            Source::Legacy,
        );
        event.classification.priority = Priority::Low;
        enrich(&mut event, Some(Priority::Low));
        assert_eq!(event.classification.priority, Priority::Low);
        assert_eq!(event.insights.risk_score, DEFAULT_RISK_SCORE);
        assert_eq!(event.enrichment.keywords, vec!["merci", "devis"]);
        assert_eq!(event.insights.recommended_actions.len(), 1);
    }

    #[test]
    fn enrich_classifies_text_without_touching_scores() {
        let mut event = blank_event(
            "e2".to_string(),
            "Urgent: problème, retard, plainte".to_string(),
            Participant::creator("c1", "Camille", true),
            now(),
            Source::Legacy,
        );
        enrich(&mut event, None);
        assert_eq!(event.classification.sentiment, Sentiment::VeryNegative);
        assert_eq!(event.classification.urgency, Urgency::Asap);
        assert_eq!(event.classification.priority, Priority::Urgent);
        assert_eq!(event.insights.risk_score, DEFAULT_RISK_SCORE);
        assert_eq!(event.insights.opportunity_score, DEFAULT_OPPORTUNITY_SCORE);
        assert_eq!(event.tracking.engagement.score, DEFAULT_ENGAGEMENT_SCORE);

        enrich(&mut event, Some(Priority::Low));
        assert_eq!(event.classification.priority, Priority::Low);
        assert_eq!(event.classification.urgency, Urgency::Asap);
    }
}
