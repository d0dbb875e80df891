use crate::events::{Event, Priority, Recommendation, RecommendationKind, Sentiment, Urgency};

pub struct RecommendationTemplate {
    pub kind: RecommendationKind,
    pub title: &'static str,
    pub description: &'static str,
    pub confidence: f64,
    pub priority: Priority,
    pub estimated_impact: &'static str,
}

pub struct RecommendationRule {
    pub id: &'static str,
    pub applies: fn(&Event) -> bool,
    pub template: RecommendationTemplate,
}

fn very_negative(event: &Event) -> bool {
    event.classification.sentiment == Sentiment::VeryNegative
}

fn needs_action_now(event: &Event) -> bool {
    event.classification.urgency == Urgency::Asap
}

fn mentions_quote(event: &Event) -> bool {
    event
        .enrichment
        .keywords
        .iter()
        .any(|k| k == "devis" || k == "quote")
}

/// Evaluated top to bottom; output keeps this order.
pub const RULES: &[RecommendationRule] = &[
    RecommendationRule {
        id: "escalate-negative",
        applies: very_negative,
        template: RecommendationTemplate {
            kind: RecommendationKind::Escalation,
            title: "Escalate to an account manager",
            description: "The contact is strongly dissatisfied; hand over to a senior owner.",
            confidence: 0.95,
            priority: Priority::Urgent,
            estimated_impact: "Reduces churn risk on this relationship",
        },
    },
    RecommendationRule {
        id: "act-now",
        applies: needs_action_now,
        template: RecommendationTemplate {
            kind: RecommendationKind::Action,
            title: "Handle immediately",
            description: "The message asks for an immediate answer; respond today.",
            confidence: 0.88,
            priority: Priority::High,
            estimated_impact: "Keeps response time within expectations",
        },
    },
    RecommendationRule {
        id: "follow-up-quote",
        applies: mentions_quote,
        template: RecommendationTemplate {
            kind: RecommendationKind::FollowUp,
            title: "Follow up on the quote",
            description: "A quote was discussed; schedule a follow-up to close it.",
            confidence: 0.82,
            priority: Priority::Normal,
            estimated_impact: "Improves quote conversion",
        },
    },
];

pub fn recommend(event: &Event) -> Vec<Recommendation> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(event))
        .map(|rule| Recommendation {
            id: format!("{}-{}", event.id, rule.id),
            kind: rule.template.kind,
            title: rule.template.title.to_string(),
            description: rule.template.description.to_string(),
            confidence: rule.template.confidence,
            priority: rule.template.priority,
            estimated_impact: rule.template.estimated_impact.to_string(),
        })
        .collect()
}
