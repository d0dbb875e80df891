use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Communication,
    Sales,
    Support,
    Marketing,
    Operations,
    Administrative,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::Sales => "sales",
            Self::Support => "support",
            Self::Marketing => "marketing",
            Self::Operations => "operations",
            Self::Administrative => "administrative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Email,
    Sms,
    Whatsapp,
    Call,
    Meeting,
    VideoCall,
    InPerson,
    Note,
    Task,
    Document,
    Chat,
    SocialMedia,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
            Self::Call => "call",
            Self::Meeting => "meeting",
            Self::VideoCall => "video_call",
            Self::InPerson => "in_person",
            Self::Note => "note",
            Self::Task => "task",
            Self::Document => "document",
            Self::Chat => "chat",
            Self::SocialMedia => "social_media",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
    Critical,
}

impl Priority {
    /// Ordinal used for sorting: low < normal < high < urgent < critical.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
            Self::Urgent => 4,
            Self::Critical => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    CanWait,
    ThisWeek,
    Today,
    Asap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl Sentiment {
    pub fn is_negative(self) -> bool {
        matches!(self, Self::Negative | Self::VeryNegative)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryNegative => "very_negative",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
            Self::VeryPositive => "very_positive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessImpact {
    Low,
    Medium,
    High,
    Critical,
}

/// Recipient progression. Declaration order is the only allowed direction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Pending,
    Delivered,
    Read,
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::OnHold => "on_hold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Manual,
    ChannelSync,
    Legacy,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Team,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    #[default]
    Creator,
    Recipient,
    Mention,
    Watcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Email,
    Phone,
    Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default)]
    pub is_internal: bool,
}

impl Participant {
    pub fn creator(id: impl Into<String>, name: impl Into<String>, is_internal: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: ParticipantRole::Creator,
            is_internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

impl Recipient {
    pub fn pending(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_internal: false,
            response_status: ResponseStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub event_type: EventType,
    #[serde(default)]
    pub sub_type: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub urgency: Urgency,
    pub sentiment: Sentiment,
    pub business_impact: BusinessImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub primary: Category,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub delivery_status: BTreeMap<String, DeliveryStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub value: String,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Enrichment {
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub reading_time_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Relationships {
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub trigger_chain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub participant_id: String,
    pub response_type: String,
    pub content: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub score: f64,
    /// Share of recipients who responded, as a percentage.
    #[serde(default)]
    pub response_rate: Option<f64>,
    #[serde(default)]
    pub time_to_response_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub responses: Vec<Response>,
    pub engagement: Engagement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Escalation,
    Action,
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub priority: Priority,
    pub estimated_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    #[serde(default)]
    pub predicted_outcome: Option<String>,
    #[serde(default)]
    pub recommended_actions: Vec<Recommendation>,
    #[serde(default)]
    pub similar_events: Vec<String>,
    pub risk_score: f64,
    pub opportunity_score: f64,
    #[serde(default)]
    pub next_best_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub status: WorkflowStatus,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub automation_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    pub visibility: Visibility,
    #[serde(default)]
    pub can_view: Vec<String>,
    #[serde(default)]
    pub can_edit: Vec<String>,
    #[serde(default)]
    pub can_delete: Vec<String>,
    #[serde(default)]
    pub can_share: Vec<String>,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            visibility: Visibility::Team,
            can_view: Vec::new(),
            can_edit: Vec::new(),
            can_delete: Vec::new(),
            can_share: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMeta {
    pub source: Source,
    pub version: u64,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,

    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,

    pub creator: Participant,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub mentions: Vec<Participant>,
    #[serde(default)]
    pub watchers: Vec<Participant>,

    pub classification: Classification,
    pub channel: Channel,
    #[serde(default)]
    pub enrichment: Enrichment,
    #[serde(default)]
    pub relationships: Relationships,
    pub tracking: Tracking,
    pub insights: AiInsights,
    pub workflow: Workflow,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub system: SystemMeta,
}

impl Event {
    /// The text the content analyzer reads: title, description and body.
    pub fn analysis_text(&self) -> String {
        [
            self.title.as_str(),
            self.description.as_str(),
            self.content.as_str(),
        ]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }

    pub fn time_to_response(&self) -> Option<f64> {
        self.tracking.engagement.time_to_response_minutes
    }

    /// Clamp every bounded score into its range.
    pub fn normalize(&mut self) {
        let engagement = &mut self.tracking.engagement;
        engagement.score = clamp_score(engagement.score);
        engagement.response_rate = engagement.response_rate.map(clamp_score);
        engagement.time_to_response_minutes = engagement
            .time_to_response_minutes
            .map(|m| if m.is_nan() { 0.0 } else { m.max(0.0) });
        self.insights.risk_score = clamp_score(self.insights.risk_score);
        self.insights.opportunity_score = clamp_score(self.insights.opportunity_score);
        for entity in &mut self.enrichment.entities {
            entity.confidence = clamp_confidence(entity.confidence);
        }
        for rec in &mut self.insights.recommended_actions {
            rec.confidence = clamp_confidence(rec.confidence);
        }
    }

    /// Move a recipient forward through pending, delivered, read, responded.
    pub fn advance_recipient(
        &mut self,
        participant_id: &str,
        status: ResponseStatus,
    ) -> EngineResult<()> {
        let recipient = self
            .recipients
            .iter_mut()
            .find(|r| r.id == participant_id)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "event '{}' has no recipient '{participant_id}'",
                    self.id
                ))
            })?;
        if status < recipient.response_status {
            return Err(EngineError::validation(format!(
                "recipient '{participant_id}' cannot move from {:?} back to {:?}",
                recipient.response_status, status
            )));
        }
        recipient.response_status = status;
        Ok(())
    }

    /// Rejects `next` when any recipient shared with `self` moved backwards.
    pub fn check_recipient_progress(&self, next: &Event) -> EngineResult<()> {
        for after in &next.recipients {
            if let Some(before) = self.recipients.iter().find(|r| r.id == after.id)
                && after.response_status < before.response_status
            {
                return Err(EngineError::validation(format!(
                    "event '{}': recipient '{}' cannot move from {:?} back to {:?}",
                    self.id, after.id, before.response_status, after.response_status
                )));
            }
        }
        Ok(())
    }

    /// Percentage of recipients who have responded, `None` without recipients.
    pub fn recipient_response_rate(&self) -> Option<f64> {
        if self.recipients.is_empty() {
            return None;
        }
        let responded = self
            .recipients
            .iter()
            .filter(|r| r.response_status == ResponseStatus::Responded)
            .count();
        Some(responded as f64 / self.recipients.len() as f64 * 100.0)
    }
}
