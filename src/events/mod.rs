pub mod legacy;
pub mod model;
pub mod schema;
pub mod store;

pub use model::{
    AiInsights, Attachment, AuditEntry, BusinessImpact, Category, Channel, Classification,
    DeliveryStatus, Engagement, Enrichment, Entity, EntityType, Event, EventType, Participant,
    ParticipantRole, Permissions, Priority, Recipient, Recommendation, RecommendationKind,
    Relationships, Response, ResponseStatus, Sentiment, Source, SystemMeta, Tracking, Urgency,
    Visibility, Workflow, WorkflowStatus,
};
pub use store::{BlobStore, EventStore, MemoryBlobStore, SqliteBlobStore};
