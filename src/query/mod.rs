pub mod filter;
pub mod search;

use crate::error::{EngineError, EngineResult};
use crate::events::{Category, EventType, Priority, Sentiment};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use filter::{filter_events, sort_events, sort_key};
pub use search::{SearchHit, classic_search, semantic_search};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeWindow {
    Absolute {
        #[serde(default)]
        start: Option<DateTime<Utc>>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
    /// "The past `amount` `unit`s", ending at the evaluation time.
    Relative { amount: u32, unit: RelativeUnit },
}

impl TimeWindow {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Absolute {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Self::Absolute {
                start: Some(start),
                end: Some(end),
            } if start > end => Err(EngineError::validation(format!(
                "time window start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            ))),
            Self::Relative { amount: 0, .. } => Err(EngineError::validation(
                "relative time window needs a positive amount",
            )),
            _ => Ok(()),
        }
    }

    /// Inclusive creation-time bounds for this window evaluated at `now`.
    pub fn bounds(
        &self,
        now: DateTime<Utc>,
    ) -> EngineResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        self.validate()?;
        match *self {
            Self::Absolute { start, end } => Ok((start, end)),
            Self::Relative { amount, unit } => {
                let start = match unit {
                    RelativeUnit::Hours => Duration::try_hours(amount.into())
                        .and_then(|span| now.checked_sub_signed(span)),
                    RelativeUnit::Days => Duration::try_days(amount.into())
                        .and_then(|span| now.checked_sub_signed(span)),
                    RelativeUnit::Weeks => Duration::try_weeks(amount.into())
                        .and_then(|span| now.checked_sub_signed(span)),
                    RelativeUnit::Months => now.checked_sub_months(Months::new(amount)),
                    RelativeUnit::Years => amount
                        .checked_mul(12)
                        .and_then(|m| now.checked_sub_months(Months::new(m))),
                }
                .ok_or_else(|| {
                    EngineError::validation(format!(
                        "relative window of {amount} {unit:?} overflows"
                    ))
                })?;
                Ok((Some(start), Some(now)))
            }
        }
    }
}

impl FromStr for TimeWindow {
    type Err = EngineError;

    /// Shorthand relative windows: `24h`, `7d`, `2w`, `3m`, `1y`.
    fn from_str(raw: &str) -> EngineResult<Self> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| EngineError::validation(format!("missing unit in window '{raw}'")))?;
        let (digits, suffix) = raw.split_at(split);
        let amount: u32 = digits
            .parse()
            .map_err(|_| EngineError::validation(format!("invalid amount in window '{raw}'")))?;
        let unit = match suffix {
            "h" => RelativeUnit::Hours,
            "d" => RelativeUnit::Days,
            "w" => RelativeUnit::Weeks,
            "m" => RelativeUnit::Months,
            "y" => RelativeUnit::Years,
            other => {
                return Err(EngineError::validation(format!(
                    "unknown window unit '{other}' (expected h, d, w, m or y)"
                )));
            }
        };
        let window = Self::Relative { amount, unit };
        window.validate()?;
        Ok(window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParticipantFilter {
    pub creators: Vec<String>,
    pub recipients: Vec<String>,
}

/// One membership group: an event matches when its type, category, priority
/// or sentiment is listed. The lists are ORed with each other, so
/// `categories = [email]` with `priorities = [urgent]` also admits an urgent
/// call. Combine with another group, or run two queries, for an AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationFilter {
    pub types: Vec<EventType>,
    pub categories: Vec<Category>,
    pub priorities: Vec<Priority>,
    pub sentiments: Vec<Sentiment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentFilter {
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    ScheduledAt,
    ExecutedAt,
    Priority,
    EngagementScore,
    RiskScore,
    OpportunityScore,
    ViewCount,
    TimeToResponse,
}

impl FromStr for SortField {
    type Err = EngineError;

    fn from_str(raw: &str) -> EngineResult<Self> {
        match raw.trim() {
            "created_at" => Ok(Self::CreatedAt),
            "scheduled_at" => Ok(Self::ScheduledAt),
            "executed_at" => Ok(Self::ExecutedAt),
            "priority" => Ok(Self::Priority),
            "engagement_score" => Ok(Self::EngagementScore),
            "risk_score" => Ok(Self::RiskScore),
            "opportunity_score" => Ok(Self::OpportunityScore),
            "view_count" => Ok(Self::ViewCount),
            "time_to_response" => Ok(Self::TimeToResponse),
            other => Err(EngineError::validation(format!("unknown sort field '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortDirective {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A filter/sort request. Every group is optional; an empty group imposes
/// no restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventQuery {
    pub time: Option<TimeWindow>,
    pub participants: ParticipantFilter,
    pub classification: ClassificationFilter,
    pub content: ContentFilter,
    pub sort: Option<SortDirective>,
}

impl EventQuery {
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let query: Self = serde_json::from_str(raw)
            .map_err(|e| EngineError::validation(format!("invalid query: {e}")))?;
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(window) = &self.time {
            window.validate()?;
        }
        Ok(())
    }

    pub fn sorted_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = Some(SortDirective { field, direction });
        self
    }
}
