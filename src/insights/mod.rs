pub mod analytics;
pub mod patterns;

pub use analytics::{AnalyticsReport, AnalyticsWindow, analytics};
pub use patterns::{PatternInsight, PredictionInsight, detect_patterns, generate_predictions};
