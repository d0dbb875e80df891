use crate::events::{BusinessImpact, Event};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

const TEMPORAL_SHARE_THRESHOLD: f64 = 0.30;
const TEMPORAL_CONFIDENCE: f64 = 0.85;
const NEGATIVE_SHARE_THRESHOLD: f64 = 0.20;
const BEHAVIORAL_CONFIDENCE: f64 = 0.78;

const PREDICTION_WINDOW_DAYS: i64 = 7;
const GROWTH_FACTOR: f64 = 1.1;
const RANGE_SPREAD: f64 = 0.2;
const VOLUME_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Temporal,
    Behavioral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInsight {
    pub kind: PatternKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub impact: BusinessImpact,
    /// Share of the analysed events backing this pattern, in [0, 1].
    pub share: f64,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Volume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInsight {
    pub kind: PredictionKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub horizon_days: u32,
    pub predicted_value: u64,
    pub range: (u64, u64),
    pub basis_daily_average: f64,
}

pub fn detect_patterns(events: &[&Event], now: DateTime<Utc>) -> Vec<PatternInsight> {
    let mut insights = Vec::new();
    if events.is_empty() {
        return insights;
    }
    let total = events.len() as f64;

    let mut by_hour = [0usize; 24];
    for event in events {
        by_hour[event.created_at.hour() as usize] += 1;
    }
    // first maximum wins, so ties resolve to the earliest hour
    let (peak_hour, peak_count) = by_hour
        .iter()
        .enumerate()
        .fold((0, 0), |best, (hour, &count)| {
            if count > best.1 { (hour, count) } else { best }
        });
    let peak_share = peak_count as f64 / total;
    if peak_share > TEMPORAL_SHARE_THRESHOLD {
        insights.push(PatternInsight {
            kind: PatternKind::Temporal,
            title: "Peak activity hour".to_string(),
            description: format!(
                "{:.0}% of events are created between {peak_hour:02}:00 and {peak_hour:02}:59",
                peak_share * 100.0
            ),
            confidence: TEMPORAL_CONFIDENCE,
            impact: BusinessImpact::Medium,
            share: peak_share,
            detected_at: now,
        });
    }

    let negative = events
        .iter()
        .filter(|e| e.classification.sentiment.is_negative())
        .count();
    let negative_share = negative as f64 / total;
    if negative_share > NEGATIVE_SHARE_THRESHOLD {
        insights.push(PatternInsight {
            kind: PatternKind::Behavioral,
            title: "Rising dissatisfaction".to_string(),
            description: format!(
                "{:.0}% of events carry a negative sentiment",
                negative_share * 100.0
            ),
            confidence: BEHAVIORAL_CONFIDENCE,
            impact: BusinessImpact::High,
            share: negative_share,
            detected_at: now,
        });
    }

    insights
}

/// Next-week volume projected from the trailing seven days ending at `now`.
pub fn generate_predictions(events: &[&Event], now: DateTime<Utc>) -> Vec<PredictionInsight> {
    let window_start = now - Duration::days(PREDICTION_WINDOW_DAYS);
    let recent = events
        .iter()
        .filter(|e| e.created_at >= window_start && e.created_at <= now)
        .count();
    let days = PREDICTION_WINDOW_DAYS as f64;
    let daily_average = recent as f64 / days;
    let projected = (daily_average * days * GROWTH_FACTOR).round();
    let low = (projected * (1.0 - RANGE_SPREAD)).round();
    let high = (projected * (1.0 + RANGE_SPREAD)).round();

    vec![PredictionInsight {
        kind: PredictionKind::Volume,
        title: "Expected volume next week".to_string(),
        description: format!(
            "About {projected} events expected over the next 7 days ({daily_average:.1}/day recently)"
        ),
        confidence: VOLUME_CONFIDENCE,
        horizon_days: PREDICTION_WINDOW_DAYS as u32,
        predicted_value: projected as u64,
        range: (low as u64, high as u64),
        basis_daily_average: daily_average,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Sentiment;
    use crate::ingest::{EventDraft, build_event};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap()
    }

    fn at(created_at: DateTime<Utc>) -> Event {
        let mut draft = EventDraft::new("Appel", "c1", "Camille");
        draft.created_at = Some(created_at);
        build_event(draft, now())
    }

    fn hours(created: &[u32]) -> Vec<Event> {
        created
            .iter()
            .map(|h| at(Utc.with_ymd_and_hms(2026, 3, 9, *h, 15, 0).unwrap()))
            .collect()
    }

    #[test]
    fn forty_percent_in_one_hour_is_a_temporal_pattern() {
        let events = hours(&[9, 9, 9, 9, 10, 11, 12, 13, 14, 15]);
        let refs: Vec<&Event> = events.iter().collect();
        let patterns = detect_patterns(&refs, now());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::Temporal);
        assert_eq!(patterns[0].confidence, 0.85);
        assert!(patterns[0].description.starts_with("40%"));
    }

    #[test]
    fn quarter_share_is_below_the_trigger() {
        let events = hours(&[9, 9, 10, 10, 11, 11, 12, 13]);
        let refs: Vec<&Event> = events.iter().collect();
        assert!(detect_patterns(&refs, now()).is_empty());
    }

    #[test]
    fn negative_share_above_a_fifth_is_behavioral() {
        let mut events = hours(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        events[0].classification.sentiment = Sentiment::Negative;
        events[1].classification.sentiment = Sentiment::VeryNegative;
        let refs: Vec<&Event> = events.iter().collect();
        assert!(detect_patterns(&refs, now()).is_empty());

        events[2].classification.sentiment = Sentiment::Negative;
        let refs: Vec<&Event> = events.iter().collect();
        let patterns = detect_patterns(&refs, now());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::Behavioral);
        assert_eq!(patterns[0].impact, BusinessImpact::High);
    }

    #[test]
    fn two_a_day_projects_fifteen() {
        let mut events = Vec::new();
        for day in 0..7 {
            for hour in [8, 16] {
                events.push(at(now() - Duration::days(day) - Duration::hours(hour)));
            }
        }
        events.push(at(now() - Duration::days(9)));
        let refs: Vec<&Event> = events.iter().collect();
        let predictions = generate_predictions(&refs, now());
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].predicted_value, 15);
        assert_eq!(predictions[0].range, (12, 18));
        assert_eq!(predictions[0].confidence, 0.75);
        assert_eq!(predictions[0].basis_daily_average, 2.0);
    }

    #[test]
    fn empty_set_predicts_zero() {
        let predictions = generate_predictions(&[], now());
        assert_eq!(predictions[0].predicted_value, 0);
        assert_eq!(predictions[0].range, (0, 0));
    }
}
