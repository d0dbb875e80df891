use crate::events::Event;
use serde::Serialize;

pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

const OCCURRENCE_POINTS: u32 = 10;
const TITLE_BONUS: u32 = 20;
const HASHTAG_BONUS: u32 = 15;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<'a> {
    pub event: &'a Event,
    pub score: u32,
}

/// Lowercased whitespace tokens with at least `min_len` characters. Both
/// search modes share this rule.
pub fn query_tokens(query: &str, min_len: usize) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() >= min_len)
        .map(ToString::to_string)
        .collect()
}

fn corpus(event: &Event) -> String {
    let mut parts = vec![
        event.title.as_str(),
        event.description.as_str(),
        event.content.as_str(),
    ];
    let enrichment = &event.enrichment;
    parts.extend(enrichment.keywords.iter().map(String::as_str));
    parts.extend(enrichment.hashtags.iter().map(String::as_str));
    parts.extend(enrichment.topics.iter().map(String::as_str));
    parts.join(" ").to_lowercase()
}

pub fn relevance(event: &Event, tokens: &[String]) -> u32 {
    let corpus = corpus(event);
    let title = event.title.to_lowercase();
    let hashtags: Vec<String> = event
        .enrichment
        .hashtags
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    tokens
        .iter()
        .map(|token| {
            let mut score = corpus.matches(token.as_str()).count() as u32 * OCCURRENCE_POINTS;
            if title.contains(token.as_str()) {
                score += TITLE_BONUS;
            }
            if hashtags.iter().any(|t| t.contains(token.as_str())) {
                score += HASHTAG_BONUS;
            }
            score
        })
        .sum()
}

/// Events with a nonzero relevance for `query`, best first. Ties keep the
/// candidates' order.
pub fn semantic_search<'a>(
    query: &str,
    candidates: impl IntoIterator<Item = &'a Event>,
    min_token_len: usize,
) -> Vec<SearchHit<'a>> {
    let tokens = query_tokens(query, min_token_len);
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<SearchHit<'a>> = candidates
        .into_iter()
        .map(|event| SearchHit {
            event,
            score: relevance(event, &tokens),
        })
        .filter(|hit| hit.score > 0)
        .collect();
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

fn haystack(event: &Event) -> String {
    let c = &event.classification;
    let mut parts: Vec<&str> = vec![
        event.title.as_str(),
        event.description.as_str(),
        event.content.as_str(),
        event.creator.id.as_str(),
        event.creator.name.as_str(),
        c.event_type.as_str(),
        c.category.as_str(),
        c.priority.as_str(),
        c.sentiment.as_str(),
    ];
    let enrichment = &event.enrichment;
    parts.extend(enrichment.keywords.iter().map(String::as_str));
    parts.extend(enrichment.hashtags.iter().map(String::as_str));
    parts.extend(enrichment.topics.iter().map(String::as_str));
    for r in &event.recipients {
        parts.push(r.id.as_str());
        parts.push(r.name.as_str());
    }
    parts.join("\n").to_lowercase()
}

/// Literal substring search: an event matches when every query token occurs
/// somewhere in its searchable fields. No relevance ordering is applied.
pub fn classic_search<'a>(
    query: &str,
    candidates: impl IntoIterator<Item = &'a Event>,
    min_token_len: usize,
) -> Vec<&'a Event> {
    let tokens = query_tokens(query, min_token_len);
    candidates
        .into_iter()
        .filter(|event| {
            let text = haystack(event);
            tokens.iter().all(|t| text.contains(t.as_str()))
        })
        .collect()
}
