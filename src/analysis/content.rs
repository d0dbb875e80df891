//! Lexicon and pattern based content classification.
//!
//! Everything here is deterministic: the same text always yields the same
//! analysis, with no external calls.

use crate::events::{Entity, EntityType, Priority, Sentiment, Urgency};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const URGENT_WORDS: &[&str] = &[
    "urgent",
    "urgente",
    "urgence",
    "asap",
    "immédiat",
    "immédiatement",
    "immediately",
    "emergency",
];

pub const POSITIVE_WORDS: &[&str] = &[
    "merci",
    "thanks",
    "excellent",
    "parfait",
    "perfect",
    "super",
    "great",
    "satisfait",
    "satisfied",
    "happy",
    "ravi",
    "bravo",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "problème",
    "problem",
    "issue",
    "mécontent",
    "unhappy",
    "déçu",
    "disappointed",
    "plainte",
    "complaint",
    "retard",
    "delay",
    "inacceptable",
    "unacceptable",
    "annulation",
];

pub const BUSINESS_WORDS: &[&str] = &[
    "devis", "quote", "contrat", "contract", "facture", "invoice", "prix", "price", "budget",
    "commande", "order", "sinistre", "claim", "vente", "sale",
];

pub const TECHNICAL_WORDS: &[&str] = &[
    "bug",
    "erreur",
    "error",
    "panne",
    "breakdown",
    "api",
    "installation",
    "maintenance",
    "update",
    "système",
    "system",
];

const FRENCH_STOPWORDS: &[&str] = &[
    "le", "la", "les", "de", "des", "du", "et", "est", "un", "une", "pour", "avec", "nous",
    "vous", "je", "bonjour",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "and", "is", "are", "to", "of", "for", "with", "we", "you", "i", "hello", "please",
];

const WORDS_PER_MINUTE: usize = 200;

const EMAIL_CONFIDENCE: f64 = 0.95;
const PHONE_CONFIDENCE: f64 = 0.9;
const MONEY_CONFIDENCE: f64 = 0.85;

/// The named lexicons, in the order keywords and topics are reported.
pub const LEXICONS: &[(&str, &[&str])] = &[
    ("urgent", URGENT_WORDS),
    ("positive", POSITIVE_WORDS),
    ("negative", NEGATIVE_WORDS),
    ("business", BUSINESS_WORDS),
    ("technical", TECHNICAL_WORDS),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub sentiment: Sentiment,
    pub priority: Priority,
    pub urgency: Urgency,
    pub keywords: Vec<String>,
    pub entities: Vec<Entity>,
    pub topics: Vec<String>,
    pub hashtags: Vec<String>,
    pub language: Option<String>,
    pub reading_time_minutes: u32,
}

impl ContentAnalysis {
    pub fn has_keyword(&self, word: &str) -> bool {
        self.keywords.iter().any(|k| k == word)
    }
}

pub fn analyze(text: &str) -> ContentAnalysis {
    let lowered = text.to_lowercase();
    let words = tokenize(&lowered);

    let (priority, urgency) = classify_priority(&lowered, &words);
    let hashtags = extract_hashtags(text);

    let mut keywords = Vec::new();
    let mut topics = Vec::new();
    for (topic, lexicon) in LEXICONS {
        let hits = lexicon_hits(&words, lexicon);
        if !hits.is_empty() {
            topics.push((*topic).to_string());
        }
        for hit in hits {
            if !keywords.iter().any(|k| k == hit) {
                keywords.push(hit.to_string());
            }
        }
    }
    for tag in &hashtags {
        let tag = tag.to_lowercase();
        if !topics.contains(&tag) {
            topics.push(tag);
        }
    }

    ContentAnalysis {
        sentiment: classify_sentiment(&words),
        priority,
        urgency,
        keywords,
        entities: extract_entities(text),
        topics,
        hashtags,
        language: detect_language(&words),
        reading_time_minutes: reading_time_minutes(&words),
    }
}

fn tokenize(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Distinct lexicon words present in `words`, in lexicon order.
fn lexicon_hits<'a>(words: &[&str], lexicon: &[&'a str]) -> Vec<&'a str> {
    let present: BTreeSet<&str> = words.iter().copied().collect();
    lexicon
        .iter()
        .copied()
        .filter(|w| present.contains(w))
        .collect()
}

pub fn classify_sentiment(words: &[&str]) -> Sentiment {
    let positive = lexicon_hits(words, POSITIVE_WORDS).len();
    let negative = lexicon_hits(words, NEGATIVE_WORDS).len();
    if positive > negative {
        if positive > 2 {
            Sentiment::VeryPositive
        } else {
            Sentiment::Positive
        }
    } else if negative > positive {
        if negative > 2 {
            Sentiment::VeryNegative
        } else {
            Sentiment::Negative
        }
    } else {
        Sentiment::Neutral
    }
}

fn classify_priority(lowered: &str, words: &[&str]) -> (Priority, Urgency) {
    if !lexicon_hits(words, URGENT_WORDS).is_empty() {
        (Priority::Urgent, Urgency::Asap)
    } else if lowered.contains("important") {
        (Priority::High, Urgency::Today)
    } else {
        (Priority::Normal, Urgency::ThisWeek)
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b0[1-9](?:[ .-]?[0-9]{2}){4}\b").expect("valid phone regex"))
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[$€£] ?[0-9]+(?:[.,][0-9]{1,2})?|[0-9]+(?:[.,][0-9]{1,2})? ?(?:€|EUR|euros?)",
        )
        .expect("valid money regex")
    })
}

/// Emails, phone numbers and amounts, ordered by position. Offsets count
/// characters, not bytes.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let patterns = [
        (EntityType::Email, email_re(), EMAIL_CONFIDENCE),
        (EntityType::Phone, phone_re(), PHONE_CONFIDENCE),
        (EntityType::Money, money_re(), MONEY_CONFIDENCE),
    ];
    let mut entities = Vec::new();
    for (entity_type, re, confidence) in patterns {
        for m in re.find_iter(text) {
            let start = text[..m.start()].chars().count();
            entities.push(Entity {
                entity_type,
                value: m.as_str().to_string(),
                confidence,
                start,
                end: start + m.as_str().chars().count(),
            });
        }
    }
    entities.sort_by_key(|e| e.start);
    entities
}

/// `#token` occurrences, without the leading `#`, deduplicated in order.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let starts_tag = c == '#' && !prev.is_some_and(|p| p.is_alphanumeric() || p == '_');
        prev = Some(c);
        if !starts_tag {
            continue;
        }
        let begin = idx + c.len_utf8();
        let mut end = begin;
        while let Some(&(i, n)) = chars.peek() {
            if n.is_alphanumeric() || n == '_' {
                end = i + n.len_utf8();
                prev = Some(n);
                chars.next();
            } else {
                break;
            }
        }
        let tag = &text[begin..end];
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn detect_language(words: &[&str]) -> Option<String> {
    let french = words.iter().filter(|w| FRENCH_STOPWORDS.contains(w)).count();
    let english = words.iter().filter(|w| ENGLISH_STOPWORDS.contains(w)).count();
    if french > english {
        Some("fr".to_string())
    } else if english > french {
        Some("en".to_string())
    } else {
        None
    }
}

fn reading_time_minutes(words: &[&str]) -> u32 {
    words.len().div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_thresholds() {
        assert_eq!(
            analyze("Merci, excellent travail, parfait").sentiment,
            Sentiment::VeryPositive
        );
        assert_eq!(analyze("merci pour le retour").sentiment, Sentiment::Positive);
        assert_eq!(
            analyze("merci mais il y a un problème").sentiment,
            Sentiment::Neutral
        );
        assert_eq!(analyze("rien à signaler").sentiment, Sentiment::Neutral);
        assert_eq!(
            analyze("problème, retard et plainte du client").sentiment,
            Sentiment::VeryNegative
        );
    }

    #[test]
    fn repeated_word_counts_once() {
        assert_eq!(
            analyze("merci merci merci").sentiment,
            Sentiment::Positive
        );
    }

    #[test]
    fn urgent_wins_over_important() {
        let a = analyze("Important et URGENT : merci de rappeler");
        assert_eq!(a.priority, Priority::Urgent);
        assert_eq!(a.urgency, Urgency::Asap);

        let b = analyze("This is important");
        assert_eq!(b.priority, Priority::High);

        let c = analyze("weekly sync");
        assert_eq!(c.priority, Priority::Normal);
        assert_eq!(c.urgency, Urgency::ThisWeek);
    }

    #[test]
    fn extracts_entities_with_char_offsets() {
        let text = "Écrire à jean@exemple.fr ou 06 12 34 56 78, devis 1500 €";
        let entities = extract_entities(text);
        let kinds: Vec<_> = entities.iter().map(|e| e.entity_type).collect();
        assert_eq!(
            kinds,
            vec![EntityType::Email, EntityType::Phone, EntityType::Money]
        );
        assert_eq!(entities[0].value, "jean@exemple.fr");
        assert_eq!(entities[0].start, 9);
        assert_eq!(entities[0].end, 24);
        assert_eq!(entities[1].value, "06 12 34 56 78");
        assert_eq!(entities[2].value, "1500 €");
        assert_eq!(entities[2].confidence, MONEY_CONFIDENCE);
    }

    #[test]
    fn keywords_and_topics_follow_lexicon_order() {
        let a = analyze("Urgent: le devis a un bug, merci #Renouvellement #devis");
        assert_eq!(a.keywords, vec!["urgent", "merci", "devis", "bug"]);
        assert_eq!(
            a.topics,
            vec![
                "urgent",
                "positive",
                "business",
                "technical",
                "renouvellement",
                "devis"
            ]
        );
        assert_eq!(a.hashtags, vec!["Renouvellement", "devis"]);
    }

    #[test]
    fn hashtags_need_a_word_boundary() {
        assert_eq!(extract_hashtags("issue#12 #ok #ok"), vec!["ok"]);
        assert!(extract_hashtags("# alone").is_empty());
    }

    #[test]
    fn language_and_reading_time() {
        let fr = analyze("Bonjour, nous avons reçu la facture pour le contrat");
        assert_eq!(fr.language.as_deref(), Some("fr"));
        assert_eq!(fr.reading_time_minutes, 1);
        let en = analyze("Hello, we are sending the invoice for the contract");
        assert_eq!(en.language.as_deref(), Some("en"));
    }
}
