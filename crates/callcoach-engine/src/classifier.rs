//! Lexical signal extraction from displayed conversation turns.
//!
//! Reads only the most recent prospect utterance and reduces it to a
//! [`Signal`]: reaction, objection category, end-call intent, and whether an
//! ongoing objection looks resolved.

use callcoach_core::{Category, Mode, Reaction, Signal, Speaker, Turn};

/// Placeholder confidence reported by the lexical classifier.
pub const LEXICAL_CONFIDENCE: f32 = 0.55;

/// Phrases that mean the prospect wants the call to stop.
pub const END_INTENT_PHRASES: &[&str] = &[
    "stop calling",
    "don't call me",
    "do not call me",
    "remove me",
    "take me off",
    "unsubscribe",
    "end the call",
    "hang up",
    "not interested",
    "leave me alone",
];

pub const POSITIVE_PHRASES: &[&str] = &[
    "sounds good",
    "that works",
    "ok",
    "okay",
    "yes",
    "yeah",
    "sure",
    "great",
    "perfect",
];

pub const NEGATIVE_PHRASES: &[&str] = &[
    "no",
    "not really",
    "don't",
    "do not",
    "can't",
    "cannot",
    "won't",
    "will not",
    "too expensive",
    "too much",
    "not interested",
];

/// Words that mean an objection is still standing.
pub const NEGATION_CONTINUATION: &[&str] = &["still", "no", "not", "doesn't", "does not"];

/// Keywords per category, checked in [`Category::ALL`] order.
pub fn category_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Price => &["price", "expensive", "too much", "cost", "afford"],
        Category::Timing => &["not now", "later", "timing", "wait", "next month", "next year"],
        Category::Spouse => &["spouse", "husband", "wife", "partner", "talk to", "ask my"],
        Category::Trust => &["scam", "trust", "not sure", "skeptical", "legit", "legitimate"],
        Category::AlreadyWorkingWithAgent => {
            &["already have an agent", "my agent", "realtor", "broker"]
        }
        Category::NotInterested => &["not interested", "no thanks", "stop", "leave me alone"],
    }
}

/// Source of per-cycle signals for the decision engine.
///
/// Implementations must be pure: the same inputs always yield the same
/// signal, and nothing outside the return value is touched.
pub trait SignalExtractor: Send + Sync {
    fn classify(
        &self,
        displayed_turns: &[Turn],
        current_prompt_id: Option<&str>,
        mode: Mode,
    ) -> Signal;
}

/// Keyword-matching classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalClassifier;

impl LexicalClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignalExtractor for LexicalClassifier {
    fn classify(
        &self,
        displayed_turns: &[Turn],
        current_prompt_id: Option<&str>,
        mode: Mode,
    ) -> Signal {
        let Some(turn) = last_prospect_turn(displayed_turns) else {
            tracing::trace!(?current_prompt_id, %mode, "No prospect turn displayed");
            return Signal {
                confidence: LEXICAL_CONFIDENCE,
                ..Signal::default()
            };
        };

        let text = normalize(&turn.text);

        let end_intent = contains_any(&text, END_INTENT_PHRASES);
        let objection_category = detect_category(&text);

        let mut reaction = Reaction::Neutral;
        if contains_any(&text, POSITIVE_PHRASES) {
            reaction = Reaction::Positive;
        }
        if contains_any(&text, NEGATIVE_PHRASES) {
            reaction = Reaction::Negative;
        }
        if end_intent {
            reaction = Reaction::Negative;
        }

        let objection_resolved = mode == Mode::Objection && detect_resolution(&text);

        tracing::trace!(
            ?current_prompt_id,
            %mode,
            ?reaction,
            ?objection_category,
            end_intent,
            objection_resolved,
            "Classified prospect turn"
        );

        Signal {
            reaction,
            objection_category,
            end_intent,
            objection_resolved,
            confidence: LEXICAL_CONFIDENCE,
        }
    }
}

/// The prospect turn with the greatest timestamp; later position wins ties.
pub fn last_prospect_turn(turns: &[Turn]) -> Option<&Turn> {
    turns
        .iter()
        .enumerate()
        .filter(|(_, t)| t.speaker == Speaker::Prospect)
        .max_by_key(|(i, t)| (t.timestamp, *i))
        .map(|(_, t)| t)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn detect_category(text: &str) -> Option<Category> {
    Category::ALL
        .into_iter()
        .find(|c| contains_any(text, category_keywords(*c)))
}

// Ambiguous replies count as unresolved.
fn detect_resolution(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if contains_any(text, POSITIVE_PHRASES) {
        return true;
    }
    if contains_any(text, NEGATION_CONTINUATION) {
        return false;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str, mode: Mode) -> Signal {
        let turns = vec![Turn::agent(1, "So, what do you think?"), Turn::prospect(2, text)];
        LexicalClassifier::new().classify(&turns, Some("S1Q1"), mode)
    }

    // =====================================================================
    // Turn selection
    // =====================================================================

    #[test]
    fn test_empty_turns_are_neutral() {
        let signal = LexicalClassifier::new().classify(&[], None, Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Neutral);
        assert_eq!(signal.objection_category, None);
        assert!(!signal.end_intent);
        assert!(!signal.objection_resolved);
        assert!((signal.confidence - LEXICAL_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_agent_only_turns_are_neutral() {
        let turns = vec![Turn::agent(1, "no no no, too expensive")];
        let signal = LexicalClassifier::new().classify(&turns, None, Mode::Objection);
        assert_eq!(signal.reaction, Reaction::Neutral);
        assert!(!signal.objection_resolved);
    }

    #[test]
    fn test_latest_timestamp_wins_over_position() {
        let turns = vec![
            Turn::prospect(50, "too expensive"),
            Turn::prospect(10, "sounds good"),
        ];
        let picked = last_prospect_turn(&turns).unwrap();
        assert_eq!(picked.text, "too expensive");
    }

    #[test]
    fn test_equal_timestamps_prefer_later_position() {
        let turns = vec![Turn::prospect(0, "first"), Turn::prospect(0, "second")];
        assert_eq!(last_prospect_turn(&turns).unwrap().text, "second");
    }

    #[test]
    fn test_agent_turn_after_prospect_is_ignored() {
        let turns = vec![Turn::prospect(1, "sure"), Turn::agent(2, "no problem at all")];
        let signal = LexicalClassifier::new().classify(&turns, None, Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Positive);
    }

    // =====================================================================
    // Reaction and category
    // =====================================================================

    #[test]
    fn test_too_expensive_is_negative_price() {
        let signal = classify("too expensive", Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Negative);
        assert_eq!(signal.objection_category, Some(Category::Price));
        assert!(!signal.end_intent);
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let signal = classify("   TOO Expensive   ", Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Negative);
        assert_eq!(signal.objection_category, Some(Category::Price));
    }

    #[test]
    fn test_positive_phrase() {
        let signal = classify("Yeah, that works for me", Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Positive);
        assert_eq!(signal.objection_category, None);
    }

    #[test]
    fn test_negative_overrides_positive() {
        let signal = classify("yes but I can't do that", Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Negative);
    }

    #[test]
    fn test_no_match_is_neutral() {
        let signal = classify("we moved here in 2019", Mode::KeyQuestion);
        assert_eq!(signal.reaction, Reaction::Neutral);
        assert_eq!(signal.objection_category, None);
    }

    #[test]
    fn test_category_priority_order() {
        // Both price ("cost") and timing ("later") match; price comes first.
        let signal = classify("the cost is fine but maybe later", Mode::KeyQuestion);
        assert_eq!(signal.objection_category, Some(Category::Price));
    }

    #[test]
    fn test_each_category_detected() {
        let cases = [
            ("can we afford it", Category::Price),
            ("maybe next year", Category::Timing),
            ("I need to ask my wife", Category::Spouse),
            ("is this a scam", Category::Trust),
            ("we already have an agent", Category::AlreadyWorkingWithAgent),
            ("no thanks", Category::NotInterested),
        ];
        for (text, expected) in cases {
            assert_eq!(
                classify(text, Mode::KeyQuestion).objection_category,
                Some(expected),
                "text: {}",
                text
            );
        }
    }

    // =====================================================================
    // End intent
    // =====================================================================

    #[test]
    fn test_end_intent_forces_negative() {
        let signal = classify("stop calling me, not interested", Mode::KeyQuestion);
        assert!(signal.end_intent);
        assert_eq!(signal.reaction, Reaction::Negative);
        assert_eq!(signal.objection_category, Some(Category::NotInterested));
    }

    #[test]
    fn test_end_intent_overrides_positive_language() {
        let signal = classify("sure, just unsubscribe", Mode::KeyQuestion);
        assert!(signal.end_intent);
        assert_eq!(signal.reaction, Reaction::Negative);
    }

    // =====================================================================
    // Objection resolution
    // =====================================================================

    #[test]
    fn test_resolution_only_in_objection_mode() {
        assert!(!classify("okay, sounds good", Mode::KeyQuestion).objection_resolved);
        assert!(classify("okay, sounds good", Mode::Objection).objection_resolved);
    }

    #[test]
    fn test_negation_continuation_is_unresolved() {
        assert!(!classify("it's still too much", Mode::Objection).objection_resolved);
        assert!(!classify("that doesn't help", Mode::Objection).objection_resolved);
    }

    #[test]
    fn test_ambiguous_reply_is_unresolved() {
        assert!(!classify("hmm, let me think", Mode::Objection).objection_resolved);
    }

    #[test]
    fn test_resolution_absent_without_prospect_turn() {
        let turns = vec![Turn::agent(1, "okay?")];
        let signal = LexicalClassifier::new().classify(&turns, None, Mode::Objection);
        assert!(!signal.objection_resolved);
    }

    #[test]
    fn test_classify_is_pure() {
        let turns = vec![Turn::prospect(1, "too expensive")];
        let classifier = LexicalClassifier::new();
        let a = classifier.classify(&turns, Some("S1Q1"), Mode::Objection);
        let b = classifier.classify(&turns, Some("S1Q1"), Mode::Objection);
        assert_eq!(a, b);
    }
}
