use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Wire form of a timestamp: clients may send fractional milliseconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum Millis {
    Integral(i64),
    Fractional(f64),
}

impl From<Millis> for Timestamp {
    fn from(value: Millis) -> Self {
        match value {
            Millis::Integral(ms) => ms,
            // `as` saturates out-of-range floats.
            Millis::Fractional(ms) => ms.trunc() as i64,
        }
    }
}

/// Deserialize epoch milliseconds, truncating any fractional part.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    Millis::deserialize(deserializer).map(Timestamp::from)
}

/// Optional form of [`deserialize_timestamp`].
pub fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Millis>::deserialize(deserializer)?.map(Timestamp::from))
}

// =============================================================================
// Enums
// =============================================================================

/// Who said a given utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human agent running the call.
    Agent,
    /// The other party on the call.
    Prospect,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Agent => write!(f, "agent"),
            Speaker::Prospect => write!(f, "prospect"),
        }
    }
}

impl FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agent" => Ok(Speaker::Agent),
            "prospect" => Ok(Speaker::Prospect),
            other => Err(format!("unknown speaker '{}'", other)),
        }
    }
}

/// Conversational posture of a call session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Walking the scripted key questions.
    #[default]
    KeyQuestion,
    /// Handling an objection with rebuttal lines.
    Objection,
    /// The agent should wrap up the call. Terminal.
    EndCall,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::KeyQuestion => write!(f, "key_question"),
            Mode::Objection => write!(f, "objection"),
            Mode::EndCall => write!(f, "end_call"),
        }
    }
}

/// Objection category, listed in detection priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Price,
    Timing,
    Spouse,
    Trust,
    AlreadyWorkingWithAgent,
    NotInterested,
}

impl Category {
    /// All categories in the order the classifier checks them.
    pub const ALL: [Category; 6] = [
        Category::Price,
        Category::Timing,
        Category::Spouse,
        Category::Trust,
        Category::AlreadyWorkingWithAgent,
        Category::NotInterested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Price => "price",
            Category::Timing => "timing",
            Category::Spouse => "spouse",
            Category::Trust => "trust",
            Category::AlreadyWorkingWithAgent => "already_working_with_agent",
            Category::NotInterested => "not_interested",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic read of the prospect's last utterance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Why the engine told the agent to end the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The prospect asked to end the call on two counted cycles.
    ProspectEndIntentTwice,
    /// Three consecutive objection cycles went unresolved.
    ThreeObjectionsFailed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::ProspectEndIntentTwice => write!(f, "prospect_end_intent_twice"),
            EndReason::ThreeObjectionsFailed => write!(f, "three_objections_failed"),
        }
    }
}

/// Machine-readable annotation on a decision, for the UI and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionNote {
    HoldingBeforeAdvance,
    HoldingThenAdvance,
    StartOrRecoverKeyQuestion,
    ObjectionResolvedReturnToSameKeyQuestion,
    GenericObjectionFallback,
    CallAlreadyEnded,
}

// =============================================================================
// Structs
// =============================================================================

/// One transcribed utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Arrival time in epoch milliseconds.
    #[serde(default, alias = "ts", deserialize_with = "deserialize_timestamp")]
    pub timestamp: Timestamp,
    pub speaker: Speaker,
    pub text: String,
    /// Transcription confidence reported by the speech-to-text layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Turn {
    pub fn new(timestamp: Timestamp, speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            speaker,
            text: text.into(),
            confidence: None,
        }
    }

    pub fn prospect(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self::new(timestamp, Speaker::Prospect, text)
    }

    pub fn agent(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self::new(timestamp, Speaker::Agent, text)
    }
}

/// Classifier output for one decision cycle. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub reaction: Reaction,
    pub objection_category: Option<Category>,
    pub end_intent: bool,
    pub objection_resolved: bool,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl Default for Signal {
    fn default() -> Self {
        Self {
            reaction: Reaction::Neutral,
            objection_category: None,
            end_intent: false,
            objection_resolved: false,
            confidence: 0.0,
        }
    }
}

/// The key question that will be shown once the current hold is committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedQuestion {
    pub section: String,
    pub key_index: usize,
    pub id: String,
    pub text: String,
}

/// What the agent should see next. Only the fields relevant to the branch
/// taken are populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    pub mode: Mode,
    pub prompt_id: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objection_category: Option<Category>,
    pub should_end_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<EndReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_ms_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_next: Option<QueuedQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<DecisionNote>,
}

impl DecisionPayload {
    /// A payload with only the always-present fields set.
    pub fn new(mode: Mode, prompt_id: Option<String>, prompt: impl Into<String>) -> Self {
        Self {
            mode,
            prompt_id,
            prompt: prompt.into(),
            preface: None,
            alternatives: None,
            objection_category: None,
            should_end_call: false,
            reason: None,
            confidence: None,
            hold_ms_remaining: None,
            delay_ms: None,
            queued_next: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: DecisionNote) -> Self {
        self.note = Some(note);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Mode::KeyQuestion).unwrap(),
            "\"key_question\""
        );
        assert_eq!(serde_json::to_string(&Mode::EndCall).unwrap(), "\"end_call\"");
        assert_eq!(Mode::Objection.to_string(), "objection");
    }

    #[test]
    fn test_category_strings_match_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let result: Result<Category, _> = serde_json::from_str("\"pricee\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_speaker_from_str() {
        assert_eq!("prospect".parse::<Speaker>().unwrap(), Speaker::Prospect);
        assert_eq!(" Agent ".parse::<Speaker>().unwrap(), Speaker::Agent);
        assert!("customer".parse::<Speaker>().is_err());
    }

    #[test]
    fn test_turn_accepts_ts_alias() {
        let turn: Turn =
            serde_json::from_str(r#"{"ts": 1200, "speaker": "prospect", "text": "hi"}"#).unwrap();
        assert_eq!(turn.timestamp, 1200);
        assert_eq!(turn.speaker, Speaker::Prospect);
        assert!(turn.confidence.is_none());
    }

    #[test]
    fn test_turn_truncates_fractional_timestamp() {
        let turn: Turn = serde_json::from_str(
            r#"{"timestamp": 1700000000000.7, "speaker": "prospect", "text": "hi"}"#,
        )
        .unwrap();
        assert_eq!(turn.timestamp, 1_700_000_000_000);
        let bad = serde_json::from_str::<Turn>(r#"{"ts": "soon", "speaker": "agent", "text": "x"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_turn_timestamp_defaults_to_zero() {
        let turn: Turn = serde_json::from_str(r#"{"speaker": "agent", "text": "hello"}"#).unwrap();
        assert_eq!(turn.timestamp, 0);
    }

    #[test]
    fn test_payload_skips_absent_fields() {
        let payload = DecisionPayload::new(Mode::KeyQuestion, Some("S1Q1".into()), "Question?")
            .with_note(DecisionNote::HoldingThenAdvance);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["promptId"], "S1Q1");
        assert_eq!(value["shouldEndCall"], false);
        assert_eq!(value["note"], "holding_then_advance");
        assert!(value.get("preface").is_none());
        assert!(value.get("alternatives").is_none());
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn test_end_reason_display_matches_serde() {
        for reason in [EndReason::ProspectEndIntentTwice, EndReason::ThreeObjectionsFailed] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason));
        }
    }
}
