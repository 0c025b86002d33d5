//! Static content catalog: scripted key questions and objection rebuttals.
//!
//! The catalog is loaded once at startup (built in, or from a TOML file),
//! validated, and then shared read-only across every session.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use callcoach_core::{Category, QueuedQuestion};

use crate::error::EngineError;

/// Maximum number of alternative rebuttal lines returned with the primary.
pub const MAX_ALTERNATIVES: usize = 2;

/// One scripted question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyQuestion {
    pub id: String,
    pub text: String,
}

/// An ordered group of key questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub questions: Vec<KeyQuestion>,
}

/// Rebuttal bank for one objection category, as written in a catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionBank {
    pub category: Category,
    /// First line is the primary rebuttal, the rest are alternatives.
    pub lines: Vec<String>,
}

/// On-disk catalog shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub end_call_phrase: String,
    pub continue_phrase: String,
    pub fallback_line: String,
    /// Sections in traversal order.
    pub sections: Vec<Section>,
    #[serde(default)]
    pub objections: Vec<ObjectionBank>,
}

/// Primary rebuttal plus alternatives selected for an objection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuttal {
    pub prompt: String,
    pub alternatives: Vec<String>,
}

/// Validated, immutable content catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    sections: Vec<Section>,
    objections: HashMap<Category, Vec<String>>,
    end_call_phrase: String,
    continue_phrase: String,
    fallback_line: String,
}

impl Catalog {
    /// Validate a catalog file and build the catalog.
    ///
    /// Rejects catalogs with no sections, empty sections, duplicate section
    /// or question ids, blank question text, or a category listed twice.
    pub fn from_file(file: CatalogFile) -> Result<Self, EngineError> {
        if file.sections.is_empty() {
            return Err(EngineError::InvalidCatalog(
                "catalog must define at least one section".to_string(),
            ));
        }

        let mut section_ids = HashSet::new();
        let mut question_ids = HashSet::new();
        for section in &file.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(EngineError::InvalidCatalog(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
            if section.questions.is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "section '{}' has no questions",
                    section.id
                )));
            }
            for question in &section.questions {
                if !question_ids.insert(question.id.as_str()) {
                    return Err(EngineError::InvalidCatalog(format!(
                        "duplicate question id '{}'",
                        question.id
                    )));
                }
                if question.text.trim().is_empty() {
                    return Err(EngineError::InvalidCatalog(format!(
                        "question '{}' has empty text",
                        question.id
                    )));
                }
            }
        }

        let mut objections = HashMap::new();
        for bank in file.objections {
            let lines: Vec<String> = bank
                .lines
                .into_iter()
                .filter(|line| !line.trim().is_empty())
                .collect();
            if objections.insert(bank.category, lines).is_some() {
                return Err(EngineError::InvalidCatalog(format!(
                    "objection category '{}' listed more than once",
                    bank.category
                )));
            }
        }

        Ok(Self {
            sections: file.sections,
            objections,
            end_call_phrase: file.end_call_phrase,
            continue_phrase: file.continue_phrase,
            fallback_line: file.fallback_line,
        })
    }

    /// Parse and validate a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| EngineError::InvalidCatalog(e.to_string()))?;
        Self::from_file(file)
    }

    /// Load and validate a catalog TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidCatalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sections = catalog.sections.len(),
            categories = catalog.objections.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// The built-in real-estate call script.
    pub fn builtin() -> Self {
        Self::from_file(builtin_file()).expect("Invalid built-in catalog")
    }

    /// Sections in traversal order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Id of the section every new session starts in.
    pub fn first_section_id(&self) -> &str {
        // Validation guarantees at least one section.
        &self.sections[0].id
    }

    /// Questions of a section; empty for an unknown section.
    pub fn questions(&self, section: &str) -> &[KeyQuestion] {
        self.sections
            .iter()
            .find(|s| s.id == section)
            .map(|s| s.questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn question(&self, section: &str, key_index: usize) -> Option<&KeyQuestion> {
        self.questions(section).get(key_index)
    }

    /// The question that follows `(section, key_index)` in the script.
    ///
    /// Next index in the same section, else the first question of the next
    /// non-empty section, else the current question again once the script
    /// is exhausted. `None` only when the current position does not exist.
    pub fn next_after(&self, section: &str, key_index: usize) -> Option<QueuedQuestion> {
        let questions = self.questions(section);
        if let Some(next) = questions.get(key_index + 1) {
            return Some(queued(section, key_index + 1, next));
        }

        let position = self.sections.iter().position(|s| s.id == section);
        if let Some(next_section) = position.and_then(|p| self.sections.get(p + 1)) {
            if let Some(first) = next_section.questions.first() {
                return Some(queued(&next_section.id, 0, first));
            }
        }

        questions
            .get(key_index)
            .map(|current| queued(section, key_index, current))
    }

    /// Primary line plus up to [`MAX_ALTERNATIVES`] alternatives.
    ///
    /// `None` when the category has no bank or the bank is empty.
    pub fn rebuttal(&self, category: Category) -> Option<Rebuttal> {
        let lines = self.objections.get(&category)?;
        let (prompt, rest) = lines.split_first()?;
        Some(Rebuttal {
            prompt: prompt.clone(),
            alternatives: rest.iter().take(MAX_ALTERNATIVES).cloned().collect(),
        })
    }

    pub fn end_call_phrase(&self) -> &str {
        &self.end_call_phrase
    }

    pub fn continue_phrase(&self) -> &str {
        &self.continue_phrase
    }

    pub fn fallback_line(&self) -> &str {
        &self.fallback_line
    }
}

fn queued(section: &str, key_index: usize, question: &KeyQuestion) -> QueuedQuestion {
    QueuedQuestion {
        section: section.to_string(),
        key_index,
        id: question.id.clone(),
        text: question.text.clone(),
    }
}

fn question(id: &str, text: &str) -> KeyQuestion {
    KeyQuestion {
        id: id.to_string(),
        text: text.to_string(),
    }
}

fn bank(category: Category, lines: &[&str]) -> ObjectionBank {
    ObjectionBank {
        category,
        lines: lines.iter().map(|l| l.to_string()).collect(),
    }
}

fn builtin_file() -> CatalogFile {
    CatalogFile {
        end_call_phrase: "I hear you. Let’s not force it — I’ll send a short recap, and if timing changes, you can reach back out.".to_string(),
        continue_phrase: "Got it. Does that address it enough for us to continue?".to_string(),
        fallback_line: "Understood. What specifically is making this a no right now—price, timing, or fit?".to_string(),
        sections: vec![
            Section {
                id: "S1".to_string(),
                questions: vec![
                    question("S1Q1", "Quickly—what triggered the move right now?"),
                    question("S1Q2", "What would make this conversation a win for you?"),
                    question("S1Q3", "When do you ideally want to be in the new place?"),
                    question("S1Q4", "What’s not working with your current situation?"),
                ],
            },
            Section {
                id: "S2".to_string(),
                questions: vec![
                    question("S2Q1", "What price range feels comfortable—not optimistic?"),
                    question("S2Q2", "Cash or financing—are you already pre-approved?"),
                    question("S2Q3", "Top 3 must-haves? And top 3 dealbreakers?"),
                    question(
                        "S2Q4",
                        "If we found the right option, what could still stop you from moving forward?",
                    ),
                ],
            },
            Section {
                id: "S3".to_string(),
                questions: vec![
                    question(
                        "S3Q1",
                        "If we schedule a showing, what day/time is easiest this week?",
                    ),
                    question("S3Q2", "Who else needs to be involved in the decision?"),
                    question(
                        "S3Q3",
                        "What would you need to see to feel confident saying yes after the showing?",
                    ),
                ],
            },
        ],
        objections: vec![
            bank(
                Category::Price,
                &[
                    "Totally fair — compared to what?",
                    "If we keep the price, what would need to improve to make it a yes?",
                    "If we keep the features, what price would feel right?",
                ],
            ),
            bank(
                Category::Timing,
                &[
                    "What’s driving the timing — what changes if you wait?",
                    "If it were a perfect fit, what would be the earliest you could move?",
                    "What would need to happen for timing to feel right?",
                ],
            ),
            bank(
                Category::Spouse,
                &[
                    "Makes sense. What matters most to them?",
                    "Want a quick 3-way call so we don’t play telephone?",
                    "If they said yes today, would you be ready to move forward?",
                ],
            ),
            bank(
                Category::Trust,
                &[
                    "Fair question. What would help you feel confident this is the right move?",
                    "What’s your biggest concern — price, process, or risk?",
                    "Would a written breakdown of options + comps help?",
                ],
            ),
            bank(
                Category::AlreadyWorkingWithAgent,
                &[
                    "Got it. Are you under an exclusive agreement right now?",
                    "If not exclusive—what would you want differently from the experience you’re having?",
                    "Would it be useful if I shared a few off-market/alternative options to compare?",
                ],
            ),
            bank(
                Category::NotInterested,
                &[
                    "Understood. Is it a 'not now' or a 'not this'?",
                    "What specifically makes it a no—price, timing, or fit?",
                    "If one thing changed, what would make you reconsider?",
                ],
            ),
        ],
    }
}
