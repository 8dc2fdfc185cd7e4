use chrono::{DateTime, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of answer options a question can carry (and tally slots)
pub const MAX_OPTIONS: usize = 4;
pub const DEFAULT_TIME_LIMIT: u32 = 20;
pub const DEFAULT_POINTS: u32 = 100;

/// Fixed labels for true/false questions
pub const TRUE_LABEL: &str = "Verdadero";
pub const FALSE_LABEL: &str = "Falso";

/// Per-option response counts for the current question
pub type Tally = [u32; MAX_OPTIONS];

/// Option labels used when a question needs fresh options
pub fn default_option_labels() -> Vec<String> {
    (1..=MAX_OPTIONS).map(|i| format!("Opción {}", i)).collect()
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT
}

fn default_points() -> u32 {
    DEFAULT_POINTS
}

// ========== Quizzes ==========

/// Identity of a quiz.
///
/// Quizzes that only exist locally (new, or generated from a PDF) carry a
/// draft id until the backend assigns a real one on first save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizId {
    Saved(i64),
    Draft(ulid::Ulid),
}

impl QuizId {
    pub fn draft() -> Self {
        QuizId::Draft(ulid::Ulid::new())
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, QuizId::Draft(_))
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizId::Saved(id) => write!(f, "{}", id),
            QuizId::Draft(ulid) => write!(f, "draft-{}", ulid),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    #[serde(default = "QuizId::draft")]
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "questionsData")]
    pub questions: Vec<Question>,
    /// ISO8601 timestamp set by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Quiz {
    /// Create an empty draft quiz
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: QuizId::draft(),
            title: title.into(),
            description: String::new(),
            questions: Vec::new(),
            created_at: None,
        }
    }

    /// Calendar date the backend created this quiz, if it reported a parseable one
    pub fn created_date(&self) -> Option<NaiveDate> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.date_naive())
            .ok()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.questions.len().checked_sub(1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuestionKind {
    #[serde(rename = "single")]
    Single,
    /// Exactly two correct options
    #[serde(rename = "multi")]
    Multi,
    #[serde(rename = "tf")]
    TrueFalse,
}

impl QuestionKind {
    /// Number of correct answers a playable question of this kind holds
    pub fn answer_count(self) -> usize {
        match self {
            QuestionKind::Multi => 2,
            QuestionKind::Single | QuestionKind::TrueFalse => 1,
        }
    }
}

/// Correct answer as it travels on the wire: a single option text or a list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
}

impl CorrectAnswer {
    pub fn contains(&self, option: &str) -> bool {
        match self {
            CorrectAnswer::One(answer) => answer == option,
            CorrectAnswer::Many(answers) => answers.iter().any(|a| a == option),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            CorrectAnswer::One(answer) => vec![answer.as_str()],
            CorrectAnswer::Many(answers) => answers.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CorrectAnswer::One(_) => 1,
            CorrectAnswer::Many(answers) => answers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: CorrectAnswer,
    /// Seconds players get to answer
    #[serde(rename = "time", default = "default_time_limit")]
    pub time_limit: u32,
    #[serde(default = "default_points")]
    pub points: u32,
}

impl Question {
    /// Blank single-choice question with the default option labels
    pub fn single(prompt: impl Into<String>) -> Self {
        let options = default_option_labels();
        let answer = CorrectAnswer::One(options[0].clone());
        Self {
            kind: QuestionKind::Single,
            prompt: prompt.into(),
            options,
            answer,
            time_limit: DEFAULT_TIME_LIMIT,
            points: DEFAULT_POINTS,
        }
    }

    pub fn true_false(prompt: impl Into<String>, correct: bool) -> Self {
        let answer = if correct { TRUE_LABEL } else { FALSE_LABEL };
        Self {
            kind: QuestionKind::TrueFalse,
            prompt: prompt.into(),
            options: vec![TRUE_LABEL.to_string(), FALSE_LABEL.to_string()],
            answer: CorrectAnswer::One(answer.to_string()),
            time_limit: DEFAULT_TIME_LIMIT,
            points: DEFAULT_POINTS,
        }
    }

    /// Time limit with a zero value treated as "use the default"
    pub fn effective_time_limit(&self) -> u32 {
        if self.time_limit == 0 {
            DEFAULT_TIME_LIMIT
        } else {
            self.time_limit
        }
    }

    pub fn is_correct_option(&self, option: &str) -> bool {
        self.answer.contains(option)
    }

    /// Correctness flag per option slot, used to mark bars on the reveal chart
    pub fn correct_slots(&self) -> [bool; MAX_OPTIONS] {
        let mut slots = [false; MAX_OPTIONS];
        for (slot, option) in slots.iter_mut().zip(self.options.iter()) {
            *slot = self.answer.contains(option);
        }
        slots
    }
}

// ========== Rooms & players ==========

/// Six digit room PIN
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    /// Pick a random code in 100000..=999999. Collisions are resolved server side.
    pub fn generate() -> Self {
        let code: u32 = rand::rng().random_range(100_000..=999_999);
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player as reported by the real-time server.
///
/// The name doubles as the player's identity; uniqueness within a room has to
/// be enforced by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    #[serde(alias = "playerName")]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub score: u32,
}

impl Player {
    /// Player known only by name, with a generated avatar
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let avatar = format!("https://api.dicebear.com/9.x/notionists/svg?seed={}", name);
        Self {
            name,
            avatar,
            score: 0,
        }
    }
}

/// Private per-question feedback sent to a single player
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub is_correct: bool,
    pub points_earned: u32,
    pub total_score: u32,
}
