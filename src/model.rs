use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Course categories questions and exams belong to. Fixed set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum Subject {
    #[serde(rename = "PR")]
    #[strum(serialize = "PR")]
    Pr,
    #[serde(rename = "Audio-Visualism")]
    #[strum(serialize = "Audio-Visualism")]
    AudioVisualism,
    Publicity,
    Journalism,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Pr,
        Subject::AudioVisualism,
        Subject::Publicity,
        Subject::Journalism,
    ];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    FillIn,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::MultipleChoice,
        QuestionType::ShortAnswer,
        QuestionType::FillIn,
    ];
}

/// Cognitive-level classification of a question.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaxonomyType {
    Recall,
    Conceptual,
    Application,
}

impl TaxonomyType {
    pub const ALL: [TaxonomyType; 3] = [
        TaxonomyType::Recall,
        TaxonomyType::Conceptual,
        TaxonomyType::Application,
    ];
}

/// A filter over an enum value, replacing the "'all'" string sentinel the
/// storage layer would otherwise have to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<T> {
    Any,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::Any => true,
            Filter::Only(v) => v == value,
        }
    }
}

/// A stored quiz question: immutable content plus usage counters that only
/// the scorer bumps after each submitted exam.
///
/// `id` is 0 until the store assigns one. `options` is present iff the
/// question is multiple choice; each entry carries its choice letter,
/// e.g. "A) Press release".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: i64,
    pub subject: Subject,
    pub question_text: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub taxonomy_type: TaxonomyType,
    pub correct_answer: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub explanation: String,
    /// 0 for manually imported questions not linked to an uploaded file.
    #[serde(default)]
    pub source_file_id: i64,
    #[serde(default)]
    pub times_shown: u32,
    #[serde(default)]
    pub times_correct: u32,
    #[serde(default)]
    pub times_incorrect: u32,
    #[serde(default)]
    pub last_shown_date: Option<DateTime<Local>>,
}

/// Correct/total pair for one difficulty or question-type bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub correct: u32,
    pub total: u32,
}

impl Tally {
    /// Rounded percentage of correct answers, 0 when the bucket is empty.
    pub fn percentage(&self) -> u32 {
        crate::util::percent(self.correct, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByDifficulty {
    pub easy: Tally,
    pub medium: Tally,
    pub hard: Tally,
}

impl ByDifficulty {
    pub fn get(&self, difficulty: Difficulty) -> Tally {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn get_mut(&mut self, difficulty: Difficulty) -> &mut Tally {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByType {
    pub multiple_choice: Tally,
    pub short_answer: Tally,
    pub fill_in: Tally,
}

impl ByType {
    pub fn get(&self, question_type: QuestionType) -> Tally {
        match question_type {
            QuestionType::MultipleChoice => self.multiple_choice,
            QuestionType::ShortAnswer => self.short_answer,
            QuestionType::FillIn => self.fill_in,
        }
    }

    pub fn get_mut(&mut self, question_type: QuestionType) -> &mut Tally {
        match question_type {
            QuestionType::MultipleChoice => &mut self.multiple_choice,
            QuestionType::ShortAnswer => &mut self.short_answer,
            QuestionType::FillIn => &mut self.fill_in,
        }
    }
}

/// One persisted exam run. A placeholder row (score 0, zero tallies) is
/// reserved when the session starts and updated in place at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAttempt {
    #[serde(default)]
    pub id: i64,
    pub subject: Subject,
    pub date: DateTime<Local>,
    pub question_ids: Vec<i64>,
    pub score: u32,
    pub time_taken: u64,
    pub by_difficulty: ByDifficulty,
    pub by_type: ByType,
}

/// One persisted answer per question per attempt, written only at
/// submission. Skipped questions are recorded with an empty answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnswer {
    #[serde(default)]
    pub id: i64,
    pub exam_attempt_id: i64,
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub time_spent: u64,
    pub timestamp: DateTime<Local>,
}
