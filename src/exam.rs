use crate::clock::Clock;
use crate::db::ExamDb;
use crate::error::ExamError;
use crate::model::{
    ByDifficulty, ByType, Difficulty, ExamAttempt, Filter, Question, QuestionType, Subject,
};
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Hard cap on the number of questions a single exam can draw.
pub const MAX_QUESTIONS: usize = 50;

/// User-chosen constraints for one practice exam.
#[derive(Debug, Clone)]
pub struct ExamConfig {
    pub subject: Subject,
    pub question_count: usize,
    pub difficulty: Filter<Difficulty>,
    pub question_type: Filter<QuestionType>,
    /// Minutes; 0 means unlimited.
    pub time_limit: u64,
    pub show_immediate_feedback: bool,
}

/// One recorded answer in the session ledger. `time_spent` accumulates
/// across revisits to the same question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerRecord {
    pub answer: String,
    pub time_spent: u64,
    pub is_correct: Option<bool>,
}

/// An in-flight exam. Question snapshots are taken at start and do not
/// reflect later store mutations; nothing beyond the reserved placeholder
/// attempt is persisted until submission.
#[derive(Debug, Clone)]
pub struct ActiveExam {
    /// Id of the placeholder attempt row reserved at start.
    pub id: i64,
    pub config: ExamConfig,
    pub questions: Vec<Question>,
    pub start_time: DateTime<Local>,
    pub answers: HashMap<i64, AnswerRecord>,
}

/// Draw questions matching the config and reserve the attempt record.
///
/// An empty candidate pool is an error; a pool smaller than the requested
/// count is not, the exam just runs with every matching question.
pub fn start_exam(
    db: &ExamDb,
    config: &ExamConfig,
    clock: &impl Clock,
) -> Result<ActiveExam, ExamError> {
    let mut pool = db.questions_for_exam(
        config.subject,
        config.difficulty,
        config.question_type,
        &[],
    )?;

    if pool.is_empty() {
        return Err(ExamError::NoQuestionsAvailable);
    }

    let requested = config.question_count.min(MAX_QUESTIONS);
    if pool.len() < requested {
        log::warn!(
            "only {} questions available for {}, requested {}",
            pool.len(),
            config.subject,
            requested
        );
    }

    // Fisher-Yates over the whole pool, then truncate: uniform over both
    // the drawn subset and its presentation order.
    let count = requested.min(pool.len());
    let mut rng = rand::thread_rng();
    pool.shuffle(&mut rng);
    pool.truncate(count);
    let questions = pool;

    let now = clock.now();
    let attempt_id = db.add_attempt(&ExamAttempt {
        id: 0,
        subject: config.subject,
        date: now,
        question_ids: questions.iter().map(|q| q.id).collect(),
        score: 0,
        time_taken: 0,
        by_difficulty: ByDifficulty::default(),
        by_type: ByType::default(),
    })?;

    Ok(ActiveExam {
        id: attempt_id,
        config: config.clone(),
        questions,
        start_time: now,
        answers: HashMap::new(),
    })
}
