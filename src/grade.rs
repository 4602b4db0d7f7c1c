use crate::clock::Clock;
use crate::db::{ExamDb, SubmissionRow};
use crate::error::ExamError;
use crate::exam::ActiveExam;
use crate::model::{ByDifficulty, ByType, Question, QuestionType};
use crate::util::percent;
use itertools::Itertools;

/// Aggregated outcome of one submitted exam, including per-question detail
/// for the review screen.
#[derive(Debug, Clone)]
pub struct ExamResult {
    pub attempt_id: i64,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub skipped: usize,
    /// Integer percent, rounded. 0 for an empty exam.
    pub score: u32,
    pub time_taken: u64,
    pub by_difficulty: ByDifficulty,
    pub by_type: ByType,
    pub question_results: Vec<QuestionResult>,
}

#[derive(Debug, Clone)]
pub struct QuestionResult {
    pub question: Question,
    pub user_answer: String,
    pub is_correct: bool,
    pub time_spent: u64,
}

/// Decide whether `user_answer` is an acceptable answer to `question`.
/// Pure; comparison rules depend on the question type.
///
/// Free-text grading deliberately accepts substring containment in either
/// direction. That leniency can accept a short answer buried inside a long
/// correct phrase; it is a documented tradeoff, not a defect.
pub fn check_answer(question: &Question, user_answer: &str) -> bool {
    let user = user_answer.trim().to_lowercase();
    if user.is_empty() {
        return false;
    }
    let correct = question.correct_answer.trim().to_lowercase();

    if question.question_type == QuestionType::MultipleChoice {
        // Accept either the bare choice letter or the full option text.
        let correct_letter = correct.chars().next();
        let user_letter = user.chars().next();
        return (correct_letter.is_some() && correct_letter == user_letter) || user == correct;
    }

    let clean_user = normalize_free_text(&user);
    let clean_correct = normalize_free_text(&correct);

    clean_user == clean_correct
        || clean_user.contains(&clean_correct)
        || clean_correct.contains(&clean_user)
}

/// Strip sentence punctuation and collapse whitespace runs.
fn normalize_free_text(s: &str) -> String {
    let stripped: String = s
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .collect();
    stripped.split_whitespace().join(" ")
}

/// Grade a finished session and persist everything in one shot: an answer
/// row per question (skipped ones included), question usage counters, and
/// the final score on the placeholder attempt reserved at start.
///
/// A persistence failure returns `ExamError::Submission` with nothing
/// half-written; the caller keeps the session ledger and may retry.
pub fn submit_exam(
    db: &mut ExamDb,
    exam: &ActiveExam,
    clock: &impl Clock,
) -> Result<ExamResult, ExamError> {
    let now = clock.now();
    let time_taken = (now - exam.start_time).num_seconds().max(0) as u64;

    let mut by_difficulty = ByDifficulty::default();
    let mut by_type = ByType::default();
    let mut question_results = Vec::with_capacity(exam.questions.len());
    let mut rows = Vec::with_capacity(exam.questions.len());
    let mut correct_count = 0usize;
    let mut skipped_count = 0usize;

    for question in &exam.questions {
        let record = exam.answers.get(&question.id);
        let user_answer = record.map(|r| r.answer.clone()).unwrap_or_default();
        let time_spent = record.map(|r| r.time_spent).unwrap_or(0);
        let skipped = user_answer.is_empty();
        let is_correct = !skipped && check_answer(question, &user_answer);

        if skipped {
            skipped_count += 1;
        } else if is_correct {
            correct_count += 1;
        }

        by_difficulty.get_mut(question.difficulty).total += 1;
        by_type.get_mut(question.question_type).total += 1;
        if is_correct {
            by_difficulty.get_mut(question.difficulty).correct += 1;
            by_type.get_mut(question.question_type).correct += 1;
        }

        rows.push(SubmissionRow {
            question_id: question.id,
            user_answer: user_answer.clone(),
            is_correct,
            skipped,
            time_spent,
            timestamp: now,
        });

        question_results.push(QuestionResult {
            question: question.clone(),
            user_answer,
            is_correct,
            time_spent,
        });
    }

    let total = exam.questions.len();
    let score = percent(correct_count as u32, total as u32);

    db.persist_submission(exam.id, score, time_taken, &by_difficulty, &by_type, &rows)
        .map_err(ExamError::Submission)?;

    Ok(ExamResult {
        attempt_id: exam.id,
        total_questions: total,
        correct_answers: correct_count,
        incorrect_answers: total - correct_count - skipped_count,
        skipped: skipped_count,
        score,
        time_taken,
        by_difficulty,
        by_type,
        question_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::exam::AnswerRecord;
    use crate::model::{Difficulty, Filter, Subject, TaxonomyType};

    fn mc_question(correct: &str) -> Question {
        Question {
            id: 1,
            subject: Subject::Pr,
            question_text: "Pick one".into(),
            question_type: QuestionType::MultipleChoice,
            difficulty: Difficulty::Easy,
            taxonomy_type: TaxonomyType::Recall,
            correct_answer: correct.into(),
            options: Some(vec!["A) alpha".into(), "B) beta".into()]),
            explanation: String::new(),
            source_file_id: 0,
            times_shown: 0,
            times_correct: 0,
            times_incorrect: 0,
            last_shown_date: None,
        }
    }

    fn text_question(correct: &str) -> Question {
        let mut q = mc_question(correct);
        q.question_type = QuestionType::ShortAnswer;
        q.options = None;
        q
    }

    #[test]
    fn multiple_choice_accepts_letter_or_full_text() {
        let q = mc_question("A) alpha");
        assert!(check_answer(&q, "A"));
        assert!(check_answer(&q, "a"));
        assert!(check_answer(&q, "  A) alpha "));
        assert!(!check_answer(&q, "B"));
        assert!(!check_answer(&q, "B) beta"));
    }

    #[test]
    fn multiple_choice_letter_and_full_text_agree() {
        let q = mc_question("A) alpha");
        assert_eq!(check_answer(&q, "A"), check_answer(&q, "A) alpha"));
    }

    #[test]
    fn free_text_ignores_punctuation_and_spacing() {
        let q = text_question("media influence on topic salience");
        assert!(check_answer(&q, "Media influence on topic salience."));
        assert!(check_answer(&q, "media   influence on topic, salience"));
        assert!(!check_answer(&q, "framing theory"));
    }

    #[test]
    fn free_text_substring_leniency_goes_both_ways() {
        let q = text_question("agenda setting");
        assert!(check_answer(&q, "this is about agenda setting in the media"));
        assert!(check_answer(&q, "agenda"));
    }

    #[test]
    fn empty_answer_is_never_correct() {
        assert!(!check_answer(&text_question("anything"), ""));
        assert!(!check_answer(&text_question("anything"), "   "));
        assert!(!check_answer(&mc_question("A) alpha"), ""));
    }

    #[test]
    fn evaluator_is_pure() {
        let q = text_question("agenda setting");
        assert_eq!(check_answer(&q, "agenda"), check_answer(&q, "agenda"));
    }

    #[test]
    fn scoring_counts_add_up_and_score_rounds() {
        // 5 questions: 3 correct, 1 wrong, 1 skipped -> 60%
        let mut db = ExamDb::open_in_memory().unwrap();
        let clock = ManualClock::default();

        let mut questions = Vec::new();
        for i in 0..5 {
            let mut q = mc_question("A) alpha");
            q.id = db.add_question(&q).unwrap();
            assert_eq!(q.id, i as i64 + 1);
            questions.push(q);
        }

        let mut exam = ActiveExam {
            id: db
                .add_attempt(&crate::model::ExamAttempt {
                    id: 0,
                    subject: Subject::Pr,
                    date: clock.now(),
                    question_ids: questions.iter().map(|q| q.id).collect(),
                    score: 0,
                    time_taken: 0,
                    by_difficulty: ByDifficulty::default(),
                    by_type: ByType::default(),
                })
                .unwrap(),
            config: crate::exam::ExamConfig {
                subject: Subject::Pr,
                question_count: 5,
                difficulty: Filter::Any,
                question_type: Filter::Any,
                time_limit: 0,
                show_immediate_feedback: false,
            },
            questions,
            start_time: clock.now(),
            answers: Default::default(),
        };

        for id in [1, 2, 3] {
            exam.answers.insert(
                id,
                AnswerRecord {
                    answer: "A".into(),
                    time_spent: 10,
                    is_correct: None,
                },
            );
        }
        exam.answers.insert(
            4,
            AnswerRecord {
                answer: "B".into(),
                time_spent: 4,
                is_correct: None,
            },
        );
        // question 5 left unanswered

        clock.advance_secs(90);
        let result = submit_exam(&mut db, &exam, &clock).unwrap();

        assert_eq!(result.total_questions, 5);
        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.incorrect_answers, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(
            result.correct_answers + result.incorrect_answers + result.skipped,
            result.total_questions
        );
        assert_eq!(result.score, 60);
        assert_eq!(result.time_taken, 90);
        assert_eq!(result.by_difficulty.easy.total, 5);
        assert_eq!(result.by_difficulty.easy.correct, 3);
        assert_eq!(result.by_type.multiple_choice.total, 5);
        assert_eq!(result.question_results.len(), 5);
        assert!(!result.question_results[4].is_correct);
        assert_eq!(result.question_results[4].user_answer, "");

        // persisted side effects
        let attempt = db.attempt(result.attempt_id).unwrap().unwrap();
        assert_eq!(attempt.score, 60);
        assert_eq!(db.answers_for_attempt(result.attempt_id).unwrap().len(), 5);
        let q = db.question(4).unwrap().unwrap();
        assert_eq!(q.times_incorrect, 1);
        let q = db.question(5).unwrap().unwrap();
        assert_eq!(q.times_shown, 1);
        assert_eq!(q.times_incorrect, 0);
    }
}
