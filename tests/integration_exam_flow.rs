use cramr::clock::ManualClock;
use cramr::db::ExamDb;
use cramr::exam::{start_exam, ExamConfig};
use cramr::model::{Difficulty, Filter, Question, QuestionType, Subject, TaxonomyType};
use cramr::session::{ExamSession, Phase};

fn multiple_choice(n: usize) -> Question {
    Question {
        id: 0,
        subject: Subject::Pr,
        question_text: format!("Question {}", n),
        question_type: QuestionType::MultipleChoice,
        difficulty: Difficulty::Medium,
        taxonomy_type: TaxonomyType::Recall,
        correct_answer: "A) the right one".into(),
        options: Some(vec![
            "A) the right one".into(),
            "B) a wrong one".into(),
            "C) another wrong one".into(),
        ]),
        explanation: "A is correct.".into(),
        source_file_id: 0,
        times_shown: 0,
        times_correct: 0,
        times_incorrect: 0,
        last_shown_date: None,
    }
}

fn seed(db: &ExamDb, n: usize) {
    for i in 0..n {
        db.add_question(&multiple_choice(i)).unwrap();
    }
}

fn config() -> ExamConfig {
    ExamConfig {
        subject: Subject::Pr,
        question_count: 5,
        difficulty: Filter::Any,
        question_type: Filter::Any,
        time_limit: 0,
        show_immediate_feedback: false,
    }
}

// Pool of 5, answer 3 correctly, 1 incorrectly, skip 1: score 60.
#[test]
fn full_exam_three_correct_one_wrong_one_skipped() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 5);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &config(), &clock).unwrap();
    assert_eq!(exam.questions.len(), 5);
    let mut session = ExamSession::new(exam, clock);

    for answer in ["A", "A", "A", "B"] {
        session.set_answer(answer);
        session.clock().advance_secs(10);
        session.next();
    }
    // leave the fifth question unanswered
    session.next();
    assert_eq!(session.phase(), Phase::ConfirmingEnd);
    assert_eq!(session.unanswered_count(), 1);

    let result = session.submit(&mut db).unwrap();
    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(result.total_questions, 5);
    assert_eq!(result.correct_answers, 3);
    assert_eq!(result.incorrect_answers, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.score, 60);
    assert_eq!(
        result.correct_answers + result.incorrect_answers + result.skipped,
        result.total_questions
    );

    // persisted attempt matches the in-memory result
    let attempt = db.attempt(result.attempt_id).unwrap().unwrap();
    assert_eq!(attempt.score, 60);
    assert_eq!(attempt.by_difficulty.medium.correct, 3);
    assert_eq!(attempt.by_difficulty.medium.total, 5);
    assert_eq!(attempt.by_type.multiple_choice.total, 5);

    let answers = db.answers_for_attempt(result.attempt_id).unwrap();
    assert_eq!(answers.len(), 5);
    assert_eq!(answers.iter().filter(|a| a.is_correct).count(), 3);
    assert_eq!(
        answers.iter().filter(|a| a.user_answer.is_empty()).count(),
        1
    );

    // every shown question had its usage counters bumped
    for q in db.all_questions().unwrap() {
        assert_eq!(q.times_shown, 1);
        assert!(q.last_shown_date.is_some());
    }
    let total_correct: u32 = db
        .all_questions()
        .unwrap()
        .iter()
        .map(|q| q.times_correct)
        .sum();
    assert_eq!(total_correct, 3);
}

#[test]
fn feedback_walkthrough_reaches_completion() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 3);

    let clock = ManualClock::default();
    let mut cfg = config();
    cfg.question_count = 3;
    cfg.show_immediate_feedback = true;
    let exam = start_exam(&db, &cfg, &clock).unwrap();
    let mut session = ExamSession::new(exam, clock);

    for _ in 0..3 {
        session.set_answer("A");
        session.next();
        assert_eq!(session.phase(), Phase::ShowingFeedback);
        assert!(session.feedback().unwrap().is_correct);
        session.continue_feedback();
    }
    assert_eq!(session.phase(), Phase::ConfirmingEnd);

    let result = session.submit(&mut db).unwrap();
    assert_eq!(result.score, 100);
    assert_eq!(result.skipped, 0);
}

#[test]
fn cancelling_leaves_no_trace() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 5);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &config(), &clock).unwrap();
    let attempt_id = exam.id;
    let mut session = ExamSession::new(exam, clock);

    session.set_answer("A");
    session.next();
    session.cancel(&mut db).unwrap();

    assert!(db.attempt(attempt_id).unwrap().is_none());
    assert!(db.answers_for_attempt(attempt_id).unwrap().is_empty());
    for q in db.all_questions().unwrap() {
        assert_eq!(q.times_shown, 0);
    }
}

#[test]
fn resubmission_after_completion_is_rejected() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 5);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &config(), &clock).unwrap();
    let mut session = ExamSession::new(exam, clock);

    let result = session.submit(&mut db).unwrap();
    assert!(session.submit(&mut db).is_err());
    assert_eq!(db.answers_for_attempt(result.attempt_id).unwrap().len(), 5);
}
