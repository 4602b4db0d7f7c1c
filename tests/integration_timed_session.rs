use cramr::clock::ManualClock;
use cramr::db::ExamDb;
use cramr::exam::{start_exam, ExamConfig};
use cramr::model::{Difficulty, Filter, Question, QuestionType, Subject, TaxonomyType};
use cramr::session::{ExamSession, Phase};

fn seed(db: &ExamDb, n: usize) {
    for i in 0..n {
        db.add_question(&Question {
            id: 0,
            subject: Subject::AudioVisualism,
            question_text: format!("Question {}", i),
            question_type: QuestionType::ShortAnswer,
            difficulty: Difficulty::Easy,
            taxonomy_type: TaxonomyType::Recall,
            correct_answer: "montage".into(),
            options: None,
            explanation: String::new(),
            source_file_id: 0,
            times_shown: 0,
            times_correct: 0,
            times_incorrect: 0,
            last_shown_date: None,
        })
        .unwrap();
    }
}

fn timed_config(minutes: u64) -> ExamConfig {
    ExamConfig {
        subject: Subject::AudioVisualism,
        question_count: 4,
        difficulty: Filter::Any,
        question_type: Filter::Any,
        time_limit: minutes,
        show_immediate_feedback: false,
    }
}

// One-minute limit, user never touches the exam: after 60 ticks the
// session asks for submission; everything is skipped, score 0.
#[test]
fn idle_timed_exam_auto_submits_with_score_zero() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 4);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &timed_config(1), &clock).unwrap();
    let mut session = ExamSession::new(exam, clock);

    let mut fired = 0;
    for _ in 0..60 {
        session.clock().advance_secs(1);
        if session.tick() {
            fired += 1;
            let result = session.submit(&mut db).unwrap();
            assert_eq!(result.score, 0);
            assert_eq!(result.skipped, 4);
            assert_eq!(result.correct_answers, 0);
            assert_eq!(result.time_taken, 60);
        }
    }
    assert_eq!(fired, 1);
    assert_eq!(session.phase(), Phase::Completed);
}

// A tick landing exactly when a manual submission goes through must not
// produce a second set of persisted rows.
#[test]
fn tick_racing_manual_submission_cannot_double_submit() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 4);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &timed_config(1), &clock).unwrap();
    let mut session = ExamSession::new(exam, clock);

    // run the clock right up to the limit
    for _ in 0..59 {
        assert!(!session.tick());
    }

    // user submits manually; the expiring tick arrives immediately after
    let result = session.submit(&mut db).unwrap();
    assert!(!session.tick());
    assert!(session.submit(&mut db).is_err());

    assert_eq!(db.answers_for_attempt(result.attempt_id).unwrap().len(), 4);
    for q in db.all_questions().unwrap() {
        assert_eq!(q.times_shown, 1);
    }
}

#[test]
fn remaining_time_counts_down_only_while_running() {
    let mut db = ExamDb::open_in_memory().unwrap();
    seed(&db, 4);

    let clock = ManualClock::default();
    let exam = start_exam(&db, &timed_config(2), &clock).unwrap();
    let mut session = ExamSession::new(exam, clock);

    assert_eq!(session.time_remaining(), Some(120));
    for _ in 0..30 {
        session.tick();
    }
    assert_eq!(session.time_remaining(), Some(90));

    session.request_end();
    for _ in 0..10 {
        assert!(!session.tick());
    }
    assert_eq!(session.time_remaining(), Some(90));

    session.resume();
    session.tick();
    assert_eq!(session.time_remaining(), Some(89));

    session.submit(&mut db).unwrap();
}
