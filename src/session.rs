use crate::clock::Clock;
use crate::db::ExamDb;
use crate::error::ExamError;
use crate::exam::ActiveExam;
use crate::grade::{self, check_answer, ExamResult};
use crate::model::Question;
use chrono::{DateTime, Local};

/// Where the session currently is. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InProgress,
    ShowingFeedback,
    ConfirmingEnd,
    Submitting,
    Completed,
    Cancelled,
}

/// What the immediate-feedback panel shows after an answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: String,
}

/// Owns one in-flight exam end to end: the question pointer, the transient
/// answer input, the per-question time ledger, elapsed time, and the
/// feedback / end-confirmation sub-states.
///
/// The driving loop calls `tick()` once per second; a `true` return means
/// the time limit was hit and the caller should invoke `submit()`. The
/// expiry is latched and `submit()` guards re-entry, so a tick racing a
/// manual submission can never persist twice.
#[derive(Debug)]
pub struct ExamSession<C: Clock> {
    exam: ActiveExam,
    clock: C,
    phase: Phase,
    current_index: usize,
    current_answer: String,
    question_shown_at: DateTime<Local>,
    elapsed_secs: u64,
    time_expired: bool,
    feedback: Option<Feedback>,
    result: Option<ExamResult>,
}

impl<C: Clock> ExamSession<C> {
    pub fn new(exam: ActiveExam, clock: C) -> Self {
        let shown_at = clock.now();
        Self {
            exam,
            clock,
            phase: Phase::InProgress,
            current_index: 0,
            current_answer: String::new(),
            question_shown_at: shown_at,
            elapsed_secs: 0,
            time_expired: false,
            feedback: None,
            result: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn exam(&self) -> &ActiveExam {
        &self.exam
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.exam.questions.get(self.current_index)
    }

    pub fn total_questions(&self) -> usize {
        self.exam.questions.len()
    }

    pub fn current_answer(&self) -> &str {
        &self.current_answer
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Seconds left on the clock, or None when the exam is untimed.
    pub fn time_remaining(&self) -> Option<u64> {
        match self.time_limit_secs() {
            0 => None,
            limit => Some(limit.saturating_sub(self.elapsed_secs)),
        }
    }

    fn time_limit_secs(&self) -> u64 {
        self.exam.config.time_limit * 60
    }

    /// Advance the exam clock by one second. Returns true exactly once,
    /// when the time limit is reached; the caller should then submit.
    /// No-op outside the ticking phases.
    pub fn tick(&mut self) -> bool {
        if !matches!(self.phase, Phase::InProgress | Phase::ShowingFeedback) {
            return false;
        }

        self.elapsed_secs += 1;
        let limit = self.time_limit_secs();
        if limit > 0 && self.elapsed_secs >= limit && !self.time_expired {
            self.time_expired = true;
            return true;
        }
        false
    }

    /// Replace the transient answer for the current question. Ignored
    /// while feedback is up or the session is done.
    pub fn set_answer(&mut self, answer: impl Into<String>) {
        if self.phase == Phase::InProgress {
            self.current_answer = answer.into();
        }
    }

    /// Questions whose effective answer is non-empty: the transient input
    /// for the current question, the ledger for everything else. This is
    /// exactly the set submission will grade as answered.
    pub fn answered_count(&self) -> usize {
        self.exam
            .questions
            .iter()
            .enumerate()
            .filter(|(i, q)| {
                if *i == self.current_index {
                    !self.current_answer.is_empty()
                } else {
                    self.exam
                        .answers
                        .get(&q.id)
                        .is_some_and(|r| !r.answer.is_empty())
                }
            })
            .count()
    }

    pub fn unanswered_count(&self) -> usize {
        self.total_questions() - self.answered_count()
    }

    /// Commit the transient answer into the ledger. Dwell time since the
    /// question was last displayed is added to any prior time on it.
    fn commit_current(&mut self, evaluate: bool) {
        let now = self.clock.now();
        let dwell = (now - self.question_shown_at).num_seconds().max(0) as u64;

        if let Some(question) = self.exam.questions.get(self.current_index) {
            let is_correct = if evaluate && !self.current_answer.is_empty() {
                Some(check_answer(question, &self.current_answer))
            } else {
                None
            };

            let record = self.exam.answers.entry(question.id).or_default();
            record.answer = self.current_answer.clone();
            record.time_spent += dwell;
            if is_correct.is_some() {
                record.is_correct = is_correct;
            }
        }

        self.question_shown_at = now;
    }

    /// Point the session at `index` and restore its saved answer.
    fn show_question(&mut self, index: usize) {
        self.current_index = index;
        self.current_answer = self
            .current_question()
            .and_then(|q| self.exam.answers.get(&q.id))
            .map(|r| r.answer.clone())
            .unwrap_or_default();
        self.question_shown_at = self.clock.now();
    }

    /// Advance. With immediate feedback enabled and a non-empty answer this
    /// evaluates and shows the feedback panel instead of moving; past the
    /// last question it opens the end confirmation.
    pub fn next(&mut self) {
        if self.phase != Phase::InProgress {
            return;
        }

        if self.exam.config.show_immediate_feedback && !self.current_answer.is_empty() {
            self.commit_current(true);
            if let Some(question) = self.exam.questions.get(self.current_index) {
                let is_correct = self
                    .exam
                    .answers
                    .get(&question.id)
                    .and_then(|r| r.is_correct)
                    .unwrap_or(false);
                self.feedback = Some(Feedback {
                    is_correct,
                    correct_answer: question.correct_answer.clone(),
                    explanation: question.explanation.clone(),
                });
                self.phase = Phase::ShowingFeedback;
            }
            return;
        }

        self.commit_current(false);
        if self.current_index + 1 < self.total_questions() {
            self.show_question(self.current_index + 1);
        } else {
            self.phase = Phase::ConfirmingEnd;
        }
    }

    /// Go back one question. Blocked while feedback is showing.
    pub fn previous(&mut self) {
        if self.phase != Phase::InProgress || self.current_index == 0 {
            return;
        }
        self.commit_current(false);
        self.show_question(self.current_index - 1);
    }

    /// Jump to a question by index. Blocked while feedback is showing.
    pub fn go_to_question(&mut self, index: usize) {
        if self.phase != Phase::InProgress || index >= self.total_questions() {
            return;
        }
        self.commit_current(false);
        self.show_question(index);
    }

    /// Dismiss the feedback panel and advance, or open the end
    /// confirmation when it was the last question.
    pub fn continue_feedback(&mut self) {
        if self.phase != Phase::ShowingFeedback {
            return;
        }
        self.feedback = None;
        if self.current_index + 1 < self.total_questions() {
            self.phase = Phase::InProgress;
            self.show_question(self.current_index + 1);
        } else {
            self.phase = Phase::ConfirmingEnd;
        }
    }

    /// Explicit "End Exam": commits the pending answer and asks for
    /// confirmation, reporting how many questions are still unanswered.
    pub fn request_end(&mut self) {
        if self.phase != Phase::InProgress {
            return;
        }
        self.commit_current(false);
        self.phase = Phase::ConfirmingEnd;
    }

    /// Back out of the end confirmation without losing anything.
    pub fn resume(&mut self) {
        if self.phase != Phase::ConfirmingEnd {
            return;
        }
        self.phase = Phase::InProgress;
        let index = self.current_index;
        self.show_question(index);
    }

    /// Grade and persist the exam. Guards against re-entry: once the
    /// session is submitting or done, further calls fail without touching
    /// the store. On a persistence failure the session drops back to the
    /// end confirmation with the ledger intact, so submission can be
    /// retried without re-answering.
    pub fn submit(&mut self, db: &mut ExamDb) -> Result<ExamResult, ExamError> {
        match self.phase {
            Phase::Submitting | Phase::Completed | Phase::Cancelled => {
                return Err(ExamError::SessionClosed)
            }
            Phase::InProgress | Phase::ShowingFeedback => {
                self.commit_current(false);
                self.feedback = None;
            }
            Phase::ConfirmingEnd => {}
        }
        self.phase = Phase::Submitting;

        match grade::submit_exam(db, &self.exam, &self.clock) {
            Ok(result) => {
                self.phase = Phase::Completed;
                self.result = Some(result.clone());
                Ok(result)
            }
            Err(e) => {
                self.phase = Phase::ConfirmingEnd;
                Err(e)
            }
        }
    }

    /// Discard the session and delete the placeholder attempt reserved at
    /// start. Nothing else was persisted, so this is a clean abort.
    pub fn cancel(&mut self, db: &mut ExamDb) -> Result<(), ExamError> {
        if matches!(
            self.phase,
            Phase::Submitting | Phase::Completed | Phase::Cancelled
        ) {
            return Err(ExamError::SessionClosed);
        }
        self.phase = Phase::Cancelled;
        db.delete_attempt(self.exam.id)?;
        Ok(())
    }
}
