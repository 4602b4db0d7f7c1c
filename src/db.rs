use crate::model::{
    ByDifficulty, ByType, Difficulty, ExamAttempt, Filter, Question, QuestionType, Subject,
    TaxonomyType, UserAnswer,
};
use chrono::{DateTime, Local};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// One row the scorer wants persisted for a submitted exam.
#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub skipped: bool,
    pub time_spent: u64,
    pub timestamp: DateTime<Local>,
}

/// Per-subject question bank coverage, for the overview screens.
#[derive(Debug, Clone, Default)]
pub struct CoverageCounts {
    pub total: u32,
    pub by_difficulty: HashMap<Difficulty, u32>,
    pub by_type: HashMap<QuestionType, u32>,
}

/// SQLite-backed store for questions, exam attempts, and per-question
/// answers. Handed explicitly to the services that need it; lifecycle is
/// owned by the application root.
#[derive(Debug)]
pub struct ExamDb {
    conn: Connection,
}

impl ExamDb {
    /// Open (or create) the database at the default state path.
    pub fn open() -> Result<Self> {
        let db_path = Self::default_db_path().unwrap_or_else(|| PathBuf::from("cramr_exams.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        Self::open_at(db_path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(ExamDb { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(ExamDb { conn })
    }

    /// Database file under $HOME/.local/state/cramr
    fn default_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("cramr");
            Some(state_dir.join("exams.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "cramr") {
            let state_dir = proj_dirs.data_local_dir();
            Some(state_dir.join("exams.db"))
        } else {
            None
        }
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                question_text TEXT NOT NULL,
                question_type TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                taxonomy_type TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                options TEXT,
                explanation TEXT NOT NULL,
                source_file_id INTEGER NOT NULL,
                times_shown INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                times_incorrect INTEGER NOT NULL DEFAULT 0,
                last_shown_date TEXT
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS exam_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                date TEXT NOT NULL,
                question_ids TEXT NOT NULL,
                score INTEGER NOT NULL,
                time_taken INTEGER NOT NULL,
                by_difficulty TEXT NOT NULL,
                by_type TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_attempt_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                user_answer TEXT NOT NULL,
                is_correct BOOLEAN NOT NULL,
                time_spent INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_questions_subject ON questions(subject)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_questions_source ON questions(source_file_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attempts_date ON exam_attempts(date)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_answers_attempt ON user_answers(exam_attempt_id)",
            [],
        )?;

        Ok(())
    }

    // ---- questions ----

    /// Insert a question, ignoring any id it carries. Returns the assigned id.
    pub fn add_question(&self, q: &Question) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO questions
            (subject, question_text, question_type, difficulty, taxonomy_type,
             correct_answer, options, explanation, source_file_id,
             times_shown, times_correct, times_incorrect, last_shown_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                q.subject.to_string(),
                q.question_text,
                q.question_type.to_string(),
                q.difficulty.to_string(),
                q.taxonomy_type.to_string(),
                q.correct_answer,
                q.options.as_ref().map(to_json).transpose()?,
                q.explanation,
                q.source_file_id,
                q.times_shown,
                q.times_correct,
                q.times_incorrect,
                q.last_shown_date.map(|d| d.to_rfc3339()),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a batch of questions in one transaction. Either every question
    /// lands or none do.
    pub fn bulk_add_questions(&mut self, questions: &[Question]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(questions.len());

        for q in questions {
            tx.execute(
                r#"
                INSERT INTO questions
                (subject, question_text, question_type, difficulty, taxonomy_type,
                 correct_answer, options, explanation, source_file_id,
                 times_shown, times_correct, times_incorrect, last_shown_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    q.subject.to_string(),
                    q.question_text,
                    q.question_type.to_string(),
                    q.difficulty.to_string(),
                    q.taxonomy_type.to_string(),
                    q.correct_answer,
                    q.options.as_ref().map(to_json).transpose()?,
                    q.explanation,
                    q.source_file_id,
                    q.times_shown,
                    q.times_correct,
                    q.times_incorrect,
                    q.last_shown_date.map(|d| d.to_rfc3339()),
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;
        Ok(ids)
    }

    pub fn question(&self, id: i64) -> Result<Option<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_QUESTION))?;
        let mut rows = stmt.query_map([id], question_from_row)?;
        rows.next().transpose()
    }

    pub fn all_questions(&self) -> Result<Vec<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", SELECT_QUESTION))?;
        let rows = stmt.query_map([], question_from_row)?;
        rows.collect()
    }

    /// Candidate pool for an exam: all questions of a subject, narrowed by
    /// the optional difficulty/type filters and an exclusion list.
    pub fn questions_for_exam(
        &self,
        subject: Subject,
        difficulty: Filter<Difficulty>,
        question_type: Filter<QuestionType>,
        exclude_ids: &[i64],
    ) -> Result<Vec<Question>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE subject = ?1", SELECT_QUESTION))?;
        let rows = stmt.query_map([subject.to_string()], question_from_row)?;

        let mut pool = Vec::new();
        for row in rows {
            let q = row?;
            if difficulty.matches(&q.difficulty)
                && question_type.matches(&q.question_type)
                && !exclude_ids.contains(&q.id)
            {
                pool.push(q);
            }
        }
        Ok(pool)
    }

    pub fn delete_question(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM questions WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Remove every question generated from one source file. Returns the
    /// number of deleted rows.
    pub fn delete_questions_by_source(&self, source_file_id: i64) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM questions WHERE source_file_id = ?1",
            [source_file_id],
        )
    }

    pub fn delete_all_questions(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM questions", [])
    }

    /// Per-subject counts by difficulty and type for the coverage overview.
    pub fn question_bank_summary(&self) -> Result<HashMap<Subject, CoverageCounts>> {
        let mut summary: HashMap<Subject, CoverageCounts> = HashMap::new();
        for q in self.all_questions()? {
            let entry = summary.entry(q.subject).or_default();
            entry.total += 1;
            *entry.by_difficulty.entry(q.difficulty).or_insert(0) += 1;
            *entry.by_type.entry(q.question_type).or_insert(0) += 1;
        }
        Ok(summary)
    }

    // ---- exam attempts ----

    /// Insert an attempt record, ignoring any id it carries. Used at session
    /// start to reserve the placeholder row; returns its id.
    pub fn add_attempt(&self, attempt: &ExamAttempt) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO exam_attempts
            (subject, date, question_ids, score, time_taken, by_difficulty, by_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                attempt.subject.to_string(),
                attempt.date.to_rfc3339(),
                to_json(&attempt.question_ids)?,
                attempt.score,
                attempt.time_taken,
                to_json(&attempt.by_difficulty)?,
                to_json(&attempt.by_type)?,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn attempt(&self, id: i64) -> Result<Option<ExamAttempt>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1", SELECT_ATTEMPT))?;
        let mut rows = stmt.query_map([id], attempt_from_row)?;
        rows.next().transpose()
    }

    pub fn attempts(&self) -> Result<Vec<ExamAttempt>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id", SELECT_ATTEMPT))?;
        let rows = stmt.query_map([], attempt_from_row)?;
        rows.collect()
    }

    /// Attempt history, newest first, optionally narrowed to one subject.
    pub fn exam_history(&self, subject: Option<Subject>) -> Result<Vec<ExamAttempt>> {
        match subject {
            Some(s) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{} WHERE subject = ?1 ORDER BY date DESC",
                    SELECT_ATTEMPT
                ))?;
                let rows = stmt.query_map([s.to_string()], attempt_from_row)?;
                rows.collect()
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{} ORDER BY date DESC", SELECT_ATTEMPT))?;
                let rows = stmt.query_map([], attempt_from_row)?;
                rows.collect()
            }
        }
    }

    /// Delete an attempt and its answer records.
    pub fn delete_attempt(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM user_answers WHERE exam_attempt_id = ?1", [id])?;
        tx.execute("DELETE FROM exam_attempts WHERE id = ?1", [id])?;
        tx.commit()
    }

    // ---- user answers ----

    pub fn add_user_answer(&self, answer: &UserAnswer) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO user_answers
            (exam_attempt_id, question_id, user_answer, is_correct, time_spent, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                answer.exam_attempt_id,
                answer.question_id,
                answer.user_answer,
                answer.is_correct,
                answer.time_spent,
                answer.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn answers_for_attempt(&self, attempt_id: i64) -> Result<Vec<UserAnswer>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, exam_attempt_id, question_id, user_answer, is_correct, time_spent, timestamp
            FROM user_answers
            WHERE exam_attempt_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([attempt_id], |row| {
            Ok(UserAnswer {
                id: row.get(0)?,
                exam_attempt_id: row.get(1)?,
                question_id: row.get(2)?,
                user_answer: row.get(3)?,
                is_correct: row.get(4)?,
                time_spent: row.get(5)?,
                timestamp: timestamp_from_col(6, row.get::<_, String>(6)?)?,
            })
        })?;
        rows.collect()
    }

    pub fn delete_answers_for_attempt(&self, attempt_id: i64) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM user_answers WHERE exam_attempt_id = ?1",
            [attempt_id],
        )
    }

    // ---- submission ----

    /// Persist a full exam submission atomically: one answer row per
    /// question, usage counter bumps, and the final score written onto the
    /// placeholder attempt. A failure rolls everything back.
    pub fn persist_submission(
        &mut self,
        attempt_id: i64,
        score: u32,
        time_taken: u64,
        by_difficulty: &ByDifficulty,
        by_type: &ByType,
        rows: &[SubmissionRow],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        for row in rows {
            tx.execute(
                r#"
                INSERT INTO user_answers
                (exam_attempt_id, question_id, user_answer, is_correct, time_spent, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    attempt_id,
                    row.question_id,
                    row.user_answer,
                    row.is_correct,
                    row.time_spent,
                    row.timestamp.to_rfc3339(),
                ],
            )?;

            tx.execute(
                r#"
                UPDATE questions SET
                    times_shown = times_shown + 1,
                    times_correct = times_correct + ?2,
                    times_incorrect = times_incorrect + ?3,
                    last_shown_date = ?4
                WHERE id = ?1
                "#,
                params![
                    row.question_id,
                    row.is_correct as u32,
                    (!row.is_correct && !row.skipped) as u32,
                    row.timestamp.to_rfc3339(),
                ],
            )?;
        }

        tx.execute(
            r#"
            UPDATE exam_attempts SET
                score = ?2,
                time_taken = ?3,
                by_difficulty = ?4,
                by_type = ?5
            WHERE id = ?1
            "#,
            params![
                attempt_id,
                score,
                time_taken,
                to_json(by_difficulty)?,
                to_json(by_type)?,
            ],
        )?;

        tx.commit()
    }
}

const SELECT_QUESTION: &str = r#"
    SELECT id, subject, question_text, question_type, difficulty, taxonomy_type,
           correct_answer, options, explanation, source_file_id,
           times_shown, times_correct, times_incorrect, last_shown_date
    FROM questions
"#;

const SELECT_ATTEMPT: &str = r#"
    SELECT id, subject, date, question_ids, score, time_taken, by_difficulty, by_type
    FROM exam_attempts
"#;

fn question_from_row(row: &rusqlite::Row<'_>) -> Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        subject: enum_from_col(1, row.get::<_, String>(1)?, &Subject::ALL)?,
        question_text: row.get(2)?,
        question_type: enum_from_col(3, row.get::<_, String>(3)?, &QuestionType::ALL)?,
        difficulty: enum_from_col(4, row.get::<_, String>(4)?, &Difficulty::ALL)?,
        taxonomy_type: enum_from_col(5, row.get::<_, String>(5)?, &TaxonomyType::ALL)?,
        correct_answer: row.get(6)?,
        options: row
            .get::<_, Option<String>>(7)?
            .map(|s| from_json(7, &s))
            .transpose()?,
        explanation: row.get(8)?,
        source_file_id: row.get(9)?,
        times_shown: row.get(10)?,
        times_correct: row.get(11)?,
        times_incorrect: row.get(12)?,
        last_shown_date: row
            .get::<_, Option<String>>(13)?
            .map(|s| timestamp_from_col(13, s))
            .transpose()?,
    })
}

fn attempt_from_row(row: &rusqlite::Row<'_>) -> Result<ExamAttempt> {
    Ok(ExamAttempt {
        id: row.get(0)?,
        subject: enum_from_col(1, row.get::<_, String>(1)?, &Subject::ALL)?,
        date: timestamp_from_col(2, row.get::<_, String>(2)?)?,
        question_ids: from_json(3, &row.get::<_, String>(3)?)?,
        score: row.get(4)?,
        time_taken: row.get(5)?,
        by_difficulty: from_json(6, &row.get::<_, String>(6)?)?,
        by_type: from_json(7, &row.get::<_, String>(7)?)?,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(idx: usize, s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, s.to_string(), rusqlite::types::Type::Text)
    })
}

fn timestamp_from_col(idx: usize, s: String) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Local))
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, s, rusqlite::types::Type::Text))
}

fn enum_from_col<T: Copy + Display>(idx: usize, s: String, all: &[T]) -> Result<T> {
    all.iter()
        .copied()
        .find(|v| v.to_string() == s)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, s, rusqlite::types::Type::Text))
}
