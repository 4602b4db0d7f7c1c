use thiserror::Error;

/// Errors surfaced by the exam engine. Persistence failures during
/// submission use the dedicated `Submission` variant so callers can tell
/// "result computed but not persisted" apart from everything else and
/// retry with the session ledger intact.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error("no questions available for the selected criteria")]
    NoQuestionsAvailable,

    #[error("no questions found in the import payload")]
    EmptyImport,

    #[error("import payload is not a JSON array of questions")]
    MalformedImport(#[from] serde_json::Error),

    #[error("question {index}: field `{field}` is missing or invalid")]
    InvalidQuestion { index: usize, field: &'static str },

    #[error("storage error")]
    Storage(#[from] rusqlite::Error),

    #[error("exam result computed but could not be persisted")]
    Submission(#[source] rusqlite::Error),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("question generation failed: {0}")]
    Generation(String),

    #[error("exam session is already submitting or closed")]
    SessionClosed,
}
