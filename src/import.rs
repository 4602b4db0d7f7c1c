use crate::db::ExamDb;
use crate::error::ExamError;
use crate::model::{Difficulty, Filter, Question, QuestionType, Subject, TaxonomyType};
use serde_json::Value;

/// Question content as produced by the generator or pasted by the user,
/// before it is stamped with a subject and source file.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub question_text: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub taxonomy_type: TaxonomyType,
    pub correct_answer: String,
    pub options: Option<Vec<String>>,
    pub explanation: String,
}

/// Output of the external OCR/PDF text extraction collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub page_count: Option<u32>,
}

/// Opaque text extraction seam. Failures carry a descriptive message and
/// surface as `ExamError::Extraction`.
pub trait TextExtractor {
    fn extract(&self, file_bytes: &[u8]) -> Result<Extracted, ExamError>;
}

/// What the caller asks the external LLM collaborator for.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub subject: Subject,
    pub question_count: usize,
    pub difficulty: Filter<Difficulty>,
    pub question_type: Filter<QuestionType>,
}

/// Opaque question generation seam. Output is treated as already-validated
/// content needing only subject/source stamping; failures surface as
/// `ExamError::Generation` with the raw message.
pub trait QuestionGenerator {
    fn generate(
        &self,
        source_text: &str,
        request: &GenerationRequest,
    ) -> Result<Vec<QuestionDraft>, ExamError>;
}

/// Parse a pasted question batch. The payload may be wrapped in prose (an
/// LLM answer, say); the first `[ ... ]` span is taken as the JSON array.
///
/// Validation is atomic: the first invalid item rejects the whole batch,
/// reported with its 1-based position and the offending field, so a partial
/// import can never happen.
pub fn parse_question_batch(text: &str) -> Result<Vec<QuestionDraft>, ExamError> {
    let slice = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    let items: Vec<Value> = serde_json::from_str(slice)?;
    if items.is_empty() {
        return Err(ExamError::EmptyImport);
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_item(i + 1, item))
        .collect()
}

fn validate_item(index: usize, item: &Value) -> Result<QuestionDraft, ExamError> {
    let invalid = |field: &'static str| ExamError::InvalidQuestion { index, field };

    let question_text = required_str(item, "questionText").ok_or_else(|| invalid("questionText"))?;
    let correct_answer = required_str(item, "correctAnswer").ok_or_else(|| invalid("correctAnswer"))?;

    let question_type = match item.get("questionType").and_then(Value::as_str) {
        Some("multiple_choice") => QuestionType::MultipleChoice,
        Some("short_answer") => QuestionType::ShortAnswer,
        Some("fill_in") => QuestionType::FillIn,
        _ => return Err(invalid("questionType")),
    };

    let difficulty = match item.get("difficulty").and_then(Value::as_str) {
        Some("easy") => Difficulty::Easy,
        Some("medium") => Difficulty::Medium,
        Some("hard") => Difficulty::Hard,
        _ => return Err(invalid("difficulty")),
    };

    // Optional with a recall default; unknown values fall back the same way.
    let taxonomy_type = match item.get("taxonomyType").and_then(Value::as_str) {
        Some("conceptual") => TaxonomyType::Conceptual,
        Some("application") => TaxonomyType::Application,
        _ => TaxonomyType::Recall,
    };

    let options = if question_type == QuestionType::MultipleChoice {
        let opts = item
            .get("options")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Some(opts)
    } else {
        None
    };

    let explanation = item
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(QuestionDraft {
        question_text,
        question_type,
        difficulty,
        taxonomy_type,
        correct_answer,
        options,
        explanation,
    })
}

fn required_str(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate a pasted batch and insert it for one subject. Manually imported
/// questions carry no source file (id 0). All-or-nothing.
pub fn import_questions(
    db: &mut ExamDb,
    subject: Subject,
    text: &str,
) -> Result<Vec<i64>, ExamError> {
    let drafts = parse_question_batch(text)?;
    ingest_generated(db, subject, 0, &drafts)
}

/// Stamp generator output with its subject and source file and persist it
/// in one transaction.
pub fn ingest_generated(
    db: &mut ExamDb,
    subject: Subject,
    source_file_id: i64,
    drafts: &[QuestionDraft],
) -> Result<Vec<i64>, ExamError> {
    let questions: Vec<Question> = drafts
        .iter()
        .map(|d| stamp(d.clone(), subject, source_file_id))
        .collect();
    Ok(db.bulk_add_questions(&questions)?)
}

fn stamp(draft: QuestionDraft, subject: Subject, source_file_id: i64) -> Question {
    Question {
        id: 0,
        subject,
        question_text: draft.question_text,
        question_type: draft.question_type,
        difficulty: draft.difficulty,
        taxonomy_type: draft.taxonomy_type,
        correct_answer: draft.correct_answer,
        options: draft.options,
        explanation: draft.explanation,
        source_file_id,
        times_shown: 0,
        times_correct: 0,
        times_incorrect: 0,
        last_shown_date: None,
    }
}
