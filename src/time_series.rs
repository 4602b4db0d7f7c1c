use crate::model::Subject;
use chrono::{DateTime, Local, NaiveDate};

/// One exam score on the progress-over-time chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorePoint {
    pub date: DateTime<Local>,
    pub score: u32,
    pub subject: Subject,
}

impl ScorePoint {
    pub fn new(date: DateTime<Local>, score: u32, subject: Subject) -> Self {
        Self {
            date,
            score,
            subject,
        }
    }
}

/// Average score over one calendar week. Weeks start on Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub avg_score: u32,
    pub exams: usize,
}
