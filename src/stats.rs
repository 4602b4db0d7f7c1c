use crate::db::ExamDb;
use crate::error::ExamError;
use crate::model::{ByDifficulty, ByType, Difficulty, ExamAttempt, QuestionType, Subject};
use crate::time_series::{ScorePoint, WeekBucket};
use crate::util::mean;
use chrono::{DateTime, Datelike, Duration, Local};
use itertools::Itertools;
use std::collections::HashMap;

/// Direction of recent scores compared with older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectStats {
    pub exams: usize,
    pub avg_score: u32,
    pub best_score: u32,
    pub last_attempt: Option<DateTime<Local>>,
}

/// Headline analytics over every persisted attempt.
#[derive(Debug, Clone)]
pub struct OverallStats {
    pub total_exams: usize,
    pub average_score: u32,
    pub total_questions_seen: usize,
    pub best_subject: Option<Subject>,
    pub weakest_subject: Option<Subject>,
    pub recent_trend: Trend,
    pub subject_stats: HashMap<Subject, SubjectStats>,
}

/// Difficulty/type breakdowns plus the time-series views. Percentages come
/// from summed corrects over summed totals, not averaged percentages, so a
/// two-question attempt cannot skew the aggregate.
#[derive(Debug, Clone)]
pub struct DetailedStats {
    pub by_difficulty: ByDifficulty,
    pub by_type: ByType,
    pub progress_over_time: Vec<ScorePoint>,
    pub weekly_progress: Vec<WeekBucket>,
}

pub fn overall_stats(db: &ExamDb) -> Result<OverallStats, ExamError> {
    let attempts = db.attempts()?;

    if attempts.is_empty() {
        return Ok(OverallStats {
            total_exams: 0,
            average_score: 0,
            total_questions_seen: 0,
            best_subject: None,
            weakest_subject: None,
            recent_trend: Trend::Stable,
            subject_stats: HashMap::new(),
        });
    }

    let scores: Vec<f64> = attempts.iter().map(|a| a.score as f64).collect();
    let average_score = mean(&scores).unwrap_or(0.0).round() as u32;
    let total_questions_seen = attempts.iter().map(|a| a.question_ids.len()).sum();

    struct Acc {
        exams: usize,
        total_score: u64,
        best_score: u32,
        last_attempt: Option<DateTime<Local>>,
    }
    let mut per_subject: HashMap<Subject, Acc> = HashMap::new();
    for attempt in &attempts {
        let acc = per_subject.entry(attempt.subject).or_insert(Acc {
            exams: 0,
            total_score: 0,
            best_score: 0,
            last_attempt: None,
        });
        acc.exams += 1;
        acc.total_score += attempt.score as u64;
        acc.best_score = acc.best_score.max(attempt.score);
        if acc.last_attempt.map_or(true, |d| attempt.date > d) {
            acc.last_attempt = Some(attempt.date);
        }
    }

    let subject_stats: HashMap<Subject, SubjectStats> = per_subject
        .into_iter()
        .map(|(subject, acc)| {
            (
                subject,
                SubjectStats {
                    exams: acc.exams,
                    avg_score: (acc.total_score as f64 / acc.exams as f64).round() as u32,
                    best_score: acc.best_score,
                    last_attempt: acc.last_attempt,
                },
            )
        })
        .collect();

    // Highest average first; with a single subject best and weakest agree.
    let ranked: Vec<Subject> = subject_stats
        .iter()
        .sorted_by_key(|(_, s)| std::cmp::Reverse(s.avg_score))
        .map(|(subject, _)| *subject)
        .collect();
    let best_subject = ranked.first().copied();
    let weakest_subject = ranked.last().copied();

    Ok(OverallStats {
        total_exams: attempts.len(),
        average_score,
        total_questions_seen,
        best_subject,
        weakest_subject,
        recent_trend: recent_trend(&attempts),
        subject_stats,
    })
}

/// Compare the newest `min(5, n/2)` attempts against everything older.
/// Needs at least 4 attempts, otherwise reports stable.
fn recent_trend(attempts: &[ExamAttempt]) -> Trend {
    if attempts.len() < 4 {
        return Trend::Stable;
    }

    let sorted: Vec<&ExamAttempt> = attempts
        .iter()
        .sorted_by_key(|a| std::cmp::Reverse(a.date))
        .collect();
    let split = 5.min(sorted.len() / 2);
    let recent: Vec<f64> = sorted[..split].iter().map(|a| a.score as f64).collect();
    let previous: Vec<f64> = sorted[split..].iter().map(|a| a.score as f64).collect();

    match (mean(&recent), mean(&previous)) {
        (Some(recent_avg), Some(previous_avg)) if recent_avg > previous_avg + 5.0 => {
            Trend::Improving
        }
        (Some(recent_avg), Some(previous_avg)) if recent_avg < previous_avg - 5.0 => {
            Trend::Declining
        }
        _ => Trend::Stable,
    }
}

pub fn detailed_stats(db: &ExamDb) -> Result<DetailedStats, ExamError> {
    let attempts = db.attempts()?;

    let mut by_difficulty = ByDifficulty::default();
    let mut by_type = ByType::default();
    for attempt in &attempts {
        for difficulty in Difficulty::ALL {
            let tally = by_difficulty.get_mut(difficulty);
            let add = attempt.by_difficulty.get(difficulty);
            tally.correct += add.correct;
            tally.total += add.total;
        }
        for question_type in QuestionType::ALL {
            let tally = by_type.get_mut(question_type);
            let add = attempt.by_type.get(question_type);
            tally.correct += add.correct;
            tally.total += add.total;
        }
    }

    let progress_over_time: Vec<ScorePoint> = attempts
        .iter()
        .sorted_by_key(|a| a.date)
        .map(|a| ScorePoint::new(a.date, a.score, a.subject))
        .collect();

    // Bucket by the Sunday starting each attempt's week.
    let mut weekly: HashMap<chrono::NaiveDate, Vec<u32>> = HashMap::new();
    for attempt in &attempts {
        let date = attempt.date.date_naive();
        let week_start = date - Duration::days(attempt.date.weekday().num_days_from_sunday() as i64);
        weekly.entry(week_start).or_default().push(attempt.score);
    }

    let weekly_progress: Vec<WeekBucket> = weekly
        .into_iter()
        .sorted_by_key(|(week_start, _)| *week_start)
        .map(|(week_start, scores)| {
            let floats: Vec<f64> = scores.iter().map(|&s| s as f64).collect();
            WeekBucket {
                week_start,
                avg_score: mean(&floats).unwrap_or(0.0).round() as u32,
                exams: scores.len(),
            }
        })
        .collect();

    Ok(DetailedStats {
        by_difficulty,
        by_type,
        progress_over_time,
        weekly_progress,
    })
}
