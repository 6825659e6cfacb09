//! Performance analytics over stored attempts.
//!
//! Aggregation is streaming: [`PerformanceAccumulator`] consumes one
//! attempt at a time and keeps only running sums, so a student's history
//! never has to fit in memory.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Attempt;
use crate::profile::StudentProfile;
use crate::store::AttemptStore;

/// Slopes smaller than this in magnitude are reported as flat.
pub const FLAT_SLOPE_EPSILON: f64 = 1e-9;

/// Direction of a student's scores over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Flat,
    /// Fewer than two attempts.
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Declining => write!(f, "declining"),
            Trend::Flat => write!(f, "flat"),
            Trend::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// Least-squares fit of percentage against attempt index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub direction: Trend,
    /// Percentage points per attempt. `None` with insufficient data.
    pub slope: Option<f64>,
    /// Fitted percentage at the first attempt.
    pub intercept: Option<f64>,
}

impl TrendReport {
    /// Fitted percentage at a 0-based attempt index.
    pub fn fitted(&self, index: usize) -> Option<f64> {
        Some(self.intercept? + self.slope? * index as f64)
    }
}

/// Average score within one subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectStats {
    pub attempts: usize,
    pub average_percentage: f64,
}

/// Derived view of one student's attempt history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPerformanceSummary {
    pub student_id: String,
    pub attempt_count: usize,
    /// Mean percentage across all attempts; `None` without attempts.
    pub average_percentage: Option<f64>,
    pub best_percentage: Option<f64>,
    pub latest_percentage: Option<f64>,
    pub per_subject: BTreeMap<String, SubjectStats>,
    pub trend: TrendReport,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Running sums for one student's attempts, fed in timestamp order.
#[derive(Debug, Clone)]
pub struct PerformanceAccumulator {
    student_id: String,
    n: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
    best: Option<f64>,
    latest: Option<f64>,
    subjects: BTreeMap<String, (usize, f64)>,
    first_at: Option<DateTime<Utc>>,
    last_at: Option<DateTime<Utc>>,
}

impl PerformanceAccumulator {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            n: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_xx: 0.0,
            sum_xy: 0.0,
            best: None,
            latest: None,
            subjects: BTreeMap::new(),
            first_at: None,
            last_at: None,
        }
    }

    pub fn push(&mut self, attempt: &Attempt) {
        if self.last_at.is_some_and(|last| attempt.created_at() < last) {
            tracing::warn!(
                student = %self.student_id,
                attempt = %attempt.id(),
                "attempt out of timestamp order, trend treats it as the latest"
            );
        }

        let x = self.n as f64;
        let y = attempt.percentage();
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
        self.best = Some(self.best.map_or(y, |b| b.max(y)));
        self.latest = Some(y);

        let entry = self.subjects.entry(attempt.subject().to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += y;

        self.first_at.get_or_insert(attempt.created_at());
        self.last_at = Some(attempt.created_at());
    }

    pub fn finish(self) -> StudentPerformanceSummary {
        let average_percentage = (self.n > 0).then(|| self.sum_y / self.n as f64);
        let per_subject = self
            .subjects
            .iter()
            .map(|(subject, (count, sum))| {
                (
                    subject.clone(),
                    SubjectStats {
                        attempts: *count,
                        average_percentage: sum / *count as f64,
                    },
                )
            })
            .collect();

        StudentPerformanceSummary {
            trend: self.trend(),
            student_id: self.student_id,
            attempt_count: self.n,
            average_percentage,
            best_percentage: self.best,
            latest_percentage: self.latest,
            per_subject,
            first_attempt_at: self.first_at,
            last_attempt_at: self.last_at,
        }
    }

    fn trend(&self) -> TrendReport {
        if self.n < 2 {
            return TrendReport {
                direction: Trend::InsufficientData,
                slope: None,
                intercept: None,
            };
        }

        let n = self.n as f64;
        let denominator = n * self.sum_xx - self.sum_x * self.sum_x;
        let slope = (n * self.sum_xy - self.sum_x * self.sum_y) / denominator;
        let intercept = (self.sum_y - slope * self.sum_x) / n;

        let direction = if slope.abs() < FLAT_SLOPE_EPSILON {
            Trend::Flat
        } else if slope > 0.0 {
            Trend::Improving
        } else {
            Trend::Declining
        };

        TrendReport {
            direction,
            slope: Some(slope),
            intercept: Some(intercept),
        }
    }
}

/// Summarize attempts already in timestamp order.
pub fn summarize<'a>(
    student_id: &str,
    attempts: impl IntoIterator<Item = &'a Attempt>,
) -> StudentPerformanceSummary {
    let mut acc = PerformanceAccumulator::new(student_id);
    for attempt in attempts {
        acc.push(attempt);
    }
    acc.finish()
}

/// Stream a student's attempts from `store` into a summary.
pub fn summarize_student(
    store: &dyn AttemptStore,
    student_id: &str,
) -> anyhow::Result<StudentPerformanceSummary> {
    let mut acc = PerformanceAccumulator::new(student_id);
    for attempt in store.attempts_for(student_id)? {
        acc.push(&attempt?);
    }
    Ok(acc.finish())
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

/// Weights of the leaderboard composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardWeights {
    /// Points per note.
    pub notes: f64,
    /// Points per completed task.
    pub completed_tasks: f64,
    /// Multiplier on average quiz percentage.
    pub quiz_percentage: f64,
}

impl Default for LeaderboardWeights {
    fn default() -> Self {
        Self {
            notes: 5.0,
            completed_tasks: 3.0,
            quiz_percentage: 0.2,
        }
    }
}

/// Inputs to one student's composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentActivity {
    pub name: String,
    pub notes_count: u32,
    pub completed_tasks: u32,
    pub quiz_count: usize,
    pub average_percentage: Option<f64>,
}

impl StudentActivity {
    pub fn new(profile: &StudentProfile, summary: Option<&StudentPerformanceSummary>) -> Self {
        Self {
            name: profile.name.clone(),
            notes_count: profile.notes_count,
            completed_tasks: profile.completed_tasks,
            quiz_count: summary.map_or(0, |s| s.attempt_count),
            average_percentage: summary.and_then(|s| s.average_percentage),
        }
    }
}

/// `notes * w_notes + tasks * w_tasks + avg_pct * w_pct`, truncated.
///
/// The quiz term only applies when the student has taken a quiz.
pub fn composite_score(activity: &StudentActivity, weights: &LeaderboardWeights) -> i64 {
    let quiz_term = match activity.average_percentage {
        Some(avg) if activity.quiz_count > 0 => avg * weights.quiz_percentage,
        _ => 0.0,
    };
    let total = activity.notes_count as f64 * weights.notes
        + activity.completed_tasks as f64 * weights.completed_tasks
        + quiz_term;
    // 1e-9 absorbs binary rounding in products like 35 * 0.2 before truncation
    (total + 1e-9).trunc() as i64
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub name: String,
    pub score: i64,
    pub notes_count: u32,
    pub completed_tasks: u32,
    pub quiz_count: usize,
    pub average_percentage: Option<f64>,
}

/// Rank students by composite score, highest first; ties by name.
pub fn build_leaderboard(
    activities: impl IntoIterator<Item = StudentActivity>,
    weights: &LeaderboardWeights,
) -> Vec<LeaderboardEntry> {
    let mut scored: Vec<(i64, StudentActivity)> = activities
        .into_iter()
        .map(|a| (composite_score(&a, weights), a))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.name.cmp(&b.name)));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, a))| LeaderboardEntry {
            rank: i + 1,
            name: a.name,
            score,
            notes_count: a.notes_count,
            completed_tasks: a.completed_tasks,
            quiz_count: a.quiz_count,
            average_percentage: a.average_percentage,
        })
        .collect()
}

/// Combine a roster with stored quiz history.
///
/// Students who only appear in the store get zero notes and tasks.
pub fn gather_activity(
    store: &dyn AttemptStore,
    roster: &[StudentProfile],
) -> anyhow::Result<Vec<StudentActivity>> {
    let mut names: BTreeSet<String> = roster.iter().map(|p| p.name.clone()).collect();
    names.extend(store.students()?);

    let mut activities = Vec::with_capacity(names.len());
    for name in names {
        let profile = roster
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .unwrap_or_else(|| StudentProfile::new(name.clone()));
        let summary = summarize_student(store, &name)?;
        activities.push(StudentActivity::new(&profile, Some(&summary)));
    }
    Ok(activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::quiz_with_key;
    use crate::model::OptionLabel::{self, *};
    use crate::model::Quiz;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    /// A graded attempt at `percent` on a 10-question quiz.
    fn attempt_at(student: &str, subject: &str, percent: usize, day: i64) -> Attempt {
        let base = quiz_with_key(&[Some(A); 10]);
        let quiz = Quiz::new(
            "t",
            subject,
            base.difficulty,
            "inline",
            base.questions().to_vec(),
            base.answer_key().clone(),
        )
        .unwrap();
        let correct = percent / 10;
        let answers: Vec<Option<OptionLabel>> = (0..10)
            .map(|i| if i < correct { Some(A) } else { Some(B) })
            .collect();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(day);
        Attempt::grade(&quiz, student, answers, at).unwrap().0
    }

    fn history(percents: &[usize]) -> Vec<Attempt> {
        percents
            .iter()
            .enumerate()
            .map(|(i, p)| attempt_at("alice", "biology", *p, i as i64))
            .collect()
    }

    #[test]
    fn rising_scores_are_improving() {
        let summary = summarize("alice", &history(&[50, 60, 70]));
        assert_eq!(summary.trend.direction, Trend::Improving);
        assert!((summary.trend.slope.unwrap() - 10.0).abs() < 1e-9);
        assert!((summary.trend.fitted(0).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn falling_scores_are_declining() {
        let summary = summarize("alice", &history(&[70, 60, 50]));
        assert_eq!(summary.trend.direction, Trend::Declining);
        assert!((summary.trend.slope.unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn single_attempt_is_insufficient() {
        let summary = summarize("alice", &history(&[80]));
        assert_eq!(summary.trend.direction, Trend::InsufficientData);
        assert_eq!(summary.trend.slope, None);
        assert_eq!(summary.trend.direction.to_string(), "insufficient data");
        assert_eq!(summary.average_percentage, Some(80.0));
    }

    #[test]
    fn constant_scores_are_flat() {
        let summary = summarize("alice", &history(&[60, 60, 60, 60]));
        assert_eq!(summary.trend.direction, Trend::Flat);
    }

    #[test]
    fn empty_history() {
        let summary = summarize("nobody", std::iter::empty());
        assert_eq!(summary.attempt_count, 0);
        assert_eq!(summary.average_percentage, None);
        assert!(summary.per_subject.is_empty());
        assert_eq!(summary.trend.direction, Trend::InsufficientData);
    }

    #[test]
    fn per_subject_averages() {
        let attempts = vec![
            attempt_at("alice", "biology", 80, 0),
            attempt_at("alice", "history", 40, 1),
            attempt_at("alice", "biology", 60, 2),
        ];
        let summary = summarize("alice", &attempts);
        assert_eq!(summary.attempt_count, 3);
        assert_eq!(summary.per_subject["biology"].attempts, 2);
        assert_eq!(summary.per_subject["biology"].average_percentage, 70.0);
        assert_eq!(summary.per_subject["history"].average_percentage, 40.0);
        assert_eq!(summary.best_percentage, Some(80.0));
        assert_eq!(summary.latest_percentage, Some(60.0));
        assert_eq!(summary.first_attempt_at, Some(attempts[0].created_at()));
    }

    #[test]
    fn streams_from_store() {
        let store = MemoryStore::new();
        for a in history(&[70, 60, 50]).into_iter().rev() {
            store.save(&a).unwrap();
        }
        let summary = summarize_student(&store, "alice").unwrap();
        assert_eq!(summary.attempt_count, 3);
        assert_eq!(summary.trend.direction, Trend::Declining);
    }

    fn activity(name: &str, notes: u32, tasks: u32, quizzes: usize, avg: Option<f64>) -> StudentActivity {
        StudentActivity {
            name: name.into(),
            notes_count: notes,
            completed_tasks: tasks,
            quiz_count: quizzes,
            average_percentage: avg,
        }
    }

    #[test]
    fn composite_score_default_weights() {
        let a = activity("alice", 10, 4, 3, Some(80.0));
        assert_eq!(composite_score(&a, &LeaderboardWeights::default()), 78);
    }

    #[test]
    fn composite_score_truncates_and_ignores_quiz_without_attempts() {
        let weights = LeaderboardWeights::default();
        assert_eq!(composite_score(&activity("a", 0, 0, 1, Some(67.0)), &weights), 13);
        assert_eq!(composite_score(&activity("b", 1, 1, 0, Some(90.0)), &weights), 8);
        assert_eq!(composite_score(&activity("c", 0, 0, 2, Some(35.0)), &weights), 7);
    }

    #[test]
    fn custom_weights() {
        let weights = LeaderboardWeights {
            notes: 1.0,
            completed_tasks: 10.0,
            quiz_percentage: 0.0,
        };
        assert_eq!(composite_score(&activity("a", 3, 2, 1, Some(100.0)), &weights), 23);
    }

    #[test]
    fn leaderboard_orders_by_score_then_name() {
        let board = build_leaderboard(
            vec![
                activity("carol", 1, 0, 0, None),
                activity("bob", 2, 0, 0, None),
                activity("alice", 2, 0, 0, None),
            ],
            &LeaderboardWeights::default(),
        );
        let names: Vec<_> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
        assert_eq!(board[2].score, 5);
    }

    #[test]
    fn gather_merges_roster_and_store() {
        let store = MemoryStore::new();
        store.save(&attempt_at("dave", "math", 90, 0)).unwrap();
        store.save(&attempt_at("alice", "math", 50, 0)).unwrap();
        let roster = vec![
            StudentProfile {
                name: "alice".into(),
                notes_count: 2,
                completed_tasks: 1,
            },
            StudentProfile::new("erin"),
        ];

        let activities = gather_activity(&store, &roster).unwrap();
        let names: Vec<_> = activities.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "dave", "erin"]);
        assert_eq!(activities[0].notes_count, 2);
        assert_eq!(activities[0].average_percentage, Some(50.0));
        assert_eq!(activities[1].quiz_count, 1);
        assert_eq!(activities[2].quiz_count, 0);

        let board = build_leaderboard(activities, &LeaderboardWeights::default());
        assert_eq!(board[0].name, "alice");
        assert_eq!(board[0].score, 23);
        assert_eq!(board[1].name, "dave");
        assert_eq!(board[1].score, 18);
        assert_eq!(board[2].score, 0);
    }

    #[test]
    fn weights_deserialize_with_defaults() {
        let weights: LeaderboardWeights = toml::from_str("notes = 2.0").unwrap();
        assert_eq!(weights.notes, 2.0);
        assert_eq!(weights.completed_tasks, 3.0);
        assert_eq!(weights.quiz_percentage, 0.2);
    }
}
