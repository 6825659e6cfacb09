//! HTML report generator.
//!
//! Produces self-contained HTML files with all CSS inlined.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use quizsmith_core::analytics::{LeaderboardEntry, LeaderboardWeights, StudentPerformanceSummary, Trend};
use quizsmith_core::scoring::{Grade, QuestionOutcome};
use quizsmith_core::{Attempt, OptionLabel};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn page(title: &str, body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>quizsmith: {}</title>\n", html_escape(title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str(body);
    html.push_str("</body>\n</html>");
    html
}

fn raw_json<T: Serialize>(value: &T) -> String {
    let mut html = String::new();
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(value).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");
    html
}

fn score_class(percentage: f64) -> &'static str {
    if percentage >= 80.0 {
        "good"
    } else if percentage >= 50.0 {
        "fair"
    } else {
        "poor"
    }
}

fn label_cell(label: Option<OptionLabel>) -> String {
    label
        .map(|l| l.as_char().to_ascii_uppercase().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn percent_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}%")).unwrap_or_else(|| "-".to_string())
}

/// Render one graded attempt with its per-question breakdown.
pub fn render_attempt(attempt: &Attempt, grade: &Grade) -> String {
    let mut body = String::new();

    body.push_str("<header>\n");
    body.push_str(&format!("<h1>{}</h1>\n", html_escape(attempt.title())));
    body.push_str(&format!(
        "<p class=\"meta\">Student: <strong>{}</strong> | Subject: {} | Difficulty: {} | {}</p>\n",
        html_escape(attempt.student_id()),
        html_escape(attempt.subject()),
        attempt.difficulty(),
        attempt.created_at().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body.push_str("</header>\n");

    body.push_str(&format!(
        "<section class=\"score {}\">\n<p class=\"big\">{}/{} ({:.0}%)</p>\n</section>\n",
        score_class(grade.percentage),
        grade.correct,
        grade.total,
        grade.percentage
    ));

    body.push_str("<section>\n<h2>Questions</h2>\n");
    body.push_str("<table>\n");
    body.push_str("<thead><tr><th>#</th><th>Question</th><th>Your answer</th><th>Correct</th><th>Result</th></tr></thead>\n");
    body.push_str("<tbody>\n");
    for ((question, outcome), given) in attempt
        .questions()
        .iter()
        .zip(&grade.outcomes)
        .zip(attempt.user_answers())
    {
        let (class, result) = match outcome {
            QuestionOutcome::Correct => ("pass", "Correct"),
            QuestionOutcome::Incorrect { .. } => ("fail", "Incorrect"),
            QuestionOutcome::Unanswered { .. } => ("fail", "Unanswered"),
            QuestionOutcome::Ungradable => ("skip", "Not graded"),
        };

        let mut cell = format!("<p>{}</p>\n<ol type=\"a\">", html_escape(&question.text));
        for (label, text) in &question.options {
            cell.push_str(&format!(
                "<li value=\"{}\">{}</li>",
                *label as u8 + 1,
                html_escape(text)
            ));
        }
        cell.push_str("</ol>");

        body.push_str(&format!(
            "<tr class=\"{class}\"><td>{}</td><td>{cell}</td><td>{}</td><td>{}</td><td>{result}</td></tr>\n",
            question.number,
            label_cell(*given),
            label_cell(attempt.answer_key().for_question(question.number)),
        ));
    }
    body.push_str("</tbody></table>\n</section>\n");

    if let Some(analysis) = attempt.analysis() {
        body.push_str("<section>\n<h2>Analysis</h2>\n");
        body.push_str(&format!(
            "<div class=\"analysis\">{}</div>\n",
            html_escape(analysis)
        ));
        body.push_str("</section>\n");
    }

    body.push_str(&raw_json(attempt));
    page(attempt.title(), &body)
}

/// Render a student's performance summary.
pub fn render_summary(summary: &StudentPerformanceSummary) -> String {
    let mut body = String::new();

    body.push_str("<header>\n");
    body.push_str(&format!(
        "<h1>Performance: {}</h1>\n",
        html_escape(&summary.student_id)
    ));
    let span = match (summary.first_attempt_at, summary.last_attempt_at) {
        (Some(first), Some(last)) => format!(
            " | {} to {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ),
        _ => String::new(),
    };
    body.push_str(&format!(
        "<p class=\"meta\">{} attempts{}</p>\n",
        summary.attempt_count, span
    ));
    body.push_str("</header>\n");

    body.push_str("<section class=\"dashboard\">\n<h2>Overview</h2>\n");
    body.push_str("<table class=\"summary\">\n<tbody>\n");
    body.push_str(&format!(
        "<tr><th>Average</th><td>{}</td></tr>\n",
        percent_cell(summary.average_percentage)
    ));
    body.push_str(&format!(
        "<tr><th>Best</th><td>{}</td></tr>\n",
        percent_cell(summary.best_percentage)
    ));
    body.push_str(&format!(
        "<tr><th>Latest</th><td>{}</td></tr>\n",
        percent_cell(summary.latest_percentage)
    ));
    let slope = summary
        .trend
        .slope
        .map(|s| format!(" ({s:+.2} points per attempt)"))
        .unwrap_or_default();
    body.push_str(&format!(
        "<tr><th>Trend</th><td class=\"trend-{}\">{}{}</td></tr>\n",
        trend_class(summary.trend.direction),
        summary.trend.direction,
        slope
    ));
    body.push_str("</tbody></table>\n");

    if summary.trend.slope.is_some() {
        body.push_str(&generate_trend_chart(summary));
    }
    body.push_str("</section>\n");

    body.push_str("<section>\n<h2>Subjects</h2>\n");
    if summary.per_subject.is_empty() {
        body.push_str("<p class=\"meta\">No attempts recorded.</p>\n");
    } else {
        body.push_str("<table>\n<thead><tr><th>Subject</th><th>Attempts</th><th>Average</th></tr></thead>\n<tbody>\n");
        for (subject, stats) in &summary.per_subject {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
                html_escape(subject),
                stats.attempts,
                stats.average_percentage
            ));
        }
        body.push_str("</tbody></table>\n");
        body.push_str(&generate_subject_chart(summary));
    }
    body.push_str("</section>\n");

    body.push_str(&raw_json(summary));
    page(&format!("performance of {}", summary.student_id), &body)
}

/// Render the leaderboard, with the weights used to compute it.
pub fn render_leaderboard(entries: &[LeaderboardEntry], weights: &LeaderboardWeights) -> String {
    let mut body = String::new();

    body.push_str("<header>\n<h1>Leaderboard</h1>\n");
    body.push_str(&format!(
        "<p class=\"meta\">Score = notes &times; {} + completed tasks &times; {} + average quiz % &times; {}</p>\n",
        weights.notes, weights.completed_tasks, weights.quiz_percentage
    ));
    body.push_str("</header>\n");

    body.push_str("<section>\n<table>\n");
    body.push_str("<thead><tr><th>Rank</th><th>Student</th><th>Score</th><th>Notes</th><th>Tasks</th><th>Quizzes</th><th>Average</th></tr></thead>\n<tbody>\n");
    for entry in entries {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><strong>{}</strong></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            entry.rank,
            html_escape(&entry.name),
            entry.score,
            entry.notes_count,
            entry.completed_tasks,
            entry.quiz_count,
            percent_cell(entry.average_percentage)
        ));
    }
    body.push_str("</tbody></table>\n</section>\n");

    page("leaderboard", &body)
}

/// Write rendered HTML to a file.
pub fn write_html_report(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn trend_class(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "up",
        Trend::Declining => "down",
        Trend::Flat | Trend::InsufficientData => "flat",
    }
}

/// Fitted trend line over attempt index, on a 0-100% axis.
fn generate_trend_chart(summary: &StudentPerformanceSummary) -> String {
    let width = 480.0;
    let height = 160.0;
    let pad = 24.0;
    let last = summary.attempt_count.saturating_sub(1);

    let y_of = |pct: f64| pad + (height - 2.0 * pad) * (1.0 - pct.clamp(0.0, 100.0) / 100.0);
    let (Some(start), Some(end)) = (summary.trend.fitted(0), summary.trend.fitted(last)) else {
        return String::new();
    };
    let color = match summary.trend.direction {
        Trend::Improving => "#22c55e",
        Trend::Declining => "#ef4444",
        _ => "#6b7280",
    };

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    );
    for pct in [0.0, 50.0, 100.0] {
        svg.push_str(&format!(
            "  <line x1=\"{pad}\" y1=\"{y:.1}\" x2=\"{x2}\" y2=\"{y:.1}\" stroke=\"currentColor\" stroke-opacity=\"0.2\"/>\n",
            y = y_of(pct),
            x2 = width - pad
        ));
        svg.push_str(&format!(
            "  <text x=\"2\" y=\"{:.1}\" font-size=\"10\" fill=\"currentColor\" dominant-baseline=\"middle\">{pct:.0}</text>\n",
            y_of(pct)
        ));
    }
    svg.push_str(&format!(
        "  <line x1=\"{pad}\" y1=\"{:.1}\" x2=\"{}\" y2=\"{:.1}\" stroke=\"{color}\" stroke-width=\"3\"/>\n",
        y_of(start),
        width - pad,
        y_of(end)
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"end\">attempt 1 to {}</text>\n",
        width - pad,
        height - 4.0,
        summary.attempt_count
    ));
    svg.push_str("</svg>\n");
    svg
}

fn generate_subject_chart(summary: &StudentPerformanceSummary) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let total_height = summary.per_subject.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (subject, stats)) in summary.per_subject.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let pct = stats.average_percentage.clamp(0.0, 100.0);
        let width = (pct / 100.0 * max_width as f64) as usize;
        let color = match score_class(pct) {
            "good" => "#22c55e",
            "fair" => "#eab308",
            _ => "#ef4444",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(subject)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.1}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            pct
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --skip: #f3f4f6; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --skip: #1f2937; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.big { font-size: 2.5rem; font-weight: bold; margin: 0.5rem 0; }
.score.good .big, .trend-up { color: #16a34a; }
.score.fair .big { color: #ca8a04; }
.score.poor .big, .trend-down { color: #dc2626; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); }
td p { margin: 0 0 0.25rem 0; }
td ol { margin: 0; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.skip { background: var(--skip); }
.analysis { white-space: pre-wrap; line-height: 1.5; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use quizsmith_core::analytics::{build_leaderboard, summarize, StudentActivity};
    use quizsmith_core::{AnswerKey, Difficulty, Question, Quiz};

    fn make_quiz() -> Quiz {
        let questions = (1..=3)
            .map(|n| Question {
                number: n,
                text: format!("Question <{n}>?"),
                options: OptionLabel::ALL
                    .iter()
                    .map(|l| (*l, format!("choice {l}")))
                    .collect(),
            })
            .collect();
        Quiz::new(
            "Cell biology",
            "biology",
            Difficulty::Medium,
            "notes.txt",
            questions,
            AnswerKey::new(vec![Some(OptionLabel::A), Some(OptionLabel::B), None]),
        )
        .unwrap()
    }

    fn make_attempt(day: u32, answers: Vec<Option<OptionLabel>>) -> (Attempt, Grade) {
        let at = Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap();
        Attempt::grade(&make_quiz(), "alice & bob", answers, at).unwrap()
    }

    #[test]
    fn attempt_report_contains_breakdown() {
        let (attempt, grade) = make_attempt(1, vec![Some(OptionLabel::A), Some(OptionLabel::C), None]);
        let attempt = attempt.with_analysis("Review <mitosis>.");
        let html = render_attempt(&attempt, &grade);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Cell biology"));
        assert!(html.contains("alice &amp; bob"));
        assert!(html.contains("Question &lt;1&gt;?"));
        assert!(html.contains("1/3 (33%)"));
        assert!(html.contains("Not graded"));
        assert!(html.contains("Review &lt;mitosis&gt;."));
        assert!(!html.contains("<mitosis>"));
    }

    #[test]
    fn summary_report_has_charts() {
        let attempts = vec![
            make_attempt(1, vec![Some(OptionLabel::A), None, None]).0,
            make_attempt(2, vec![Some(OptionLabel::A), Some(OptionLabel::B), None]).0,
        ];
        let summary = summarize("alice", &attempts);
        let html = render_summary(&summary);

        assert!(html.contains("Performance: alice"));
        assert!(html.contains("improving"));
        assert!(html.contains("biology"));
        assert_eq!(html.matches("<svg").count(), 2);
    }

    #[test]
    fn empty_summary_renders() {
        let summary = summarize("nobody", std::iter::empty());
        let html = render_summary(&summary);
        assert!(html.contains("No attempts recorded."));
        assert!(html.contains("insufficient data"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn leaderboard_report() {
        let weights = LeaderboardWeights::default();
        let entries = build_leaderboard(
            vec![StudentActivity {
                name: "alice".into(),
                notes_count: 10,
                completed_tasks: 4,
                quiz_count: 3,
                average_percentage: Some(80.0),
            }],
            &weights,
        );
        let html = render_leaderboard(&entries, &weights);
        assert!(html.contains("<strong>78</strong>"));
        assert!(html.contains("80.0%"));
    }

    #[test]
    fn write_to_file() {
        let (attempt, grade) = make_attempt(3, vec![None, None, None]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("attempt.html");

        write_html_report(&render_attempt(&attempt, &grade), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
