//! quizsmith-report — self-contained HTML reports.
//!
//! Renders a graded attempt, a student's performance summary and the
//! leaderboard as single HTML files with inlined CSS and SVG charts.

pub mod html;

pub use html::{render_attempt, render_leaderboard, render_summary, write_html_report};
