//! The `quizsmith stats` command.

use std::path::PathBuf;

use anyhow::Result;

use quizsmith_core::analytics::{summarize_student, StudentPerformanceSummary};
use quizsmith_core::store::AttemptStore;
use quizsmith_providers::load_config_from;
use quizsmith_report::{render_summary, write_html_report};

use super::{fmt_percent, open_store, Format};

pub fn execute(
    student: Option<String>,
    format: String,
    output: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let format = Format::parse(&format)?;
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_dir);

    let students = match student {
        Some(s) => vec![s],
        None => store.students()?,
    };
    if students.is_empty() {
        println!("No attempts stored in {}", store.root().display());
        return Ok(());
    }

    let summaries = students
        .iter()
        .map(|s| summarize_student(&store, s))
        .collect::<Result<Vec<_>>>()?;

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Format::Html => {
            anyhow::ensure!(
                summaries.len() == 1,
                "HTML output covers one student; pass --student"
            );
            let path = output.unwrap_or_else(|| PathBuf::from("stats.html"));
            write_html_report(&render_summary(&summaries[0]), &path)?;
            println!("Report written to {}", path.display());
        }
        Format::Text => {
            for summary in &summaries {
                print_summary(summary);
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &StudentPerformanceSummary) {
    use comfy_table::{Cell, Table};

    println!(
        "{}: {} attempts, average {}, best {}, latest {}, trend {}",
        summary.student_id,
        summary.attempt_count,
        fmt_percent(summary.average_percentage),
        fmt_percent(summary.best_percentage),
        fmt_percent(summary.latest_percentage),
        summary.trend.direction
    );

    if summary.per_subject.is_empty() {
        println!();
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Subject", "Attempts", "Average"]);
    for (subject, stats) in &summary.per_subject {
        table.add_row(vec![
            Cell::new(subject),
            Cell::new(stats.attempts),
            Cell::new(format!("{:.1}%", stats.average_percentage)),
        ]);
    }
    println!("{table}\n");
}
