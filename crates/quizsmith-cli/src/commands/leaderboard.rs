//! The `quizsmith leaderboard` command.

use std::path::PathBuf;

use anyhow::Result;

use quizsmith_core::analytics::{build_leaderboard, gather_activity};
use quizsmith_core::profile::load_roster;
use quizsmith_providers::load_config_from;
use quizsmith_report::{render_leaderboard, write_html_report};

use super::{fmt_percent, open_store, Format};

pub fn execute(
    roster_path: Option<PathBuf>,
    top: Option<usize>,
    format: String,
    output: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let format = Format::parse(&format)?;
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config, store_dir);

    let roster = match roster_path.or_else(|| config.roster.clone()) {
        Some(path) => load_roster(&path)?,
        None => Vec::new(),
    };

    let weights = config.leaderboard;
    let mut entries = build_leaderboard(gather_activity(&store, &roster)?, &weights);
    if let Some(n) = top {
        entries.truncate(n);
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        Format::Html => {
            let path = output.unwrap_or_else(|| PathBuf::from("leaderboard.html"));
            write_html_report(&render_leaderboard(&entries, &weights), &path)?;
            println!("Report written to {}", path.display());
        }
        Format::Text => {
            if entries.is_empty() {
                println!("No students found. Add a roster or grade some attempts first.");
                return Ok(());
            }

            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.set_header(vec!["Rank", "Student", "Score", "Notes", "Tasks", "Quizzes", "Average"]);
            for entry in &entries {
                table.add_row(vec![
                    Cell::new(entry.rank),
                    Cell::new(&entry.name),
                    Cell::new(entry.score),
                    Cell::new(entry.notes_count),
                    Cell::new(entry.completed_tasks),
                    Cell::new(entry.quiz_count),
                    Cell::new(fmt_percent(entry.average_percentage)),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
