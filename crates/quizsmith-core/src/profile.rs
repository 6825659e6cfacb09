//! Student profiles consumed by the leaderboard.
//!
//! Profiles are owned elsewhere; this crate only reads a TOML roster:
//!
//! ```toml
//! [[students]]
//! name = "alice"
//! notes_count = 10
//! completed_tasks = 4
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Note and task counts for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    #[serde(default)]
    pub notes_count: u32,
    #[serde(default)]
    pub completed_tasks: u32,
}

impl StudentProfile {
    /// A profile with no notes and no tasks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes_count: 0,
            completed_tasks: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Roster {
    #[serde(default)]
    students: Vec<StudentProfile>,
}

/// Parse a roster document.
pub fn parse_roster(content: &str) -> Result<Vec<StudentProfile>> {
    let roster: Roster = toml::from_str(content).context("failed to parse student roster")?;
    let mut seen = std::collections::HashSet::new();
    for student in &roster.students {
        anyhow::ensure!(!student.name.trim().is_empty(), "roster entry with empty name");
        anyhow::ensure!(
            seen.insert(student.name.as_str()),
            "student '{}' listed twice in roster",
            student.name
        );
    }
    Ok(roster.students)
}

/// Load a roster file.
pub fn load_roster(path: &Path) -> Result<Vec<StudentProfile>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster from {}", path.display()))?;
    parse_roster(&content)
}
