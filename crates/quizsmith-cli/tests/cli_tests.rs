//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use quizsmith_core::{AnswerKey, Difficulty, OptionLabel, Question, Quiz};

fn quizsmith(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("quizsmith").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("QUIZSMITH_GROQ_KEY")
        .env_remove("QUIZSMITH_OPENAI_KEY")
        .env_remove("QUIZSMITH_ANTHROPIC_KEY");
    cmd
}

/// Write a three-question quiz (key a, b, unknown) to `quiz.json`.
fn write_quiz(dir: &Path) {
    let questions = (1..=3)
        .map(|number| Question {
            number,
            text: format!("Question {number}?"),
            options: OptionLabel::ALL
                .iter()
                .map(|l| (*l, format!("choice {l}")))
                .collect(),
        })
        .collect();
    let quiz = Quiz::new(
        "Cells",
        "biology",
        Difficulty::Easy,
        "notes.md",
        questions,
        AnswerKey::new(vec![Some(OptionLabel::A), Some(OptionLabel::B), None]),
    )
    .unwrap();
    let doc = serde_json::json!({ "quiz": quiz, "content": "Cells are the unit of life." });
    std::fs::write(dir.join("quiz.json"), doc.to_string()).unwrap();
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("grade"))
        .stdout(predicate::str::contains("leaderboard"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    quizsmith(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created quizsmith.toml"))
        .stdout(predicate::str::contains("Created roster.toml"));

    assert!(dir.path().join("material/photosynthesis.md").exists());
    let config = std::fs::read_to_string(dir.path().join("quizsmith.toml")).unwrap();
    assert!(config.contains("[providers.groq]"));

    quizsmith(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_config_is_loadable() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path()).arg("init").assert().success();

    // The sample roster is picked up through the config file.
    quizsmith(dir.path())
        .arg("leaderboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("bob"));
}

#[test]
fn grade_stores_attempt() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    quizsmith(dir.path())
        .args(["grade", "--quiz", "quiz.json", "--student", "alice", "--answers", "a,c,b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 1/3 (33%)"))
        .stdout(predicate::str::contains("Q2: Incorrect (Correct: B)"))
        .stdout(predicate::str::contains("Q3: Not graded"));

    let stored = std::fs::read_dir(dir.path().join("quizsmith-data/alice")).unwrap();
    assert_eq!(stored.count(), 1);
}

#[test]
fn grade_reads_answers_from_stdin() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    quizsmith(dir.path())
        .args(["grade", "--quiz", "quiz.json", "--student", "bob"])
        .write_stdin("a\nz\nb\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 2/3"))
        .stdout(predicate::str::contains("invalid answer"));
}

#[test]
fn grade_writes_html_report() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    quizsmith(dir.path())
        .args([
            "grade", "--quiz", "quiz.json", "--student", "alice", "--answers", "a,b",
            "--html", "reports/attempt.html",
        ])
        .assert()
        .success();

    let html = std::fs::read_to_string(dir.path().join("reports/attempt.html")).unwrap();
    assert!(html.contains("Cells"));
}

#[test]
fn grade_rejects_too_many_answers() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    quizsmith(dir.path())
        .args(["grade", "--quiz", "quiz.json", "--student", "alice", "--answers", "a,b,c,d"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("4 answers given"));

    assert!(!dir.path().join("quizsmith-data").exists());
}

#[test]
fn grade_rejects_invalid_label() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    quizsmith(dir.path())
        .args(["grade", "--quiz", "quiz.json", "--student", "alice", "--answers", "a,x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn stats_after_grading() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());

    for answers in ["c,c", "a,c", "a,b"] {
        quizsmith(dir.path())
            .args(["grade", "--quiz", "quiz.json", "--student", "alice", "--answers", answers])
            .assert()
            .success();
    }

    quizsmith(dir.path())
        .args(["stats", "--student", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 attempts"))
        .stdout(predicate::str::contains("trend improving"))
        .stdout(predicate::str::contains("biology"));

    let output = quizsmith(dir.path())
        .args(["stats", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["student_id"], "alice");
    assert_eq!(json[0]["attempt_count"], 3);
}

#[test]
fn stats_empty_store() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("No attempts stored"));
}

#[test]
fn stats_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path())
        .args(["stats", "--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn leaderboard_combines_roster_and_history() {
    let dir = TempDir::new().unwrap();
    write_quiz(dir.path());
    std::fs::write(
        dir.path().join("roster.toml"),
        "[[students]]\nname = \"bob\"\nnotes_count = 1\n\n[[students]]\nname = \"alice\"\nnotes_count = 1\n",
    )
    .unwrap();

    quizsmith(dir.path())
        .args(["grade", "--quiz", "quiz.json", "--student", "alice", "--answers", "a,b"])
        .assert()
        .success();

    // alice: 5 + 67 * 0.2 = 18; bob: 5.
    let output = quizsmith(dir.path())
        .args(["leaderboard", "--roster", "roster.toml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["name"], "alice");
    assert_eq!(json[0]["score"], 18);
    assert_eq!(json[1]["name"], "bob");
    assert_eq!(json[1]["score"], 5);

    quizsmith(dir.path())
        .args(["leaderboard", "--roster", "roster.toml", "--format", "html", "-o", "board.html"])
        .assert()
        .success();
    assert!(dir.path().join("board.html").exists());
}

#[test]
fn leaderboard_empty() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path())
        .arg("leaderboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("No students found"));
}

#[test]
fn generate_rejects_short_content() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "Too short to quiz on.").unwrap();

    quizsmith(dir.path())
        .args(["generate", "--content", "notes.md", "-n", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient content"));
}

#[test]
fn generate_rejects_too_many_questions() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "word ".repeat(100)).unwrap();

    quizsmith(dir.path())
        .args(["generate", "--content", "notes.md", "-n", "50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid question count"));
}

#[test]
fn generate_without_provider_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "word ".repeat(100)).unwrap();

    quizsmith(dir.path())
        .args(["generate", "--content", "notes.md", "-n", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn generate_rejects_unknown_difficulty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.md"), "word ".repeat(100)).unwrap();

    quizsmith(dir.path())
        .args(["generate", "--content", "notes.md", "--difficulty", "extreme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown difficulty"));
}

#[test]
fn list_models_without_config() {
    let dir = TempDir::new().unwrap();
    quizsmith(dir.path())
        .arg("list-models")
        .assert()
        .success()
        .stdout(predicate::str::contains("No providers configured"));
}
