//! The `quizsmith init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_once(Path::new("quizsmith.toml"), SAMPLE_CONFIG)?;
    write_once(Path::new("roster.toml"), SAMPLE_ROSTER)?;

    std::fs::create_dir_all("material")?;
    write_once(Path::new("material/photosynthesis.md"), SAMPLE_MATERIAL)?;

    println!("\nNext steps:");
    println!("  1. Set QUIZSMITH_GROQ_KEY or edit quizsmith.toml with your API keys");
    println!("  2. Run: quizsmith generate --content material/photosynthesis.md -n 5 --subject biology");
    println!("  3. Run: quizsmith grade --quiz quiz.json --student alice");
    println!("  4. Run: quizsmith leaderboard");

    Ok(())
}

fn write_once(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizsmith configuration

default_provider = "groq"
default_model = "llama-3.3-70b-versatile"
temperature = 0.7
max_tokens = 4096
timeout_secs = 120
max_retries = 2
max_questions = 20
store_dir = "./quizsmith-data"
roster = "roster.toml"

[leaderboard]
notes = 5.0
completed_tasks = 3.0
quiz_percentage = 0.2

[providers.groq]
type = "groq"
api_key = "${GROQ_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#;

const SAMPLE_ROSTER: &str = r#"# Notes and completed tasks per student, used by the leaderboard.

[[students]]
name = "alice"
notes_count = 12
completed_tasks = 5

[[students]]
name = "bob"
notes_count = 4
completed_tasks = 9
"#;

const SAMPLE_MATERIAL: &str = r#"# Photosynthesis

Photosynthesis is the process by which green plants, algae and some bacteria
convert light energy into chemical energy. It takes place mainly in the
chloroplasts of leaf cells, which contain the green pigment chlorophyll.

The overall reaction combines carbon dioxide and water, using light energy,
to produce glucose and oxygen:

    6 CO2 + 6 H2O + light -> C6H12O6 + 6 O2

Photosynthesis has two stages. The light-dependent reactions happen in the
thylakoid membranes. They split water, release oxygen, and produce ATP and
NADPH. The light-independent reactions, also called the Calvin cycle, happen
in the stroma. They use ATP and NADPH to fix carbon dioxide into sugars.

Factors that limit the rate of photosynthesis include light intensity, carbon
dioxide concentration and temperature. Raising any one of them increases the
rate until another factor becomes limiting.
"#;
