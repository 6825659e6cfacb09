//! quizsmith CLI — generate quizzes from study material, grade attempts,
//! and report on student performance.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quizsmith", version, about = "Quiz generation and scoring from study material")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a quiz from a text file
    Generate {
        /// Study material to build questions from
        #[arg(long)]
        content: PathBuf,

        /// Number of questions
        #[arg(long, short = 'n', default_value = "5")]
        questions: usize,

        /// Difficulty: easy, medium, hard
        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Quiz title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Subject used for per-subject statistics
        #[arg(long, default_value = "general")]
        subject: String,

        /// Where to write the quiz JSON
        #[arg(long, short = 'o', default_value = "quiz.json")]
        output: PathBuf,

        /// Provider name from the config file
        #[arg(long)]
        provider: Option<String>,

        /// Model id
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Answer a generated quiz, grade it and store the attempt
    Grade {
        /// Quiz JSON written by `generate`
        #[arg(long)]
        quiz: PathBuf,

        /// Student id the attempt is recorded under
        #[arg(long)]
        student: String,

        /// Answers in question order, e.g. "a,c,,d". Prompts on stdin if omitted
        #[arg(long)]
        answers: Option<String>,

        /// Ask the model for a written review of the attempt
        #[arg(long)]
        analyze: bool,

        /// Also write an HTML report of the attempt
        #[arg(long)]
        html: Option<PathBuf>,

        /// Attempt store directory (overrides the config file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Provider name from the config file
        #[arg(long)]
        provider: Option<String>,

        /// Model id
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show performance statistics
    Stats {
        /// Student id (all stored students if omitted)
        #[arg(long)]
        student: Option<String>,

        /// Output format: text, json, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (html only)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Attempt store directory (overrides the config file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rank students by notes, tasks and quiz results
    Leaderboard {
        /// Student roster TOML (overrides the config file)
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Show only the first N entries
        #[arg(long)]
        top: Option<usize>,

        /// Output format: text, json, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (html only)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Attempt store directory (overrides the config file)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config, roster and sample material
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizsmith=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            content,
            questions,
            difficulty,
            title,
            subject,
            output,
            provider,
            model,
            config,
        } => {
            commands::generate::execute(
                content, questions, difficulty, title, subject, output, provider, model, config,
            )
            .await
        }
        Commands::Grade {
            quiz,
            student,
            answers,
            analyze,
            html,
            store,
            provider,
            model,
            config,
        } => {
            commands::grade::execute(
                quiz, student, answers, analyze, html, store, provider, model, config,
            )
            .await
        }
        Commands::Stats {
            student,
            format,
            output,
            store,
            config,
        } => commands::stats::execute(student, format, output, store, config),
        Commands::Leaderboard {
            roster,
            top,
            format,
            output,
            store,
            config,
        } => commands::leaderboard::execute(roster, top, format, output, store, config),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
