//! Algebra Coach - worksheet tutor
//!
//! CLI entry point for extracting worksheets and tutoring through them.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use algebra_coach::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path, read_document};
use algebra_coach::coach::{Coach, read_worksheet};
use algebra_coach::config::Config;
use algebra_coach::domain::{Confidence, ProblemId, Worksheet};
use algebra_coach::extract::{CommandExtractor, Extractor};
use algebra_coach::repl::TutorRepl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can log
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Log level first, before the full config load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Algebra Coach loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Extract { file, format, output } => cmd_extract(&config, &file, format.as_deref(), output).await,
        Command::Tutor { file, format, problem } => cmd_tutor(&config, &file, format.as_deref(), problem).await,
        Command::Logs { lines } => cmd_logs(lines),
    }
}

/// Extract a worksheet and print its problems
async fn cmd_extract(config: &Config, file: &Path, format: Option<&str>, output: OutputFormat) -> Result<()> {
    debug!(file = %file.display(), ?format, ?output, "cmd_extract: called");
    let document = read_document(file, format)?;
    let extractor = Extractor::new(
        Arc::new(CommandExtractor::from_config(&config.extraction)),
        config.extraction.repeated_line_min_occurrences,
    );
    let worksheet = read_worksheet(&extractor, document)
        .await
        .context(format!("Failed to extract problems from {}", file.display()))?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&worksheet)?),
        OutputFormat::Text => print_worksheet(&worksheet),
    }
    Ok(())
}

fn print_worksheet(worksheet: &Worksheet) {
    let source = &worksheet.source;
    println!(
        "{} {} ({}, {} problems)",
        "Worksheet:".bright_cyan().bold(),
        source.name,
        source.format,
        worksheet.len()
    );
    if source.confidence == Confidence::Low {
        println!("{}", "Low confidence: read with a basic text scan".yellow());
    }
    for warning in &source.warnings {
        println!("{} {}", "!".yellow(), warning);
    }
    println!();

    for problem in worksheet.problems() {
        println!(
            "{} {}",
            format!("{:>5}", problem.id.to_string()).bold(),
            format!("[{}, page {}]", problem.answer.kind, problem.page).dimmed()
        );
        for line in problem.display_text().lines() {
            println!("      {}", line);
        }
        if let Some(reference) = &problem.reference {
            println!("      {}", format!("refers to a {} on page {}", reference.cue, reference.page).dimmed());
        }
        if let Some(expected) = &problem.answer.expected {
            println!("      {} {}", "Answer:".green(), expected);
        }
    }
}

/// Load a worksheet and start the tutoring REPL
async fn cmd_tutor(config: &Config, file: &Path, format: Option<&str>, problem: Option<String>) -> Result<()> {
    debug!(file = %file.display(), ?format, ?problem, "cmd_tutor: called");
    config.validate()?;

    let root = std::env::current_dir().context("Failed to read the current directory")?;
    let coach = Arc::new(Coach::from_config(config, &root)?);

    let document = read_document(file, format)?;
    let worksheet = coach
        .load_worksheet(document)
        .await
        .context(format!("Failed to load {}", file.display()))?;

    let mut repl = TutorRepl::new(coach, worksheet);
    repl.run(problem.as_deref().map(ProblemId::from)).await
}

/// Show the last N log lines
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let all_lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }
    Ok(())
}
