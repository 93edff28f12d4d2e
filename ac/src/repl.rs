//! Interactive tutoring REPL
//!
//! Plain text is submitted as an attempt at the current problem; slash
//! commands ask for hints or questions, reveal an answer, move between
//! problems and show progress.

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::coach::Coach;
use crate::domain::{AnswerKind, Confidence, Problem, ProblemId, ProblemStatus, TurnKind, TurnRole, Worksheet};
use crate::error::{CoachError, ErrorKind};
use crate::session::TurnResult;

enum SlashResult {
    Continue,
    Quit,
}

/// REPL over one loaded worksheet
pub struct TutorRepl {
    coach: Arc<Coach>,
    worksheet: Arc<Worksheet>,
    current: Option<ProblemId>,
}

impl TutorRepl {
    pub fn new(coach: Arc<Coach>, worksheet: Arc<Worksheet>) -> Self {
        Self {
            coach,
            worksheet,
            current: None,
        }
    }

    /// Run the REPL main loop, closing the worksheet on exit
    pub async fn run(&mut self, start: Option<ProblemId>) -> Result<()> {
        debug!(worksheet_id = %self.worksheet.id, ?start, "run: called");
        self.print_welcome();

        match start {
            Some(id) => self.open_problem(&id).await,
            None => self.advance().await,
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = match &self.current {
                Some(id) => format!("{} ", format!("{}>", id).bright_green()),
                None => format!("{} ", ">".bright_green()),
            };

            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.submit(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        let summary = self.coach.close_worksheet(&self.worksheet.id).await?;
        println!();
        println!("{} {}", "Final progress:".bright_cyan().bold(), summary);
        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        let source = &self.worksheet.source;
        println!();
        println!("{}", "Algebra Coach".bright_cyan().bold());
        println!("Worksheet: {} ({} problems)", source.name, self.worksheet.len());
        if source.confidence == Confidence::Low {
            println!("{}", "Some text may be missing: the worksheet was read with a basic scan.".yellow());
        }
        for warning in &source.warnings {
            println!("{} {}", "!".yellow(), warning.dimmed());
        }
        println!("Type your answer, {} for a hint, {} for help", "/hint".yellow(), "/help".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return SlashResult::Quit,
            "/hint" => self.hint().await,
            "/ask" => {
                let question = input.trim_start_matches("/ask").trim();
                if question.is_empty() {
                    println!("Usage: {} <question>, e.g. /ask what does 'simplify' mean?", "/ask".yellow());
                } else {
                    self.ask(question).await;
                }
            }
            "/reveal" => self.reveal().await,
            "/next" | "/skip" => {
                self.leave_current().await;
                self.advance().await;
            }
            "/goto" => match parts.get(1) {
                Some(id) => {
                    let id = ProblemId::from(*id);
                    self.open_problem(&id).await;
                }
                None => println!("Usage: {} <problem>, e.g. /goto q3", "/goto".yellow()),
            },
            "/problem" | "/p" => match self.current_problem() {
                Some(problem) => print_problem(&problem),
                None => println!("{}", "No problem selected.".dimmed()),
            },
            "/status" => self.print_status().await,
            "/history" => self.print_history().await,
            "/list" | "/ls" => self.print_list().await,
            "/progress" => match self.coach.get_progress(&self.worksheet.id).await {
                Ok(summary) => println!("{}", summary),
                Err(e) => print_error(&e),
            },
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Ask for the next hint", "/hint".yellow());
        println!("  {:14} Ask the tutor a question (not graded)", "/ask <text>".yellow());
        println!("  {:14} Give up on this problem and see the answer", "/reveal".yellow());
        println!("  {:14} Leave this problem and go to the next open one", "/next".yellow());
        println!("  {:14} Jump to a problem, e.g. /goto q3", "/goto <id>".yellow());
        println!("  {:14} Show the current problem again", "/problem".yellow());
        println!("  {:14} Attempts and hints for the current problem", "/status".yellow());
        println!("  {:14} Dialogue so far for the current problem", "/history".yellow());
        println!("  {:14} All problems and their status", "/list".yellow());
        println!("  {:14} Worksheet progress", "/progress".yellow());
        println!("  {:14} Finish and show final progress", "/quit".yellow());
        println!();
    }

    fn current_problem(&self) -> Option<Problem> {
        let id = self.current.as_ref()?;
        self.worksheet.problem(id).cloned()
    }

    /// Abandon the current problem if its session is still live
    async fn leave_current(&mut self) {
        let Some(id) = self.current.take() else {
            return;
        };
        if let Ok(snapshot) = self.coach.snapshot(&self.worksheet.id, &id).await
            && !snapshot.is_terminal()
            && let Err(e) = self.coach.abandon(&self.worksheet.id, &id).await
        {
            print_error(&e);
        }
    }

    /// Open the first problem that is neither solved nor in progress
    async fn advance(&mut self) {
        match self.coach.next_open_problem(&self.worksheet.id).await {
            Ok(Some(id)) => self.open_problem(&id).await,
            Ok(None) => {
                self.current = None;
                println!("{}", "Every problem has been attempted. Type /progress or /quit.".bright_green());
            }
            Err(e) => print_error(&e),
        }
    }

    async fn open_problem(&mut self, id: &ProblemId) {
        debug!(problem_id = %id, "open_problem: called");
        if self.current.as_ref() == Some(id) {
            if let Some(problem) = self.current_problem() {
                print_problem(&problem);
            }
            return;
        }
        self.leave_current().await;

        match self.coach.start_session(&self.worksheet.id, id).await {
            Ok(_) => {
                self.current = Some(id.clone());
                if let Some(problem) = self.current_problem() {
                    print_problem(&problem);
                }
            }
            Err(e) => print_error(&e),
        }
    }

    async fn submit(&mut self, attempt: &str) {
        let Some(id) = self.current.clone() else {
            println!("{}", "No problem selected. Use /next or /goto.".dimmed());
            return;
        };
        match self.coach.submit_attempt(&self.worksheet.id, &id, attempt).await {
            Ok(result) => {
                print_turn(&result);
                if result.is_solved() {
                    self.current = None;
                    if let Ok(summary) = self.coach.get_progress(&self.worksheet.id).await {
                        println!("{}", summary.to_string().dimmed());
                    }
                    self.advance().await;
                }
            }
            Err(e) => print_error(&e),
        }
    }

    async fn hint(&mut self) {
        let Some(id) = self.current.clone() else {
            println!("{}", "No problem selected. Use /next or /goto.".dimmed());
            return;
        };
        match self.coach.request_hint(&self.worksheet.id, &id).await {
            Ok(result) => print_turn(&result),
            Err(e) => print_error(&e),
        }
    }

    async fn ask(&mut self, question: &str) {
        let Some(id) = self.current.clone() else {
            println!("{}", "No problem selected. Use /next or /goto.".dimmed());
            return;
        };
        match self.coach.ask(&self.worksheet.id, &id, question).await {
            Ok(result) => print_turn(&result),
            Err(e) => print_error(&e),
        }
    }

    /// Show the worked answer, then move on
    async fn reveal(&mut self) {
        let Some(id) = self.current.clone() else {
            println!("{}", "No problem selected. Use /next or /goto.".dimmed());
            return;
        };
        match self.coach.reveal(&self.worksheet.id, &id).await {
            Ok(result) => {
                if let Some(explanation) = &result.reply {
                    println!("{} {}", "Answer:".bright_yellow().bold(), explanation);
                }
                self.current = None;
                self.advance().await;
            }
            Err(e) => print_error(&e),
        }
    }

    async fn print_status(&self) {
        let Some(id) = &self.current else {
            println!("{}", "No problem selected.".dimmed());
            return;
        };
        match self.coach.snapshot(&self.worksheet.id, id).await {
            Ok(s) => println!(
                "{}: {} | attempts {} | hints {}/{}",
                id.to_string().bold(),
                s.state,
                s.attempt_count,
                s.hint_level,
                s.max_hint_level
            ),
            Err(e) => print_error(&e),
        }
    }

    async fn print_history(&self) {
        let Some(id) = &self.current else {
            println!("{}", "No problem selected.".dimmed());
            return;
        };
        let snapshot = match self.coach.snapshot(&self.worksheet.id, id).await {
            Ok(s) => s,
            Err(e) => return print_error(&e),
        };
        if snapshot.turns().is_empty() {
            println!("{}", "No attempts yet.".dimmed());
            return;
        }
        for turn in snapshot.turns() {
            let who = match (turn.role, turn.kind) {
                (TurnRole::Student, _) => "You".bright_green(),
                (TurnRole::Tutor, TurnKind::Hint) => "Hint".bright_magenta(),
                (TurnRole::Tutor, TurnKind::Reveal) => "Answer".bright_yellow(),
                (TurnRole::Tutor, _) => "Tutor".bright_blue(),
            };
            println!("{:>3} {}: {}", turn.seq, who, turn.content);
        }
    }

    async fn print_list(&self) {
        let statuses = match self.coach.statuses(&self.worksheet.id).await {
            Ok(s) => s,
            Err(e) => return print_error(&e),
        };
        for (id, status) in statuses {
            let marker = match status {
                ProblemStatus::Solved => "\u{2714}".green(),
                ProblemStatus::Abandoned => "\u{2716}".red(),
                ProblemStatus::InProgress => "\u{25B6}".yellow(),
                ProblemStatus::Unstarted => "\u{00B7}".normal(),
            };
            let preview: String = self
                .worksheet
                .problem(&id)
                .map(|p| p.statement.chars().take(60).collect())
                .unwrap_or_default();
            println!("  {} {:6} {:12} {}", marker, id.to_string(), status.to_string(), preview.dimmed());
        }
    }
}

fn print_problem(problem: &Problem) {
    println!();
    println!(
        "{}",
        format!("Problem {} (page {})", problem.number, problem.page).bright_cyan().bold()
    );
    println!("{}", problem.display_text());
    if let Some(reference) = &problem.reference {
        println!(
            "{}",
            format!("(Look at the {} on page {} of your worksheet.)", reference.cue, reference.page).dimmed()
        );
    }
    if problem.answer.kind == AnswerKind::MultipleChoice {
        println!("{}", "Answer with the number or letter of your choice.".dimmed());
    }
    println!();
}

fn print_turn(result: &TurnResult) {
    if let Some(feedback) = &result.feedback {
        let label = if result.is_solved() {
            "Tutor:".bright_green().bold()
        } else {
            "Tutor:".bright_blue().bold()
        };
        println!("{} {}", label, feedback);
        if result.confidence == Some(Confidence::Low) {
            println!("{}", "(This judgment may be less reliable than usual.)".dimmed());
        }
    }
    if let Some(hint) = &result.hint {
        println!(
            "{} {}",
            format!("Hint {}/{}:", result.hint_level, result.snapshot.max_hint_level)
                .bright_magenta()
                .bold(),
            hint
        );
    }
    if let Some(reply) = &result.reply {
        println!("{} {}", "Tutor:".bright_blue().bold(), reply);
    }
    if result.is_solved() {
        println!("{}", "Solved!".bright_green().bold());
    }
}

fn print_error(error: &CoachError) {
    match error.kind() {
        ErrorKind::TransientBackend => println!(
            "{} {} Nothing was recorded; try again in a moment.",
            "!".red(),
            error
        ),
        ErrorKind::State | ErrorKind::Input => println!("{} {}", "!".yellow(), error),
        ErrorKind::DataIntegrity => println!("{} {}", "!".red().bold(), error),
    }
}
