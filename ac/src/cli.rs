//! CLI command definitions and subcommands

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use tracing::debug;

use crate::extract::{Document, DocumentFormat};

/// Algebra Coach - worksheet tutor
#[derive(Parser)]
#[command(
    name = "ac",
    about = "Turn an algebra worksheet into a step-by-step tutoring session",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and list the problems in a worksheet (no tutor needed)
    Extract {
        /// Worksheet file (.pdf, .txt, .md)
        file: PathBuf,

        /// Declared format, overriding the file extension (pdf, txt, md or a MIME type)
        #[arg(short = 'F', long)]
        format: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Work through a worksheet interactively
    Tutor {
        /// Worksheet file (.pdf, .txt, .md)
        file: PathBuf,

        /// Declared format, overriding the file extension
        #[arg(short = 'F', long)]
        format: Option<String>,

        /// Problem to start with, e.g. q3
        #[arg(short, long)]
        problem: Option<String>,
    },

    /// Show recent log lines
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Read a worksheet file into a document
///
/// The format comes from `format` when given, else from the extension.
pub fn read_document(path: &Path, format: Option<&str>) -> Result<Document> {
    debug!(path = %path.display(), ?format, "read_document: called");
    let bytes = std::fs::read(path).context(format!("Failed to read {}", path.display()))?;
    let tag = format
        .map(str::to_string)
        .unwrap_or_else(|| DocumentFormat::tag_for_path(path));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(bytes, tag, name))
}

/// Result of checking an external tool
pub struct ToolCheck {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    /// Check if a tool is available and get its version
    ///
    /// Some converters print their version on stderr, so both streams are read.
    pub fn check(name: &str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        match std::process::Command::new(name).args(version_args).output() {
            Ok(output) if output.status.success() => {
                let text = format!(
                    "{} {}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                Self {
                    name: name.to_string(),
                    available: true,
                    version: Some(parse_version(&text)),
                }
            }
            _ => Self {
                name: name.to_string(),
                available: false,
                version: None,
            },
        }
    }
}

/// Parse version from command output (extracts first version-like string)
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("algebra-coach")
        .join("logs")
        .join("algebra-coach.log")
}

/// Generate the after_help text with the converter check and log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let converter = ToolCheck::check("pdftotext", &["-v"]);

    let mut help = String::new();
    help.push_str("PDF Converter:\n");
    let icon = if converter.available { "\u{2705}" } else { "\u{274C}" };
    let version = converter.version.as_deref().unwrap_or("not found (PDFs use a basic text scan)");
    help.push_str(&format!("  {} {:<10} {}\n", icon, converter.name, version));

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for the extract command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use 'text' or 'json'", s)),
        }
    }
}
