//! Extraction backends: turn a PDF into plain text

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::Document;
use crate::config::ExtractionConfig;

/// Why a backend produced no text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The backend could not be reached at all; extraction may degrade
    #[error("extraction backend unavailable: {0}")]
    Unavailable(String),

    /// The backend ran and rejected the document
    #[error("extraction backend failed: {0}")]
    Failed(String),
}

/// Converts a document to raw text
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn extract_text(&self, document: &Document) -> Result<String, ExtractionError>;
}

/// Runs an external converter: document on stdin, text on stdout
pub struct CommandExtractor {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }
}

#[async_trait]
impl ExtractionBackend for CommandExtractor {
    async fn extract_text(&self, document: &Document) -> Result<String, ExtractionError> {
        debug!(command = %self.command, bytes = document.bytes.len(), "extract_text: called");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::Unavailable(format!("cannot run {}: {}", self.command, e)))?;

        // Feed stdin from its own task so a large stdout cannot deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionError::Unavailable("converter stdin not captured".to_string()))?;
        let input = document.bytes.clone();
        let writer = tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&input).await {
                debug!(error = %e, "extract_text: converter closed stdin early");
            }
        });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExtractionError::Unavailable(format!("waiting for {}: {}", self.command, e))),
            Err(_) => {
                warn!(command = %self.command, timeout_ms = self.timeout.as_millis() as u64, "Converter timed out");
                return Err(ExtractionError::Unavailable(format!(
                    "{} timed out after {:?}",
                    self.command, self.timeout
                )));
            }
        };
        writer.abort();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(ExtractionError::Failed(format!("{} produced no text", self.command)));
        }
        debug!(chars = text.len(), "extract_text: converted");
        Ok(text)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Backend returning a fixed result
    pub struct FixedBackend(pub Result<String, ExtractionError>);

    #[async_trait]
    impl ExtractionBackend for FixedBackend {
        async fn extract_text(&self, _document: &Document) -> Result<String, ExtractionError> {
            self.0.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_doc() -> Document {
        Document::new(b"%PDF-1.4 fake".to_vec(), "application/pdf", "ws.pdf")
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let backend = CommandExtractor::new("definitely-not-a-real-converter", vec![], Duration::from_secs(5));
        let result = backend.extract_text(&pdf_doc()).await;
        assert!(matches!(result, Err(ExtractionError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passthrough_command_returns_stdout() {
        let backend = CommandExtractor::new("cat", vec![], Duration::from_secs(5));
        let text = backend.extract_text(&pdf_doc()).await.unwrap();
        assert_eq!(text, "%PDF-1.4 fake");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let backend = CommandExtractor::new("false", vec![], Duration::from_secs(5));
        let result = backend.extract_text(&pdf_doc()).await;
        assert!(matches!(result, Err(ExtractionError::Failed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out_as_unavailable() {
        let backend = CommandExtractor::new("sleep", vec!["5".to_string()], Duration::from_millis(50));
        let result = backend.extract_text(&pdf_doc()).await;
        match result {
            Err(ExtractionError::Unavailable(reason)) => assert!(reason.contains("timed out")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
