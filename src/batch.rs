//! Batch driver: one chat round-trip per input row
//!
//! Rows are read from a JSON Lines file. Each row's input field is sent to
//! a [`ChatSession`] with a cleared history, and one output row is written per
//! input row, in order, as soon as its answer arrives. A failed exchange is
//! recorded with the configured placeholder and the batch moves on.

use crate::config::BatchConfig;
use crate::error::{ChatbatchError, Result};
use crate::providers::{AskOutcome, ChatSession};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One parsed input row
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    /// 1-based line number in the input file
    pub line: usize,
    /// Value of the id field, `Null` when absent
    pub id: Value,
    /// Text to send
    pub input: String,
}

/// Counts reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Rows processed
    pub total: usize,
    /// Rows that received an answer
    pub answered: usize,
    /// Rows written with the placeholder
    pub failed: usize,
}

/// Parse JSON Lines input into rows
///
/// Blank lines are skipped. Every other line must be a JSON object whose
/// input field is a string.
///
/// # Errors
///
/// Returns `Batch` naming the first offending line
///
/// # Examples
///
/// ```
/// use chatbatch::batch::parse_rows;
/// use chatbatch::config::BatchConfig;
///
/// let input = "{\"solution_id\": 1, \"student_solution\": \"print(1\"}\n";
/// let rows = parse_rows(input, &BatchConfig::default()).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].input, "print(1");
/// ```
pub fn parse_rows(contents: &str, config: &BatchConfig) -> Result<Vec<BatchRow>> {
    let mut rows = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let object: Map<String, Value> = serde_json::from_str(line).map_err(|e| {
            ChatbatchError::Batch(format!("line {}: not a JSON object: {}", line_no, e))
        })?;

        let input = match object.get(&config.input_field) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                return Err(ChatbatchError::Batch(format!(
                    "line {}: field '{}' must be a string, found {}",
                    line_no, config.input_field, other
                ))
                .into())
            }
            None => {
                return Err(ChatbatchError::Batch(format!(
                    "line {}: missing field '{}'",
                    line_no, config.input_field
                ))
                .into())
            }
        };

        rows.push(BatchRow {
            line: line_no,
            id: object.get(&config.id_field).cloned().unwrap_or(Value::Null),
            input,
        });
    }

    Ok(rows)
}

fn progress_bar(total: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .map_err(|e| ChatbatchError::Batch(format!("Invalid progress bar template: {}", e)))?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

/// Run every row of `input` through `session` and write results to `output`
///
/// The whole input is parsed before the first request, so a malformed file
/// fails fast without spending API calls. Output rows hold the id field and
/// the output field; each row is flushed as soon as it is written.
///
/// # Errors
///
/// Returns error if the input cannot be read or parsed, or the output cannot
/// be written. Provider failures are not errors.
pub async fn run_batch(
    session: &mut dyn ChatSession,
    input: &Path,
    output: &Path,
    config: &BatchConfig,
    show_progress: bool,
) -> Result<BatchSummary> {
    let contents = std::fs::read_to_string(input).map_err(|e| {
        ChatbatchError::Batch(format!("Failed to read {}: {}", input.display(), e))
    })?;
    let rows = parse_rows(&contents, config)?;

    tracing::info!(
        "Processing {} rows from {} with {} ({})",
        rows.len(),
        input.display(),
        session.provider_name(),
        session.model()
    );

    let mut writer = BufWriter::new(File::create(output)?);
    let bar = progress_bar(rows.len(), show_progress)?;
    let mut summary = BatchSummary::default();

    for row in &rows {
        let outcome = session.ask(&row.input, true).await;

        let prediction = match outcome {
            AskOutcome::Answer(answer) => {
                summary.answered += 1;
                answer
            }
            AskOutcome::Failed(failure) => {
                tracing::warn!("Row at line {} failed: {}", row.line, failure);
                summary.failed += 1;
                config.failure_placeholder.clone()
            }
        };
        summary.total += 1;

        let mut record = Map::new();
        record.insert(config.id_field.clone(), row.id.clone());
        record.insert(config.output_field.clone(), Value::String(prediction));
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        bar.inc(1);
    }

    bar.finish_and_clear();
    tracing::info!(
        "Batch finished: {} rows, {} answered, {} failed",
        summary.total,
        summary.answered,
        summary.failed
    );

    Ok(summary)
}
