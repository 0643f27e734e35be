//! Tabular reads gated by synchronization
//!
//! The mirror engine does not interpret file contents itself; it hands the
//! synchronized local file to a [`TabularReader`]. [`DelimitedReader`] is the
//! built-in reader for comma and tab separated text.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported delimited text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabularFormat {
    #[default]
    Csv,
    Tsv,
}

impl TabularFormat {
    pub fn delimiter(&self) -> char {
        match self {
            TabularFormat::Csv => ',',
            TabularFormat::Tsv => '\t',
        }
    }

    /// Guess the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => {
                TabularFormat::Tsv
            }
            _ => TabularFormat::Csv,
        }
    }
}

impl fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabularFormat::Csv => write!(f, "csv"),
            TabularFormat::Tsv => write!(f, "tsv"),
        }
    }
}

/// A parsed table: one header record followed by data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    /// Values of the named column, if present.
    ///
    /// Rows too short to have the column yield an empty value.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("record {record} has {found} fields, header has {expected}")]
    Ragged {
        record: usize,
        expected: usize,
        found: usize,
    },
    #[error("unterminated quoted field starting in record {record}")]
    UnterminatedQuote { record: usize },
}

/// Reader used by [`MirrorSync::read_tabular_for_sync`](super::MirrorSync::read_tabular_for_sync)
pub trait TabularReader: fmt::Debug + Send + Sync {
    fn read(&self, path: &Path, format: TabularFormat) -> Result<Table, TabularError>;
}

/// Reader for RFC 4180 style delimited text
#[derive(Debug, Clone, Default)]
pub struct DelimitedReader;

impl TabularReader for DelimitedReader {
    fn read(&self, path: &Path, format: TabularFormat) -> Result<Table, TabularError> {
        let text = std::fs::read_to_string(path).map_err(|source| TabularError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse(&text, format.delimiter())
    }
}

/// Parse delimited text into a [`Table`]
pub fn parse(text: &str, delimiter: char) -> Result<Table, TabularError> {
    let mut records = split_records(text, delimiter)?.into_iter();
    let Some(headers) = records.next() else {
        return Ok(Table::default());
    };

    let mut rows = Vec::new();
    for (i, row) in records.enumerate() {
        if row.len() != headers.len() {
            return Err(TabularError::Ragged {
                // 1-based, header is record 1
                record: i + 2,
                expected: headers.len(),
                found: row.len(),
            });
        }
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

fn split_records(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, TabularError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // the current field was quoted, so it counts even when empty
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quoted = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            // blank line
            '\n' if record.is_empty() && field.is_empty() && !quoted => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                quoted = false;
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TabularError::UnterminatedQuote {
            record: records.len() + 1,
        });
    }
    // last line without a trailing newline
    if !field.is_empty() || !record.is_empty() || quoted {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}
