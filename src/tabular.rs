/// Header-normalized CSV tables
///
/// Every tabular input (LogHub structured logs, prediction files, bridge and
/// answer tables) goes through [`Table`]: headers are matched ignoring case,
/// surrounding whitespace and underscores, invalid UTF-8 is replaced rather
/// than rejected, and rows the CSV reader cannot parse are skipped with a
/// warning instead of failing the whole load.
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
}

/// Fail with [`LoadError::NotFound`] when `path` does not exist
pub fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()).into());
    }
    Ok(())
}

/// Canonical form of a column header used for lookups
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    normalized: Vec<String>,
    rows: Vec<Vec<String>>,
    skipped_rows: usize,
}

impl Table {
    /// Read a CSV file from disk
    pub fn read(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read table: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(&name, &bytes)
    }

    /// Parse CSV content already in memory
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .byte_headers()
            .with_context(|| format!("Failed to read header row of {}", name))?
            .iter()
            .map(|h| decode(h).trim().to_string())
            .collect();
        let normalized = headers.iter().map(|h| normalize_header(h)).collect();

        let mut rows = Vec::new();
        let mut skipped_rows = 0;
        for (idx, result) in reader.byte_records().enumerate() {
            match result {
                Ok(record) if record.len() > headers.len() => {
                    tracing::warn!(
                        "{}: skipping row {} ({} fields, expected {})",
                        name,
                        idx + 2,
                        record.len(),
                        headers.len()
                    );
                    skipped_rows += 1;
                }
                Ok(record) => {
                    rows.push(record.iter().map(|f| decode(f).into_owned()).collect());
                }
                Err(e) => {
                    tracing::warn!("{}: skipping malformed row {}: {}", name, idx + 2, e);
                    skipped_rows += 1;
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            normalized,
            rows,
            skipped_rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped while reading
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Index of the first column whose header matches any alias
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let wanted = normalize_header(alias);
            self.normalized.iter().position(|h| *h == wanted)
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }
}

/// One data row of a [`Table`]
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Cell text, `None` when the column is absent from this row or empty
    pub fn cell(&self, column: usize) -> Option<&'a str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Cell text for an optional column
    pub fn get(&self, column: Option<usize>) -> Option<&'a str> {
        column.and_then(|c| self.cell(c))
    }
}

fn decode(field: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(field)
}
