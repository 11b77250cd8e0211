/// Record types shared by the loader, classifier, reporter and evaluator
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel used for fields no grammar could recover
pub const UNKNOWN: &str = "Unknown";

// Plain integer, optionally with an all-zero fraction; no exponents
static INTEGRAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<sign>[+-]?)(?P<digits>\d+)(?:\.0+)?$").expect("valid regex literal")
});

/// Line identifier as an opaque join key.
///
/// Line-oriented sources produce contiguous ordinals starting at 1; tabular
/// sources carry whatever the identifier column holds, so the value is kept
/// as text and compared through [`normalize_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// 1-based position in a line-oriented source
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self(ordinal.to_string())
    }

    /// Identifier taken verbatim (trimmed) from a table cell. Spelling
    /// differences such as `007` vs `7` are resolved by [`LineId::join_key`].
    pub fn from_cell(cell: &str) -> Self {
        Self(cell.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used when matching against other tables
    pub fn join_key(&self) -> String {
        normalize_key(&self.0)
    }

    /// Numeric view of the identifier, when it has one
    pub fn ordinal(&self) -> Option<usize> {
        self.join_key().parse().ok()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a join key: trim surrounding whitespace and collapse numeric
/// spellings ("7", " 7 ", "7.0", "007") to one canonical form.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(caps) = INTEGRAL_KEY.captures(trimmed) else {
        return trimmed.to_string();
    };

    let digits = caps["digits"].trim_start_matches('0');
    match (digits, &caps["sign"]) {
        ("", _) => "0".to_string(),
        (digits, "-") => format!("-{}", digits),
        (digits, _) => digits.to_string(),
    }
}

/// Which family of logs a dataset comes from; selects grammar priority
/// hints and the label taxonomy used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Linux,
    Android,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Linux => f.write_str("Linux"),
            SourceKind::Android => f.write_str("Android"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(SourceKind::Linux),
            "android" => Ok(SourceKind::Android),
            other => Err(format!("unknown source kind '{}' (expected linux or android)", other)),
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub line_id: LineId,
    pub timestamp: String,
    pub component: String,
    pub host: Option<String>,
    pub process_id: Option<String>,
    pub thread_id: Option<String>,
    pub severity_level: Option<String>,
    pub content: String,
    /// Content with volatile values replaced by placeholders; this is what
    /// gets sent for classification.
    pub masked_content: String,
}

impl LogRecord {
    /// Record for a line no grammar recognised
    pub fn unknown(line_id: LineId, content: &str) -> Self {
        Self::from_content(line_id, UNKNOWN, UNKNOWN, content)
    }

    /// Record built from already-separated fields; masking is applied here
    pub fn from_content(line_id: LineId, timestamp: &str, component: &str, content: &str) -> Self {
        Self {
            line_id,
            timestamp: timestamp.to_string(),
            component: component.to_string(),
            host: None,
            process_id: None,
            thread_id: None,
            severity_level: None,
            content: content.to_string(),
            masked_content: crate::content_masker::mask_content(content),
        }
    }
}

/// A record with both label axes assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub record: LogRecord,
    pub semantic_class: String,
    pub event_category: String,
}

impl ClassifiedRecord {
    pub fn line_id(&self) -> &LineId {
        &self.record.line_id
    }

    pub fn content(&self) -> &str {
        &self.record.content
    }
}
