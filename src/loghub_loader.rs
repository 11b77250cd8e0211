/// LogHub dataset loader
///
/// Loads either a raw `.log` file (parsed line by line) or a LogHub
/// `*_structured.csv` file (fields taken from columns) into [`LogRecord`]s.
use crate::content_masker::mask_optional;
use crate::log_parser::LogParser;
use crate::log_record::{LineId, LogRecord, UNKNOWN};
use crate::tabular::{ensure_exists, Row, Table};
use crate::traits::LogSource;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct LogHubDatasetLoader {
    dataset_name: String,
    log_file: PathBuf,
}

impl LogHubDatasetLoader {
    pub fn new(dataset_dir: impl AsRef<Path>, filename: &str) -> Self {
        let dataset_name = filename
            .split('.')
            .next()
            .unwrap_or(filename)
            .trim_end_matches("_2k")
            .to_string();

        Self {
            dataset_name,
            log_file: dataset_dir.as_ref().join(filename),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

impl LogSource for LogHubDatasetLoader {
    fn load_records(&self) -> Result<Vec<LogRecord>> {
        load_logs(&self.log_file)
    }

    fn name(&self) -> &str {
        &self.dataset_name
    }
}

/// Load a dataset file, dispatching on its extension
pub fn load_logs(path: &Path) -> Result<Vec<LogRecord>> {
    ensure_exists(path)?;
    tracing::info!("Loading dataset {}", path.display());

    let is_tabular = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let records = if is_tabular {
        let table = Table::read(path)?;
        records_from_table(&table)?
    } else {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read log file: {}", path.display()))?;
        parse_lines(&String::from_utf8_lossy(&bytes))
    };

    tracing::info!("Loaded {} log records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse line-oriented text. Blank lines are dropped and do not consume an
/// identifier, so ids run 1..=N over the non-blank lines.
pub fn parse_lines(text: &str) -> Vec<LogRecord> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| LogParser::parse(line, LineId::from_ordinal(idx + 1)))
        .collect()
}

/// Columns of a LogHub structured table
struct StructuredColumns {
    line_id: usize,
    content: usize,
    component: Option<usize>,
    month: Option<usize>,
    date: Option<usize>,
    time: Option<usize>,
    timestamp: Option<usize>,
    pid: Option<usize>,
    tid: Option<usize>,
    level: Option<usize>,
}

impl StructuredColumns {
    fn locate(table: &Table) -> Result<Self> {
        let required = |aliases: &[&str]| {
            table.column(aliases).ok_or_else(|| {
                anyhow::anyhow!("{} has no '{}' column", table.name(), aliases[0])
            })
        };

        Ok(Self {
            line_id: required(&["LineId"])?,
            content: required(&["Content"])?,
            component: table.column(&["Component"]),
            month: table.column(&["Month"]),
            date: table.column(&["Date", "Day"]),
            time: table.column(&["Time"]),
            timestamp: table.column(&["Timestamp"]),
            pid: table.column(&["Pid", "ProcessId"]),
            tid: table.column(&["Tid", "ThreadId"]),
            level: table.column(&["Level", "SeverityLevel"]),
        })
    }

    fn timestamp(&self, row: &Row<'_>) -> String {
        let month = row.get(self.month);
        let date = row.get(self.date);
        let time = row.get(self.time);

        match (month, date, time, row.get(self.timestamp)) {
            (Some(month), Some(date), Some(time), _) => {
                let day = date
                    .trim()
                    .parse::<u32>()
                    .map(|d| format!("{:02}", d))
                    .unwrap_or_else(|_| date.trim().to_string());
                format!("{} {} {}", month.trim(), day, time.trim())
            }
            (_, _, _, Some(timestamp)) => timestamp.to_string(),
            (None, Some(date), Some(time), None) => format!("{} {}", date.trim(), time.trim()),
            _ => UNKNOWN.to_string(),
        }
    }
}

/// Map each row of a structured table to a record; rows without a line
/// identifier are skipped with a warning.
pub fn records_from_table(table: &Table) -> Result<Vec<LogRecord>> {
    let columns = StructuredColumns::locate(table)?;
    let mut records = Vec::with_capacity(table.len());

    for (idx, row) in table.rows().enumerate() {
        let Some(line_id) = row.cell(columns.line_id) else {
            tracing::warn!("{}: row {} has no LineId, skipping", table.name(), idx + 2);
            continue;
        };

        let content = row.cell(columns.content).unwrap_or_default();
        records.push(LogRecord {
            line_id: LineId::from_cell(line_id),
            timestamp: columns.timestamp(&row),
            component: row
                .get(columns.component)
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            host: None,
            process_id: row.get(columns.pid).map(|v| v.trim().to_string()),
            thread_id: row.get(columns.tid).map(|v| v.trim().to_string()),
            severity_level: row.get(columns.level).map(|v| v.trim().to_string()),
            content: content.to_string(),
            masked_content: mask_optional(row.cell(columns.content)),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_skips_blanks_contiguously() {
        let text = "Jul 1 00:00:00 host sshd[123]: Failed password\n\n   \nJul 1 00:00:01 host kernel: ok\n\nplain line\n";
        let records = parse_lines(text);
        assert_eq!(records.len(), 3);
        let ids: Vec<_> = records.iter().filter_map(|r| r.line_id.ordinal()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(records[2].component, UNKNOWN);
    }

    #[test]
    fn test_linux_structured_rows() {
        let csv = "LineId,Month,Date,Time,Level,Component,PID,Content,EventId,EventTemplate\n\
                   1,Jun,9,06:06:20,combo,syslogd 1.4.1,,restart.,E118,restart.\n\
                   2,Jun,14,15:16:01,combo,sshd(pam_unix),19939,check pass; user unknown,E27,check pass; user unknown\n";
        let table = Table::from_bytes("Linux_2k.log_structured.csv", csv.as_bytes()).unwrap();
        let records = records_from_table(&table).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "Jun 09 06:06:20");
        assert_eq!(records[0].component, "syslogd 1.4.1");
        assert_eq!(records[0].process_id, None);
        assert_eq!(records[1].timestamp, "Jun 14 15:16:01");
        assert_eq!(records[1].process_id.as_deref(), Some("19939"));
        assert_eq!(records[1].line_id, LineId::from_ordinal(2));
    }

    #[test]
    fn test_android_structured_rows() {
        let csv = "LineId,Date,Time,Pid,Tid,Level,Component,Content,EventId,EventTemplate\n\
                   17,03-17,16:13:38.811,1702,2395,D,WindowManager,visible is false,E1,visible is <*>\n";
        let table = Table::from_bytes("Android_2k.log_structured.csv", csv.as_bytes()).unwrap();
        let records = records_from_table(&table).unwrap();

        assert_eq!(records[0].timestamp, "03-17 16:13:38.811");
        assert_eq!(records[0].thread_id.as_deref(), Some("2395"));
        assert_eq!(records[0].severity_level.as_deref(), Some("D"));
        assert_eq!(records[0].line_id.as_str(), "17");
    }

    #[test]
    fn test_combined_timestamp_column_used_as_is() {
        let csv = "LineId,Timestamp,Component,Content\nA-1,2024-01-01T00:00:00Z,app,took 15 ms\n";
        let table = Table::from_bytes("custom.csv", csv.as_bytes()).unwrap();
        let records = records_from_table(&table).unwrap();

        assert_eq!(records[0].timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(records[0].line_id.as_str(), "A-1");
        assert_eq!(records[0].masked_content, "took <NUM> ms");
    }

    #[test]
    fn test_rows_without_line_id_skipped() {
        let csv = "LineId,Content\n,orphan\n5,kept\n";
        let table = Table::from_bytes("t.csv", csv.as_bytes()).unwrap();
        let records = records_from_table(&table).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "kept");
    }

    #[test]
    fn test_missing_content_column_is_an_error() {
        let table = Table::from_bytes("t.csv", b"LineId,Message\n1,x\n").unwrap();
        assert!(records_from_table(&table).is_err());
    }

    #[test]
    fn test_dataset_name_from_filename() {
        let loader = LogHubDatasetLoader::new("dataset", "Linux_2k.log");
        assert_eq!(loader.name(), "Linux");
        assert_eq!(loader.log_file(), Path::new("dataset/Linux_2k.log"));
    }

    #[test]
    fn test_tabular_line_ids_kept_verbatim() {
        let csv = "LineId,Content\n007,padded\n 12 ,spaced\nA-3,text id\n";
        let table = Table::from_bytes("t.csv", csv.as_bytes()).unwrap();
        let records = records_from_table(&table).unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.line_id.as_str()).collect();
        assert_eq!(ids, vec!["007", "12", "A-3"]);
        assert_eq!(records[0].line_id.join_key(), "7");
    }
}
