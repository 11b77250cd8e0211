/// Pattern parser: turns one raw log line into a typed [`LogRecord`]
///
/// Each supported source grammar is a [`LogFormat`] variant. Variants are
/// tried in [`LogFormat::PRIORITY`] order and the first match wins; a line
/// no grammar accepts becomes an `Unknown` record carrying the whole line.
use crate::log_record::{LineId, LogRecord};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// "Month Day HH:MM:SS host tag[pid]: message"
static SYSLOG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<timestamp>[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(?P<host>\S+)\s+(?P<tag>[^:]+):\s+(?P<content>.*)$",
    )
    .expect("valid regex literal")
});

// "MM-DD HH:MM:SS.mmm  PID  TID L Tag: message" (logcat threadtime)
static LOGCAT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<timestamp>\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3})\s+(?P<pid>\d+)\s+(?P<tid>\d+)\s+(?P<level>[VDIWEFA])\s+(?P<tag>[^:]+?)\s*:\s?(?P<content>.*)$",
    )
    .expect("valid regex literal")
});

static BRACKETED_PID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("valid regex literal"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// BSD syslog as found in /var/log/messages
    Syslog,
    /// Android logcat in threadtime layout
    Logcat,
}

impl LogFormat {
    /// Order in which grammars are attempted
    pub const PRIORITY: [LogFormat; 2] = [LogFormat::Syslog, LogFormat::Logcat];

    /// Try to parse `line` with this grammar
    pub fn parse(self, line: &str, line_id: &LineId) -> Option<LogRecord> {
        match self {
            LogFormat::Syslog => {
                let caps = SYSLOG_PATTERN.captures(line)?;
                let tag = group(&caps, "tag");
                let mut record = LogRecord::from_content(
                    line_id.clone(),
                    group(&caps, "timestamp"),
                    &component_name(tag),
                    group(&caps, "content"),
                );
                record.host = Some(group(&caps, "host").to_string());
                record.process_id = BRACKETED_PID
                    .captures(tag)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string());
                Some(record)
            }
            LogFormat::Logcat => {
                let caps = LOGCAT_PATTERN.captures(line)?;
                let mut record = LogRecord::from_content(
                    line_id.clone(),
                    group(&caps, "timestamp"),
                    &component_name(group(&caps, "tag")),
                    group(&caps, "content"),
                );
                record.process_id = Some(group(&caps, "pid").to_string());
                record.thread_id = Some(group(&caps, "tid").to_string());
                record.severity_level = Some(group(&caps, "level").to_string());
                Some(record)
            }
        }
    }

    /// Which grammar, if any, accepts the line
    pub fn detect(line: &str) -> Option<LogFormat> {
        let line = line.trim();
        Self::PRIORITY.into_iter().find(|format| match format {
            LogFormat::Syslog => SYSLOG_PATTERN.is_match(line),
            LogFormat::Logcat => LOGCAT_PATTERN.is_match(line),
        })
    }
}

fn group<'a>(caps: &Captures<'a>, name: &str) -> &'a str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

/// Leading subsystem name of a raw tag: everything before the first `[`
/// or `:`, so `sshd[123]` and `sshd(pam_unix)[19939]` lose the pid suffix.
pub fn component_name(raw_tag: &str) -> String {
    raw_tag
        .split(['[', ':'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub struct LogParser;

impl LogParser {
    /// Parse one non-blank line. Never fails: unrecognised lines become
    /// `Unknown` records with the trimmed line as content.
    pub fn parse(line: &str, line_id: LineId) -> LogRecord {
        let line = line.trim();
        LogFormat::PRIORITY
            .into_iter()
            .find_map(|format| format.parse(line, &line_id))
            .unwrap_or_else(|| LogRecord::unknown(line_id, line))
    }
}
