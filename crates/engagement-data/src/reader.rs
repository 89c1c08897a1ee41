//! Event log loading.
//!
//! Turns raw delimited records into validated [`Event`]s. Rows that cannot be
//! interpreted are skipped and counted in [`LoadDiagnostics`]; only failures
//! of the underlying file abort a load.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use engagement_core::config::PipelineConfig;
use engagement_core::models::{Event, EventKind};
use engagement_core::{EngagementError, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Fields per record: user, item, event label, amount, unused trailer.
pub const EXPECTED_FIELDS: usize = 5;

// ── LoadDiagnostics ───────────────────────────────────────────────────────────

/// Counts of what happened to each input row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostics {
    /// Records handed to the parser, header excluded.
    pub rows_read: u64,
    pub events_accepted: u64,
    /// Wrong field count, unparseable or negative amount, empty identifier.
    pub malformed_rows: u64,
    /// Event label missing from the configured kind map.
    pub unrecognized_kinds: u64,
}

impl LoadDiagnostics {
    /// Rows dropped for any reason.
    pub fn skipped(&self) -> u64 {
        self.malformed_rows + self.unrecognized_kinds
    }

    fn record_rejection(&mut self, err: &EngagementError) {
        match err {
            EngagementError::UnrecognizedEventKind { .. } => self.unrecognized_kinds += 1,
            _ => self.malformed_rows += 1,
        }
    }
}

// ── Record parsing ────────────────────────────────────────────────────────────

/// Validate one raw record into an [`Event`].
///
/// `line` is only used for error reporting. Fails with
/// [`EngagementError::MalformedRow`] or
/// [`EngagementError::UnrecognizedEventKind`]; both are row-level.
pub fn parse_record<S: AsRef<str>>(
    fields: &[S],
    line: u64,
    config: &PipelineConfig,
) -> Result<Event> {
    let malformed = |reason: String| EngagementError::MalformedRow { line, reason };

    if fields.len() != EXPECTED_FIELDS {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            EXPECTED_FIELDS,
            fields.len()
        )));
    }

    let user_id = fields[0].as_ref().trim();
    let item_id = fields[1].as_ref();
    let label = fields[2].as_ref();
    let raw_amount = fields[3].as_ref().trim();

    if user_id.is_empty() {
        return Err(malformed("empty user id".to_string()));
    }
    if item_id.trim().is_empty() {
        return Err(malformed("empty item id".to_string()));
    }

    let amount: f64 = raw_amount
        .parse()
        .map_err(|_| malformed(format!("amount {:?} is not a number", raw_amount)))?;
    if !amount.is_finite() {
        return Err(malformed(format!("amount {:?} is not finite", raw_amount)));
    }

    let kind = config
        .event_kind(label)
        .ok_or_else(|| EngagementError::UnrecognizedEventKind {
            line,
            label: label.to_string(),
        })?;

    if kind == EventKind::Usage && amount < 0.0 {
        return Err(malformed(format!("negative usage amount {}", amount)));
    }

    Ok(Event {
        user_id: user_id.to_string(),
        item_id: item_id.to_string(),
        kind,
        amount,
    })
}

// ── EventParser ───────────────────────────────────────────────────────────────

/// Lazy adapter from raw records to validated events, in input order.
///
/// Skipped rows are tallied as the iterator advances. A read failure of the
/// underlying source ends iteration early and is reported by
/// [`EventParser::finish`].
pub struct EventParser<'a, I> {
    records: I,
    config: &'a PipelineConfig,
    diagnostics: LoadDiagnostics,
    fallback_line: u64,
    failure: Option<csv::Error>,
}

impl<'a, I> EventParser<'a, I>
where
    I: Iterator<Item = std::result::Result<StringRecord, csv::Error>>,
{
    pub fn new(records: I, config: &'a PipelineConfig) -> Self {
        Self {
            records,
            config,
            diagnostics: LoadDiagnostics::default(),
            fallback_line: 0,
            failure: None,
        }
    }

    /// Consume the parser, returning the final counts or the read failure
    /// that stopped it.
    pub fn finish(self) -> Result<LoadDiagnostics> {
        match self.failure {
            Some(err) => Err(err.into()),
            None => Ok(self.diagnostics),
        }
    }
}

impl<I> Iterator for EventParser<'_, I>
where
    I: Iterator<Item = std::result::Result<StringRecord, csv::Error>>,
{
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.failure.is_some() {
            return None;
        }
        loop {
            let record = self.records.next()?;
            self.fallback_line += 1;
            self.diagnostics.rows_read += 1;

            let record = match record {
                Ok(r) => r,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    warn!("Aborting read: {}", e);
                    self.diagnostics.rows_read -= 1;
                    self.failure = Some(e);
                    return None;
                }
                Err(e) => {
                    debug!("Skipping unreadable record: {}", e);
                    self.diagnostics.malformed_rows += 1;
                    continue;
                }
            };

            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.fallback_line);
            let fields: Vec<&str> = record.iter().collect();

            match parse_record(&fields, line, self.config) {
                Ok(event) => {
                    self.diagnostics.events_accepted += 1;
                    return Some(event);
                }
                Err(e) => {
                    debug!("Skipping row: {}", e);
                    self.diagnostics.record_rejection(&e);
                }
            }
        }
    }
}

// ── Sources ───────────────────────────────────────────────────────────────────

/// CSV reader configured from the pipeline config.
fn reader_builder(config: &PipelineConfig) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(config.has_header)
        .delimiter(config.delimiter_byte())
        .flexible(true);
    builder
}

/// Parse events from any byte source.
pub fn events_from_reader<R: Read>(
    source: R,
    config: &PipelineConfig,
) -> EventParser<'_, StringRecordsIntoIter<R>> {
    let reader = reader_builder(config).from_reader(source);
    EventParser::new(reader.into_records(), config)
}

/// Open the event log at `path`.
///
/// A missing or unreadable file fails immediately with
/// [`EngagementError::MissingInputFile`].
pub fn open_event_log<'a>(
    path: &Path,
    config: &'a PipelineConfig,
) -> Result<EventParser<'a, StringRecordsIntoIter<File>>> {
    let file = File::open(path).map_err(|source| EngagementError::MissingInputFile {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Reading event log {}", path.display());
    Ok(events_from_reader(file, config))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn parse(fields: &[&str]) -> Result<Event> {
        parse_record(fields, 1, &PipelineConfig::default())
    }

    // ── parse_record ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_purchase_row() {
        let event = parse(&["151603712", "The Elder Scrolls V Skyrim", "purchase", "1.0", "0"]).unwrap();
        assert_eq!(event.user_id, "151603712");
        assert_eq!(event.item_id, "The Elder Scrolls V Skyrim");
        assert_eq!(event.kind, EventKind::Ownership);
        assert_eq!(event.amount, 1.0);
    }

    #[test]
    fn test_parse_play_row() {
        let event = parse(&["151603712", "Fallout 4", "play", "87.0", "0"]).unwrap();
        assert_eq!(event.kind, EventKind::Usage);
        assert_eq!(event.amount, 87.0);
    }

    #[test]
    fn test_parse_label_is_case_sensitive() {
        let err = parse(&["1", "Dota 2", "Play", "2.0", "0"]).unwrap_err();
        assert!(matches!(err, EngagementError::UnrecognizedEventKind { ref label, .. } if label == "Play"));
    }

    #[test]
    fn test_parse_non_numeric_amount() {
        let err = parse(&["1", "Dota 2", "play", "lots", "0"]).unwrap_err();
        assert!(matches!(err, EngagementError::MalformedRow { .. }));
    }

    #[test]
    fn test_parse_rejects_nan_and_infinity() {
        assert!(parse(&["1", "Dota 2", "play", "NaN", "0"]).is_err());
        assert!(parse(&["1", "Dota 2", "play", "inf", "0"]).is_err());
    }

    #[test]
    fn test_parse_negative_usage_is_dropped_not_clamped() {
        let err = parse(&["1", "Dota 2", "play", "-4.5", "0"]).unwrap_err();
        assert!(matches!(err, EngagementError::MalformedRow { .. }));
    }

    #[test]
    fn test_parse_negative_ownership_amount_is_ignored() {
        let event = parse(&["1", "Dota 2", "purchase", "-1.0", "0"]).unwrap();
        assert_eq!(event.kind, EventKind::Ownership);
    }

    #[test]
    fn test_parse_wrong_field_count() {
        let err = parse(&["1", "Dota 2", "play", "1.0"]).unwrap_err();
        assert!(err.to_string().contains("expected 5 fields, found 4"));
    }

    #[test]
    fn test_parse_empty_identifiers() {
        assert!(parse(&["", "Dota 2", "play", "1.0", "0"]).is_err());
        assert!(parse(&["1", "  ", "play", "1.0", "0"]).is_err());
    }

    #[test]
    fn test_parse_custom_kind_map() {
        let mut config = PipelineConfig::default();
        config
            .event_kind_map
            .insert("owned".to_string(), EventKind::Ownership);
        let event = parse_record(&["1", "Dota 2", "owned", "0", "0"], 1, &config).unwrap();
        assert_eq!(event.kind, EventKind::Ownership);
    }

    // ── EventParser ───────────────────────────────────────────────────────────

    #[test]
    fn test_parser_over_in_memory_records() {
        let config = PipelineConfig::default();
        let records = vec![
            StringRecord::from(vec!["1", "A", "purchase", "1.0", "0"]),
            StringRecord::from(vec!["1", "A", "play", "5.0", "0"]),
            StringRecord::from(vec!["2", "A", "refund", "1.0", "0"]),
            StringRecord::from(vec!["2", "A", "play", "x", "0"]),
        ];
        let mut parser = EventParser::new(records.into_iter().map(Ok), &config);
        let events: Vec<Event> = parser.by_ref().collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Ownership);
        assert_eq!(events[1].amount, 5.0);

        let diagnostics = parser.finish().unwrap();
        assert_eq!(diagnostics.rows_read, 4);
        assert_eq!(diagnostics.events_accepted, 2);
        assert_eq!(diagnostics.unrecognized_kinds, 1);
        assert_eq!(diagnostics.malformed_rows, 1);
        assert_eq!(diagnostics.skipped(), 2);
    }

    #[test]
    fn test_events_from_reader_quoted_names() {
        let config = PipelineConfig::default();
        let data = "5250,\"Warhammer 40,000 Dawn of War II\",purchase,1.0,0\n\
                    5250,\"Warhammer 40,000 Dawn of War II\",play,12.5,0\n";
        let events: Vec<Event> = events_from_reader(data.as_bytes(), &config).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_id, "Warhammer 40,000 Dawn of War II");
        assert_eq!(events[1].amount, 12.5);
    }

    #[test]
    fn test_events_from_reader_header_skip() {
        let config = PipelineConfig {
            has_header: true,
            ..PipelineConfig::default()
        };
        let data = "user,game,behavior,value,other\n1,Dota 2,play,3.0,0\n";
        let mut parser = events_from_reader(data.as_bytes(), &config);
        let events: Vec<Event> = parser.by_ref().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(parser.finish().unwrap().rows_read, 1);
    }

    #[test]
    fn test_events_from_reader_header_without_flag_is_skipped_row() {
        let config = PipelineConfig::default();
        let data = "user,game,behavior,value,other\n1,Dota 2,play,3.0,0\n";
        let mut parser = events_from_reader(data.as_bytes(), &config);
        let events: Vec<Event> = parser.by_ref().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(parser.finish().unwrap().malformed_rows, 1);
    }

    #[test]
    fn test_events_from_reader_semicolon_delimiter() {
        let config = PipelineConfig {
            delimiter: ';',
            ..PipelineConfig::default()
        };
        let data = "1;Dota 2;play;3.0;0\n";
        let events: Vec<Event> = events_from_reader(data.as_bytes(), &config).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_id, "Dota 2");
    }

    #[test]
    fn test_events_from_reader_field_count_mismatch() {
        let config = PipelineConfig::default();
        let data = "1,Dota 2,play,3.0,0\n2,Dota 2,play\n3,Dota 2,play,1.0,0,extra\n";
        let mut parser = events_from_reader(data.as_bytes(), &config);
        let events: Vec<Event> = parser.by_ref().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(parser.finish().unwrap().malformed_rows, 2);
    }

    #[test]
    fn test_events_preserve_file_order() {
        let config = PipelineConfig::default();
        let data = "3,C,play,1.0,0\n1,A,play,2.0,0\n2,B,play,3.0,0\n";
        let users: Vec<String> = events_from_reader(data.as_bytes(), &config)
            .map(|e| e.user_id)
            .collect();
        assert_eq!(users, vec!["3", "1", "2"]);
    }

    // ── open_event_log ────────────────────────────────────────────────────────

    #[test]
    fn test_open_event_log_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "steam.csv",
            &["1,Dota 2,purchase,1.0,0", "1,Dota 2,play,10.0,0"],
        );
        let config = PipelineConfig::default();
        let events: Vec<Event> = open_event_log(&path, &config).unwrap().collect();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_open_event_log_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();
        let result = open_event_log(&dir.path().join("absent.csv"), &config);
        assert!(matches!(
            result,
            Err(EngagementError::MissingInputFile { .. })
        ));
    }
}
