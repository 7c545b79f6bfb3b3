use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::structs::alignment::InconsistentWidthError;
use crate::structs::AlignmentRecord;

const STOCKHOLM_TERMINATOR: &str = "//";
const STOCKHOLM_FILE_FLAG: &str = "#=GF";
const STOCKHOLM_COLUMN_FLAG: &str = "#=GC";
const STOCKHOLM_SEQUENCE_FLAG: &str = "#=GS";
const STOCKHOLM_RESIDUE_FLAG: &str = "#=GR";

lazy_static! {
    static ref HEADER_RE: Regex = Regex::new(r"^#\s*STOCKHOLM\s+1\.\d+\s*$").unwrap();
    static ref FILE_ANNOTATION_RE: Regex = Regex::new(r"^#=GF\s+(\S+)(?:\s+(.*?))?\s*$").unwrap();
    static ref COLUMN_ANNOTATION_RE: Regex = Regex::new(r"^#=GC\s+(\S+)\s+(\S+)\s*$").unwrap();
    static ref SEQUENCE_RE: Regex = Regex::new(r"^(\S+)\s+(\S+)\s*$").unwrap();
}

/// An Error that is thrown when a Stockholm file can't be read into records.
#[derive(Error, Debug)]
pub enum StockholmParseError {
    #[error("line {line}: expected a \"# STOCKHOLM 1.x\" header")]
    MissingHeader { line: usize },
    #[error("line {line}: malformed {kind} line")]
    MalformedLine { line: usize, kind: &'static str },
    #[error("record starting on line {line} is not terminated by \"//\"")]
    Unterminated { line: usize },
    #[error("record ending on line {line}: {source}")]
    InconsistentWidth {
        line: usize,
        source: InconsistentWidthError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

enum ParserState {
    Idle,
    Record,
}

/// The annotation and rows of the record being read.
#[derive(Default)]
struct RecordBuilder {
    start_line: usize,
    header: IndexMap<String, String>,
    sequences: IndexMap<String, String>,
    column_annotation: IndexMap<String, String>,
}

impl RecordBuilder {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            ..Default::default()
        }
    }

    /// File annotation spread over several lines is joined with single spaces.
    fn add_file_annotation(&mut self, key: &str, value: &str) {
        match self.header.get_mut(key) {
            Some(existing) if !value.is_empty() => {
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(value);
            }
            Some(_) => {}
            None => {
                self.header.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Rows and column annotation of interleaved blocks are concatenated.
    fn extend(map: &mut IndexMap<String, String>, key: &str, value: &str) {
        map.entry(key.to_string()).or_default().push_str(value);
    }

    fn build(self, line: usize) -> Result<AlignmentRecord, StockholmParseError> {
        AlignmentRecord::new(self.header, self.sequences, self.column_annotation)
            .map_err(|source| StockholmParseError::InconsistentWidth { line, source })
    }
}

/// Read every record of a Stockholm file.
pub fn parse_stockholm<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<AlignmentRecord>> {
    let file = File::open(&path)
        .with_context(|| format!("failed to open {}", path.as_ref().to_string_lossy()))?;

    let records = parse_stockholm_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.as_ref().to_string_lossy()))?;

    debug!(
        "read {} records from {}",
        records.len(),
        path.as_ref().to_string_lossy()
    );
    Ok(records)
}

pub fn parse_stockholm_str(text: &str) -> Result<Vec<AlignmentRecord>, StockholmParseError> {
    parse_stockholm_reader(text.as_bytes())
}

/// Read every record from a buffered source of Stockholm text.
///
/// `#=GS` and `#=GR` annotation and free comments are skipped.
pub fn parse_stockholm_reader<R: BufRead>(
    reader: R,
) -> Result<Vec<AlignmentRecord>, StockholmParseError> {
    let mut records: Vec<AlignmentRecord> = vec![];
    let mut parser_state = ParserState::Idle;
    let mut current = RecordBuilder::default();
    let mut line_number: usize = 0;

    for line in reader.lines() {
        let line = line?;
        line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parser_state {
            ParserState::Idle => {
                if !HEADER_RE.is_match(trimmed) {
                    return Err(StockholmParseError::MissingHeader { line: line_number });
                }
                current = RecordBuilder::new(line_number);
                parser_state = ParserState::Record;
            }
            ParserState::Record => {
                if trimmed == STOCKHOLM_TERMINATOR {
                    let finished = std::mem::take(&mut current);
                    records.push(finished.build(line_number)?);
                    parser_state = ParserState::Idle;
                } else if trimmed.starts_with(STOCKHOLM_FILE_FLAG) {
                    let captures = FILE_ANNOTATION_RE.captures(trimmed).ok_or(
                        StockholmParseError::MalformedLine {
                            line: line_number,
                            kind: STOCKHOLM_FILE_FLAG,
                        },
                    )?;
                    let value = captures.get(2).map_or("", |m| m.as_str());
                    current.add_file_annotation(&captures[1], value);
                } else if trimmed.starts_with(STOCKHOLM_COLUMN_FLAG) {
                    let captures = COLUMN_ANNOTATION_RE.captures(trimmed).ok_or(
                        StockholmParseError::MalformedLine {
                            line: line_number,
                            kind: STOCKHOLM_COLUMN_FLAG,
                        },
                    )?;
                    RecordBuilder::extend(
                        &mut current.column_annotation,
                        &captures[1],
                        &captures[2],
                    );
                } else if trimmed.starts_with(STOCKHOLM_SEQUENCE_FLAG)
                    || trimmed.starts_with(STOCKHOLM_RESIDUE_FLAG)
                    || trimmed.starts_with('#')
                {
                    continue;
                } else {
                    let captures =
                        SEQUENCE_RE
                            .captures(trimmed)
                            .ok_or(StockholmParseError::MalformedLine {
                                line: line_number,
                                kind: "sequence",
                            })?;
                    RecordBuilder::extend(&mut current.sequences, &captures[1], &captures[2]);
                }
            }
        }
    }

    match parser_state {
        ParserState::Idle => Ok(records),
        ParserState::Record => Err(StockholmParseError::Unterminated {
            line: current.start_line,
        }),
    }
}
