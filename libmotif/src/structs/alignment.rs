use std::fmt::{Debug, Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::alphabet::is_gap;

pub const ACCESSION_KEY: &str = "AC";
pub const IDENTIFIER_KEY: &str = "ID";
pub const CONSENSUS_STRUCTURE_KEY: &str = "SS_cons";

/// An Error that is thrown when a header or column annotation
/// that a pipeline step relies on is absent from a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing {scope} annotation: {key}")]
pub struct MissingAnnotationKeyError {
    pub scope: AnnotationScope,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationScope {
    Header,
    Column,
}

impl Display for AnnotationScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationScope::Header => write!(f, "header"),
            AnnotationScope::Column => write!(f, "column"),
        }
    }
}

/// An Error that is thrown when a row or annotation
/// doesn't span the full width of its alignment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name} has length {length}, but the alignment has width {width}")]
pub struct InconsistentWidthError {
    pub name: String,
    pub length: usize,
    pub width: usize,
}

/// The aligned residue matrix of a record.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Alignment {
    /// The number of columns
    pub width: usize,
    /// The aligned rows as UTF8 bytes, gaps included
    #[serde(serialize_with = "serialize_rows")]
    pub rows: Vec<Vec<u8>>,
}

fn serialize_rows<S: serde::Serializer>(rows: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(rows.iter().map(|row| String::from_utf8_lossy(row)))
}

impl Alignment {
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self, InconsistentWidthError> {
        let width = rows.first().map_or(0, |r| r.len());

        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(InconsistentWidthError {
                name: format!("alignment row {idx}"),
                length: row.len(),
                width,
            });
        }

        Ok(Self { width, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Debug for Alignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for row in self.rows.iter() {
            writeln!(f, "{}", String::from_utf8_lossy(row))?;
        }
        Ok(())
    }
}

/// One annotated seed alignment.
#[derive(Debug, Clone, Default)]
pub struct AlignmentRecord {
    /// The per-file annotation (e.g. "AC", "ID")
    pub header: IndexMap<String, String>,
    /// The aligned sequences, in file order
    pub sequences: IndexMap<String, String>,
    /// The per-column annotation (e.g. "SS_cons")
    pub column_annotation: IndexMap<String, String>,
    /// The aligned residues as a matrix, rows in the order of `sequences`
    pub alignment: Alignment,
}

impl AlignmentRecord {
    /// Assemble a record, checking that every row and
    /// column annotation spans the alignment width.
    pub fn new(
        header: IndexMap<String, String>,
        sequences: IndexMap<String, String>,
        column_annotation: IndexMap<String, String>,
    ) -> Result<Self, InconsistentWidthError> {
        let alignment = Alignment::new(
            sequences
                .values()
                .map(|s| s.as_bytes().to_vec())
                .collect(),
        )
        .map_err(|mut err| {
            // report the sequence name rather than the row index
            if let Some((name, _)) = sequences.iter().find(|(_, s)| s.len() == err.length) {
                err.name = name.clone();
            }
            err
        })?;

        if let Some((key, value)) = column_annotation
            .iter()
            .find(|(_, v)| v.len() != alignment.width)
        {
            return Err(InconsistentWidthError {
                name: format!("#=GC {key}"),
                length: value.len(),
                width: alignment.width,
            });
        }

        Ok(Self {
            header,
            sequences,
            column_annotation,
            alignment,
        })
    }

    pub fn width(&self) -> usize {
        self.alignment.width
    }

    pub fn header_value(&self, key: &str) -> Result<&str, MissingAnnotationKeyError> {
        self.header
            .get(key)
            .map(|v| v.as_str())
            .ok_or_else(|| MissingAnnotationKeyError {
                scope: AnnotationScope::Header,
                key: key.to_string(),
            })
    }

    pub fn column_annotation_value(&self, key: &str) -> Result<&str, MissingAnnotationKeyError> {
        self.column_annotation
            .get(key)
            .map(|v| v.as_str())
            .ok_or_else(|| MissingAnnotationKeyError {
                scope: AnnotationScope::Column,
                key: key.to_string(),
            })
    }

    /// The ungapped length of the first sequence, which stands in
    /// for the length of the whole family when deciding to skip it.
    pub fn representative_length(&self) -> usize {
        self.sequences
            .values()
            .next()
            .map_or(0, |s| s.bytes().filter(|&b| !is_gap(b)).count())
    }

    /// A short label for log lines: "AC : ID" when both are present.
    pub fn label(&self) -> Option<String> {
        let accession = self.header_value(ACCESSION_KEY).ok()?;
        let identifier = self.header_value(IDENTIFIER_KEY).ok()?;
        Some(format!("{accession} : {identifier}"))
    }
}
