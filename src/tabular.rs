//! CSV input and scored output for batch files

use crate::types::CompositeScore;
use std::io::{Read, Write};
use thiserror::Error;

/// Columns appended to every scored row, in order
pub const SCORE_COLUMNS: [&str; 4] = [
    "QuAL Score",
    "Evidence Score",
    "Suggestion Given",
    "Suggestion Linked",
];

const HASH_REPLACEMENT: &str = "-hash-";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column {0:?} not found in header")]
    MissingColumn(String),

    #[error("Table has {rows} rows but {scores} scores were given")]
    LengthMismatch { rows: usize, scores: usize },
}

/// A parsed CSV file: the header row plus every data row.
///
/// Short rows are padded with empty fields so every row lines up with the
/// header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of a named column
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a headed CSV document
pub fn read_rows<R: Read>(reader: R) -> Result<Table, TableError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in csv.records() {
        let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    Ok(Table { headers, rows })
}

/// Build one comment per row from the named feedback columns.
///
/// Non-empty values are joined with a single space. A row with no feedback
/// still yields an (empty) comment so output indices match the rows.
pub fn collect_comments<S: AsRef<str>>(
    table: &Table,
    feedback_columns: &[S],
) -> Result<Vec<String>, TableError> {
    let indices = feedback_columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            table
                .column(name)
                .ok_or_else(|| TableError::MissingColumn(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(table
        .rows
        .iter()
        .map(|row| {
            indices
                .iter()
                .filter_map(|&i| row.get(i))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect())
}

/// Write `table` with the score columns appended.
///
/// A `None` score leaves its four cells empty.
pub fn write_scored<W: Write>(
    writer: W,
    table: &Table,
    scores: &[Option<CompositeScore>],
) -> Result<(), TableError> {
    if table.rows.len() != scores.len() {
        return Err(TableError::LengthMismatch {
            rows: table.rows.len(),
            scores: scores.len(),
        });
    }

    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    let header = table
        .headers
        .iter()
        .map(String::as_str)
        .chain(SCORE_COLUMNS)
        .map(escape_hash);
    csv.write_record(header)?;

    for (row, score) in table.rows.iter().zip(scores) {
        let cells = match score {
            Some(score) => [
                score.qual.to_string(),
                score.q1.clone(),
                score.q2i.to_string(),
                score.q3i.to_string(),
            ],
            None => Default::default(),
        };
        let record = row
            .iter()
            .map(String::as_str)
            .chain(cells.iter().map(String::as_str))
            .map(escape_hash);
        csv.write_record(record)?;
    }

    csv.flush()?;
    Ok(())
}

fn escape_hash(field: &str) -> String {
    field.replace('#', HASH_REPLACEMENT)
}
