// CSV ingestion for raw dataset tables

use crate::error::DataError;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Headers plus string cells, exactly as read. Short rows are padded with
/// empty cells so every row lines up with the headers.
#[derive(Debug, Clone, Default)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read CSV data from stdin
pub fn read_csv_from_stdin() -> Result<CsvData, DataError> {
    read_csv(io::stdin().lock())
}

/// Read CSV data from a file on disk
pub fn read_csv_file(path: &Path) -> Result<CsvData, DataError> {
    let file = File::open(path).map_err(|source| DataError::File {
        path: path.display().to_string(),
        source,
    })?;
    read_csv(file)
}

/// Read CSV data from any reader. The raw source files use `;` while the
/// cleaned exports use `,`; the header line decides which one applies.
pub fn read_csv<R: Read>(reader: R) -> Result<CsvData, DataError> {
    let mut buffered = BufReader::new(reader);
    let mut first_line = String::new();
    buffered.read_line(&mut first_line)?;

    if first_line.trim().is_empty() {
        return Err(DataError::MissingHeader);
    }

    let delimiter = sniff_delimiter(&first_line);
    let chained = io::Cursor::new(first_line.into_bytes()).chain(buffered);

    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(chained);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    Ok(CsvData { headers, rows })
}

fn sniff_delimiter(header_line: &str) -> u8 {
    let commas = header_line.matches(',').count();
    let semicolons = header_line.matches(';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
