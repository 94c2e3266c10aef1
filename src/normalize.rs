// Raw rows to canonical records

use crate::data::RawTable;
use crate::fields::{ColumnMap, FieldAliases};
use crate::parser::parse_year;
use serde::Serialize;
use tracing::debug;

/// Canonical record shared by every chart.
///
/// `year` is `None` when the year cell could not be read; such records are
/// dropped by the range filter rather than here. `value` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub country: String,
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub value: f64,
}

impl Record {
    pub fn new(country: impl Into<String>, year: i32, value: f64) -> Self {
        Self {
            country: country.into(),
            year: Some(year),
            event_type: None,
            subtype: None,
            value,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }
}

/// Numeric coercion for value cells. Empty, non-numeric, non-finite and
/// negative inputs all become zero.
pub fn coerce_value(cell: &str) -> f64 {
    match cell.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// First non-empty trimmed cell among `indices`
fn first_text<'a>(row: &'a [String], indices: &[usize]) -> Option<&'a str> {
    indices
        .iter()
        .filter_map(|&i| row.get(i))
        .map(|cell| cell.trim())
        .find(|cell| !cell.is_empty())
}

/// Normalize one raw row against pre-resolved columns.
///
/// Returns `None` for a row that carries no country, year or value text at
/// all (blank lines, separator rows). Every other row produces a record, with
/// missing fields defaulted: empty country, `None` year, zero value.
pub fn normalize_row(row: &[String], columns: &ColumnMap) -> Option<Record> {
    let country = first_text(row, &columns.country);
    let year_text = first_text(row, &columns.year);
    let value_text = first_text(row, &columns.value);

    if country.is_none() && year_text.is_none() && value_text.is_none() {
        return None;
    }

    Some(Record {
        country: country.unwrap_or_default().to_string(),
        year: year_text.and_then(parse_year),
        event_type: first_text(row, &columns.event_type).map(str::to_string),
        subtype: first_text(row, &columns.subtype).map(str::to_string),
        value: value_text.map(coerce_value).unwrap_or(0.0),
    })
}

/// Normalize every row of a table. Aliases are resolved once for the table.
pub fn normalize_table(table: &RawTable, aliases: &FieldAliases) -> Vec<Record> {
    let columns = aliases.resolve(table);
    let records: Vec<Record> = table
        .rows
        .iter()
        .filter_map(|row| normalize_row(row, &columns))
        .collect();

    debug!(
        rows = table.len(),
        records = records.len(),
        "normalized raw table"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Dataset;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn events_table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(row(headers), rows.iter().map(|r| row(r)).collect())
    }

    #[test]
    fn test_normalize_trims_and_coerces() {
        let table = events_table(&["COUNTRY", "YEAR", "EVENTS"], &[&[" Syria ", " 2020", "100 "]]);
        let records = normalize_table(&table, &Dataset::Events.aliases());
        assert_eq!(records, vec![Record::new("Syria", 2020, 100.0)]);
    }

    #[test]
    fn test_missing_value_is_zero() {
        let table = events_table(
            &["Country", "Year", "Events"],
            &[&["Iraq", "2019", ""], &["Iraq", "2020", "n/a"], &["Iraq", "2021", "-4"]],
        );
        let records = normalize_table(&table, &Dataset::Events.aliases());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.value == 0.0));
    }

    #[test]
    fn test_value_column_absent_defaults_to_zero() {
        let table = events_table(&["Country", "Year"], &[&["Iraq", "2019"]]);
        let records = normalize_table(&table, &Dataset::Fatalities.aliases());
        assert_eq!(records[0].value, 0.0);
    }

    #[test]
    fn test_unparseable_year_is_kept_as_none() {
        let table = events_table(&["country", "year", "events"], &[&["Lebanon", "unknown", "3"]]);
        let records = normalize_table(&table, &Dataset::Events.aliases());
        assert_eq!(records[0].year, None);
        assert_eq!(records[0].value, 3.0);
    }

    #[test]
    fn test_first_non_empty_alias_wins() {
        let table = events_table(&["COUNTRY", "Country", "YEAR", "EVENTS"], &[&["", "Jordan", "2018", "7"]]);
        let records = normalize_table(&table, &Dataset::Events.aliases());
        assert_eq!(records[0].country, "Jordan");
    }

    #[test]
    fn test_blank_rows_are_unusable() {
        let table = events_table(&["COUNTRY", "YEAR", "EVENTS"], &[&["", " ", ""], &["Oman", "2016", "1"]]);
        let records = normalize_table(&table, &Dataset::Events.aliases());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "Oman");
    }

    #[test]
    fn test_weekly_rows_carry_types() {
        let table = events_table(
            &["WEEK", "COUNTRY", "EVENT_TYPE", "SUB_EVENT_TYPE", "EVENTS", "FATALITIES"],
            &[&["04-January-2020", "Yemen", "Protests", "Peaceful protest", "12", "0"]],
        );
        let records = normalize_table(&table, &Dataset::Aggregated.aliases());
        let expected = Record::new("Yemen", 2020, 12.0)
            .with_event_type("Protests")
            .with_subtype("Peaceful protest");
        assert_eq!(records, vec![expected]);
    }
}
