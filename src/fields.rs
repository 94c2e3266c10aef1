// Declared column-name aliases per dataset
//
// Source files spell the same column several ways (`COUNTRY`, `Country`,
// `country`). Each dataset declares its accepted spellings once, and the
// table's headers are resolved against them once, before any row is read.

use crate::data::RawTable;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The dataset shapes the dashboard loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Dataset {
    /// Yearly event counts per country (demonstrations, political violence, ...)
    Events,
    /// Yearly reported fatalities per country
    Fatalities,
    /// Weekly events broken down by event type and sub-event type
    Aggregated,
    /// Same weekly table, reading the fatality column
    AggregatedFatalities,
}

impl Dataset {
    pub fn aliases(self) -> FieldAliases {
        const COUNTRY: &[&str] = &["COUNTRY", "Country", "country"];
        const YEAR: &[&str] = &["YEAR", "Year", "year"];
        const EVENTS: &[&str] = &["EVENTS", "Events", "events"];
        const FATALITIES: &[&str] = &["FATALITIES", "Fatalities", "fatalities"];
        const WEEKLY_YEAR: &[&str] = &["YEAR", "Year", "WEEK"];
        const SUBTYPE: &[&str] = &["SUB_EVENT_TYPE", "SubEventType"];
        const EVENT_TYPE: &[&str] = &["EVENT_TYPE", "EventType"];

        match self {
            Dataset::Events => FieldAliases::new(COUNTRY, YEAR, EVENTS),
            Dataset::Fatalities => FieldAliases::new(COUNTRY, YEAR, FATALITIES),
            Dataset::Aggregated => FieldAliases::new(&COUNTRY[..2], WEEKLY_YEAR, EVENTS)
                .with_subtype(SUBTYPE)
                .with_event_type(EVENT_TYPE),
            Dataset::AggregatedFatalities => {
                FieldAliases::new(&COUNTRY[..2], WEEKLY_YEAR, FATALITIES)
                    .with_subtype(SUBTYPE)
                    .with_event_type(EVENT_TYPE)
            }
        }
    }
}

/// Accepted spellings for each canonical field, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    pub country: Vec<String>,
    pub year: Vec<String>,
    pub value: Vec<String>,
    pub subtype: Vec<String>,
    pub event_type: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl FieldAliases {
    pub fn new(country: &[&str], year: &[&str], value: &[&str]) -> Self {
        Self {
            country: owned(country),
            year: owned(year),
            value: owned(value),
            subtype: Vec::new(),
            event_type: Vec::new(),
        }
    }

    pub fn with_subtype(mut self, names: &[&str]) -> Self {
        self.subtype = owned(names);
        self
    }

    pub fn with_event_type(mut self, names: &[&str]) -> Self {
        self.event_type = owned(names);
        self
    }

    /// Resolve aliases to column indices of `table`. Aliases with no matching
    /// header are skipped; priority order is kept.
    pub fn resolve(&self, table: &RawTable) -> ColumnMap {
        let lookup = |names: &[String]| -> Vec<usize> {
            names.iter().filter_map(|n| table.column_index(n)).collect()
        };

        let columns = ColumnMap {
            country: lookup(&self.country),
            year: lookup(&self.year),
            value: lookup(&self.value),
            subtype: lookup(&self.subtype),
            event_type: lookup(&self.event_type),
        };

        if columns.country.is_empty() {
            warn!(aliases = ?self.country, "no country column found; countries will be empty");
        }
        if columns.year.is_empty() {
            warn!(aliases = ?self.year, "no year column found; every row will be dropped by the year window");
        }
        if columns.value.is_empty() {
            warn!(aliases = ?self.value, "no value column found; values default to zero");
        }

        columns
    }
}

/// Column indices for each canonical field, resolved against one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub country: Vec<usize>,
    pub year: Vec<usize>,
    pub value: Vec<usize>,
    pub subtype: Vec<usize>,
    pub event_type: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> RawTable {
        RawTable::new(owned(headers), vec![])
    }

    #[test]
    fn test_resolve_events_table() {
        let columns = Dataset::Events.aliases().resolve(&table(&["Country", "Year", "Events"]));
        assert_eq!(columns.country, vec![0]);
        assert_eq!(columns.year, vec![1]);
        assert_eq!(columns.value, vec![2]);
        assert!(columns.subtype.is_empty());
    }

    #[test]
    fn test_resolve_keeps_priority_order() {
        let columns = Dataset::Events
            .aliases()
            .resolve(&table(&["country", "COUNTRY", "YEAR", "EVENTS"]));
        assert_eq!(columns.country, vec![1, 0]);
    }

    #[test]
    fn test_weekly_table_falls_back_to_week_column() {
        let columns = Dataset::Aggregated.aliases().resolve(&table(&[
            "WEEK",
            "COUNTRY",
            "EVENT_TYPE",
            "SUB_EVENT_TYPE",
            "EVENTS",
            "FATALITIES",
        ]));
        assert_eq!(columns.year, vec![0]);
        assert_eq!(columns.event_type, vec![2]);
        assert_eq!(columns.subtype, vec![3]);
        assert_eq!(columns.value, vec![4]);

        let fatalities = Dataset::AggregatedFatalities.aliases().resolve(&table(&[
            "WEEK",
            "COUNTRY",
            "EVENTS",
            "FATALITIES",
        ]));
        assert_eq!(fatalities.value, vec![3]);
    }

    #[test]
    fn test_missing_columns_resolve_empty() {
        let columns = Dataset::Fatalities.aliases().resolve(&table(&["Country", "Year"]));
        assert!(columns.value.is_empty());
    }
}
