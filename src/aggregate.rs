// Grouping and reduction of filtered records
//
// Groups keep the order in which their key was first seen, so rankings can
// break ties by first appearance after a stable sort.

use crate::filter::YearWindow;
use crate::normalize::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A record field usable as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    Year,
    Subtype,
    EventType,
}

impl Dimension {
    /// Case-insensitive lookup by name, accepting the source column spellings
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "country" => Some(Dimension::Country),
            "year" => Some(Dimension::Year),
            "subtype" | "sub_event_type" | "subeventtype" | "sub-type" => Some(Dimension::Subtype),
            "event_type" | "eventtype" | "event-type" => Some(Dimension::EventType),
            _ => None,
        }
    }

    /// Key text for `record`; absent fields give an empty string.
    pub fn extract(self, record: &Record) -> String {
        match self {
            Dimension::Country => record.country.clone(),
            Dimension::Year => record.year.map(|y| y.to_string()).unwrap_or_default(),
            Dimension::Subtype => record.subtype.clone().unwrap_or_default(),
            Dimension::EventType => record.event_type.clone().unwrap_or_default(),
        }
    }
}

/// Composite grouping key. Displays and serializes as its parts joined by `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn from_record(record: &Record, dims: &[Dimension]) -> Self {
        GroupKey(dims.iter().map(|d| d.extract(record)).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn part(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How each group is reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    /// Sum of values
    Sum,
    /// Every value, in record order
    Collect,
}

/// Key -> summed value. A key that is absent had no rows, which is not the
/// same as a key whose rows sum to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Rollup {
    groups: IndexMap<GroupKey, f64>,
}

impl Rollup {
    pub fn get(&self, key: &GroupKey) -> Option<f64> {
        self.groups.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, f64)> {
        self.groups.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    pub fn total(&self) -> f64 {
        self.groups.values().sum()
    }

    /// Groups by value descending; ties keep first-seen order
    pub fn ranked(&self) -> Vec<RankedGroup> {
        let mut ranked: Vec<RankedGroup> = self
            .iter()
            .map(|(key, value)| RankedGroup {
                key: key.clone(),
                value,
            })
            .collect();
        ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        ranked
    }

    pub fn top_n(&self, n: usize) -> Vec<RankedGroup> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedGroup {
    pub key: GroupKey,
    pub value: f64,
}

/// Key -> contributing values, in record order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Collected {
    groups: IndexMap<GroupKey, Vec<f64>>,
}

impl Collected {
    pub fn get(&self, key: &GroupKey) -> Option<&[f64]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &[f64])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Aggregation {
    Rollup(Rollup),
    Collected(Collected),
}

/// Group `records` by the given dimensions and reduce with `mode`
pub fn aggregate(records: &[Record], dims: &[Dimension], mode: Reduce) -> Aggregation {
    aggregate_by(records, |r| GroupKey::from_record(r, dims), mode)
}

/// Group `records` by an arbitrary key extractor and reduce with `mode`
pub fn aggregate_by<F>(records: &[Record], key_fn: F, mode: Reduce) -> Aggregation
where
    F: Fn(&Record) -> GroupKey,
{
    match mode {
        Reduce::Sum => Aggregation::Rollup(rollup_by(records, key_fn)),
        Reduce::Collect => Aggregation::Collected(collect_by(records, key_fn)),
    }
}

pub fn rollup(records: &[Record], dims: &[Dimension]) -> Rollup {
    rollup_by(records, |r| GroupKey::from_record(r, dims))
}

pub fn rollup_by<F>(records: &[Record], key_fn: F) -> Rollup
where
    F: Fn(&Record) -> GroupKey,
{
    let mut groups: IndexMap<GroupKey, f64> = IndexMap::new();
    for record in records {
        *groups.entry(key_fn(record)).or_insert(0.0) += record.value;
    }
    Rollup { groups }
}

pub fn collect(records: &[Record], dims: &[Dimension]) -> Collected {
    collect_by(records, |r| GroupKey::from_record(r, dims))
}

pub fn collect_by<F>(records: &[Record], key_fn: F) -> Collected
where
    F: Fn(&Record) -> GroupKey,
{
    let mut groups: IndexMap<GroupKey, Vec<f64>> = IndexMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record.value);
    }
    Collected { groups }
}

// =============================================================================
// Derived tables
// =============================================================================

/// One year of a series. `value` is `None` when the year had no rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: i32,
    pub value: Option<f64>,
}

impl YearPoint {
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// Sum per year over every year of `window`, keeping missing years distinct
/// from zero years.
pub fn year_series(records: &[Record], window: YearWindow) -> Vec<YearPoint> {
    let by_year = rollup(records, &[Dimension::Year]);
    window
        .years()
        .map(|year| YearPoint {
            year,
            value: by_year.get(&GroupKey::new([year.to_string()])),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub row: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// Dense row x year table. Rows are ordered by their total, descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub rows: Vec<String>,
    pub years: Vec<i32>,
    pub cells: Vec<GridCell>,
}

pub fn dense_grid(records: &[Record], row_dim: Dimension, window: YearWindow) -> Grid {
    let totals = rollup(records, &[row_dim]);
    let cells_by_key = rollup(records, &[row_dim, Dimension::Year]);

    let rows: Vec<String> = totals
        .ranked()
        .into_iter()
        .map(|g| g.key.parts().join("|"))
        .collect();
    let years: Vec<i32> = window.years().collect();

    let mut cells = Vec::with_capacity(rows.len() * years.len());
    for row in &rows {
        for &year in &years {
            cells.push(GridCell {
                row: row.clone(),
                year,
                value: cells_by_key.get(&GroupKey::new([row.clone(), year.to_string()])),
            });
        }
    }

    Grid { rows, years, cells }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowNode {
    pub id: String,
    /// Position of the key part this node came from (0 = source side)
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLink {
    pub source: String,
    pub target: String,
    pub value: f64,
    /// Summed fatalities for the same key, when a fatality rollup was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatalities: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

/// Build source -> target links from the first two parts of each rollup key.
/// Links with a zero value are dropped, and only nodes touched by a kept
/// link are emitted.
pub fn flow_graph(rollup: &Rollup) -> FlowGraph {
    flow_graph_with(rollup, None)
}

/// Like [`flow_graph`], annotating each link with the matching key of
/// `fatalities` (a rollup over the same dimensions).
pub fn flow_graph_with(rollup: &Rollup, fatalities: Option<&Rollup>) -> FlowGraph {
    let mut graph = FlowGraph::default();

    for (key, value) in rollup.iter() {
        let (Some(source), Some(target)) = (key.part(0), key.part(1)) else {
            continue;
        };
        if value <= 0.0 {
            continue;
        }

        for (level, id) in [(0, source), (1, target)] {
            if !graph.nodes.iter().any(|n| n.level == level && n.id == id) {
                graph.nodes.push(FlowNode {
                    id: id.to_string(),
                    level,
                });
            }
        }
        graph.links.push(FlowLink {
            source: source.to_string(),
            target: target.to_string(),
            value,
            fatalities: fatalities.and_then(|f| f.get(key)),
        });
    }

    graph
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proportion {
    pub key: GroupKey,
    pub value: f64,
    /// Fraction of the total over all positive groups
    pub share: f64,
    /// 1-based
    pub rank: usize,
}

/// Positive groups ranked by value with their share of the total
pub fn proportions(rollup: &Rollup) -> Vec<Proportion> {
    let ranked: Vec<RankedGroup> = rollup.ranked().into_iter().filter(|g| g.value > 0.0).collect();
    let sum: f64 = ranked.iter().map(|g| g.value).sum();
    let total = if sum > 0.0 { sum } else { 1.0 };

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, g)| Proportion {
            share: g.value / total,
            rank: i + 1,
            key: g.key,
            value: g.value,
        })
        .collect()
}
