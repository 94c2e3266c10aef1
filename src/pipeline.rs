// Chart-facing entry points
//
// Every chart runs the same stages: raw rows -> normalize -> range filter ->
// aggregate -> statistics. A `Pipeline` holds only its configuration; every
// call reads its input and returns freshly allocated output, so repeated or
// overlapping calls never interfere.

use crate::aggregate::{
    self, Collected, Dimension, FlowGraph, Grid, GroupKey, Proportion, RankedGroup, Rollup,
    YearPoint,
};
use crate::data::RawTable;
use crate::fields::{Dataset, FieldAliases};
use crate::filter::{range_filter, AllowList, CountryTable, YearWindow};
use crate::normalize::{normalize_table, Record};
use crate::stats::{
    self, BoxStats, Bin, Density, Share, Sufficiency, Summary, VIOLIN_BIN_WIDTH, VIOLIN_DOMAIN,
};
use crate::PipelineConfig;
use serde::Serialize;
use tracing::{debug, warn};

/// Optional exact-match constraints applied before grouping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub country: Option<String>,
    pub subtype: Option<String>,
    pub event_type: Option<String>,
}

impl Selection {
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            ..Self::default()
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

    pub fn matches(&self, record: &Record) -> bool {
        let field_matches = |wanted: &Option<String>, actual: Option<&str>| match wanted {
            Some(w) => actual == Some(w.as_str()),
            None => true,
        };
        field_matches(&self.country, Some(record.country.as_str()))
            && field_matches(&self.subtype, record.subtype.as_deref())
            && field_matches(&self.event_type, record.event_type.as_deref())
    }

    fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBox {
    pub key: GroupKey,
    pub stats: Option<BoxStats>,
}

/// One labelled input series for a box plot comparison
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub label: &'a str,
    pub records: &'a [Record],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesBox {
    pub label: String,
    /// `None` when the series has no rows for the country
    pub stats: Option<BoxStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDensity {
    pub key: GroupKey,
    pub sufficiency: Sufficiency,
    pub summary: Option<Summary>,
    pub density: Density,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearDensity {
    pub year: i32,
    pub sufficiency: Sufficiency,
    pub summary: Option<Summary>,
    pub density: Density,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearHistogram {
    pub year: i32,
    pub sufficiency: Sufficiency,
    pub summary: Option<Summary>,
    pub bins: Vec<Bin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedShare {
    pub key: GroupKey,
    #[serde(flatten)]
    pub share: Share,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    allow: AllowList,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let allow = config.allow_list();
        Self { config, allow }
    }

    /// Admit the countries of a reference table in addition to any configured
    pub fn with_countries(mut self, countries: &CountryTable) -> Self {
        self.allow.extend(&countries.allow_list());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn window(&self) -> YearWindow {
        self.config.window()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    /// Normalize and range-filter a raw table read as `dataset`
    pub fn prepare(&self, table: &RawTable, dataset: Dataset) -> Vec<Record> {
        self.prepare_with(table, &dataset.aliases())
    }

    pub fn prepare_with(&self, table: &RawTable, aliases: &FieldAliases) -> Vec<Record> {
        let records = normalize_table(table, aliases);
        range_filter(&records, self.window(), &self.allow)
    }

    pub fn rollup(&self, records: &[Record], dims: &[Dimension]) -> Rollup {
        aggregate::rollup(records, dims)
    }

    pub fn collect(&self, records: &[Record], dims: &[Dimension]) -> Collected {
        aggregate::collect(records, dims)
    }

    /// Box statistics for every group of `dims`
    pub fn box_stats_by(&self, records: &[Record], dims: &[Dimension]) -> Vec<GroupBox> {
        aggregate::collect(records, dims)
            .iter()
            .map(|(key, values)| GroupBox {
                key: key.clone(),
                stats: stats::box_stats(values),
            })
            .collect()
    }

    /// Box statistics of one country's values in each series. A series with
    /// no rows for the country is kept with `stats: None`.
    pub fn box_series(&self, series: &[Series<'_>], country: &str) -> Vec<SeriesBox> {
        let selection = Selection::country(country);
        series
            .iter()
            .map(|s| {
                let values: Vec<f64> = s
                    .records
                    .iter()
                    .filter(|r| selection.matches(r))
                    .map(|r| r.value)
                    .collect();
                SeriesBox {
                    label: s.label.to_string(),
                    stats: stats::box_stats(&values),
                }
            })
            .collect()
    }

    fn describe(&self, values: &[f64]) -> (Sufficiency, Option<Summary>, Density) {
        (
            stats::sufficiency(values.len(), self.config.min_sample_size),
            stats::summarize(values),
            stats::kde(values, self.config.bandwidth),
        )
    }

    /// Density curve for every group of `dims`
    pub fn density_by(&self, records: &[Record], dims: &[Dimension]) -> Vec<GroupDensity> {
        aggregate::collect(records, dims)
            .iter()
            .map(|(key, values)| {
                let (sufficiency, summary, density) = self.describe(values);
                GroupDensity {
                    key: key.clone(),
                    sufficiency,
                    summary,
                    density,
                }
            })
            .collect()
    }

    /// One density curve per window year, newest first. Years without rows
    /// are present with `Sufficiency::NoData` and an empty curve.
    pub fn ridgeline(&self, records: &[Record], selection: &Selection) -> Vec<YearDensity> {
        let selected = selection.apply(records);
        let by_year = aggregate::collect(&selected, &[Dimension::Year]);

        self.window()
            .years()
            .rev()
            .map(|year| {
                let values = by_year
                    .get(&GroupKey::new([year.to_string()]))
                    .unwrap_or(&[]);
                let (sufficiency, summary, density) = self.describe(values);
                YearDensity {
                    year,
                    sufficiency,
                    summary,
                    density,
                }
            })
            .collect()
    }

    /// Binned value distribution per year, oldest first, for years with rows
    pub fn violin(&self, records: &[Record], selection: &Selection) -> Vec<YearHistogram> {
        let selected = selection.apply(records);
        let by_year = aggregate::collect(&selected, &[Dimension::Year]);
        let (lo, hi) = VIOLIN_DOMAIN;

        self.window()
            .years()
            .filter_map(|year| {
                let values = by_year.get(&GroupKey::new([year.to_string()]))?;
                Some(YearHistogram {
                    year,
                    sufficiency: stats::sufficiency(values.len(), self.config.min_sample_size),
                    summary: stats::summarize(values),
                    bins: stats::histogram(values, lo, hi, VIOLIN_BIN_WIDTH),
                })
            })
            .collect()
    }

    /// Share of `part` in `whole` per (country, year). Keys come from both
    /// inputs, `whole` first; a key missing on one side counts as zero there.
    pub fn shares(&self, part: &[Record], whole: &[Record]) -> Vec<KeyedShare> {
        let dims = [Dimension::Country, Dimension::Year];
        let parts = aggregate::rollup(part, &dims);
        let wholes = aggregate::rollup(whole, &dims);

        let mut keys: Vec<&GroupKey> = wholes.keys().collect();
        for key in parts.keys() {
            if wholes.get(key).is_none() {
                keys.push(key);
            }
        }

        keys.into_iter()
            .map(|key| KeyedShare {
                key: key.clone(),
                share: stats::share(
                    parts.get(key).unwrap_or(0.0),
                    wholes.get(key).unwrap_or(0.0),
                ),
            })
            .collect()
    }

    /// Share for a single country and year
    pub fn share_for(&self, part: &[Record], whole: &[Record], country: &str, year: i32) -> Share {
        let pick = |records: &[Record]| -> f64 {
            records
                .iter()
                .filter(|r| r.country == country && r.year == Some(year))
                .map(|r| r.value)
                .sum()
        };
        stats::share(pick(part), pick(whole))
    }

    fn in_year(records: &[Record], year: i32) -> Vec<Record> {
        records.iter().filter(|r| r.year == Some(year)).cloned().collect()
    }

    /// Countries ranked by their total in `year`, at most `n`
    pub fn top(&self, records: &[Record], year: i32, n: usize) -> Vec<RankedGroup> {
        aggregate::rollup(&Self::in_year(records, year), &[Dimension::Country]).top_n(n)
    }

    /// Each country's share of the `year` total, positive totals only
    pub fn proportions(&self, records: &[Record], year: i32) -> Vec<Proportion> {
        aggregate::proportions(&aggregate::rollup(
            &Self::in_year(records, year),
            &[Dimension::Country],
        ))
    }

    /// Yearly totals over the window, with years lacking rows left as `None`
    pub fn year_series(&self, records: &[Record], selection: &Selection) -> Vec<YearPoint> {
        let series = aggregate::year_series(&selection.apply(records), self.window());

        let missing: Vec<i32> = series.iter().filter(|p| p.is_missing()).map(|p| p.year).collect();
        if !missing.is_empty() {
            warn!(?missing, ?selection, "not enough data for some years");
        }
        series
    }

    /// Country x year grid, countries ordered by total
    pub fn heatmap(&self, records: &[Record]) -> Grid {
        let grid = aggregate::dense_grid(records, Dimension::Country, self.window());
        debug!(rows = grid.rows.len(), years = grid.years.len(), "built heatmap grid");
        grid
    }

    /// Source -> target flows over `dims`, weighted by summed value
    pub fn flows(
        &self,
        records: &[Record],
        selection: &Selection,
        dims: [Dimension; 2],
    ) -> FlowGraph {
        self.flows_with_fatalities(records, None, selection, dims)
    }

    /// Flows weighted by `events`, each link also carrying the fatality sum
    /// of the same key when `fatalities` is given.
    pub fn flows_with_fatalities(
        &self,
        events: &[Record],
        fatalities: Option<&[Record]>,
        selection: &Selection,
        dims: [Dimension; 2],
    ) -> FlowGraph {
        let weights = aggregate::rollup(&selection.apply(events), &dims);
        let deaths = fatalities.map(|f| aggregate::rollup(&selection.apply(f), &dims));
        let graph = aggregate::flow_graph_with(&weights, deaths.as_ref());
        debug!(nodes = graph.nodes.len(), links = graph.links.len(), ?dims, "built flow graph");
        graph
    }
}

/// Event type -> sub-event type, as drawn by the sankey chart
pub const SANKEY_FLOW: [Dimension; 2] = [Dimension::EventType, Dimension::Subtype];

/// Country -> event type, as exported for the network graph
pub const NETWORK_FLOW: [Dimension; 2] = [Dimension::Country, Dimension::EventType];

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly(country: &str, year: i32, subtype: &str, events: f64) -> Record {
        Record::new(country, year, events)
            .with_event_type("Protests")
            .with_subtype(subtype)
    }

    fn make_table() -> RawTable {
        let row = |cells: &[&str]| cells.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        RawTable::new(
            row(&["COUNTRY", "YEAR", "EVENTS"]),
            vec![
                row(&["Syria", "2020", "100"]),
                row(&["Syria", "2020", "50"]),
                row(&["Syria", "2013", "7"]),
                row(&["France", "2020", "9"]),
                row(&["Iraq", "bad", "4"]),
            ],
        )
    }

    #[test]
    fn test_prepare_filters_window_and_countries() {
        let mut config = PipelineConfig::default();
        config.allowed_countries = vec!["Syria".into(), "Iraq".into()];
        let pipeline = Pipeline::new(config);

        let records = pipeline.prepare(&make_table(), Dataset::Events);
        assert_eq!(records.len(), 2);
        let rollup = pipeline.rollup(&records, &[Dimension::Country, Dimension::Year]);
        assert_eq!(rollup.get(&GroupKey::new(["Syria", "2020"])), Some(150.0));
    }

    #[test]
    fn test_country_table_extends_allow_list() {
        let countries = CountryTable::from_table(&RawTable::new(
            vec!["Country".into()],
            vec![vec!["France".into()]],
        ));
        let pipeline = Pipeline::default().with_countries(&countries);
        let records = pipeline.prepare(&make_table(), Dataset::Events);
        assert_eq!(records, vec![Record::new("France", 2020, 9.0)]);
    }

    #[test]
    fn test_prepare_does_not_mutate_input() {
        let table = make_table();
        let before = table.rows.clone();
        let _ = Pipeline::default().prepare(&table, Dataset::Events);
        assert_eq!(table.rows, before);
    }

    #[test]
    fn test_box_series_keeps_empty_series() {
        let a = vec![Record::new("Syria", 2020, 1.0), Record::new("Syria", 2021, 3.0)];
        let b = vec![Record::new("Iraq", 2020, 2.0)];
        let boxes = Pipeline::default().box_series(
            &[
                Series { label: "Demonstrations", records: &a },
                Series { label: "Fatalities", records: &b },
            ],
            "Syria",
        );
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].stats.as_ref().map(|s| s.median), Some(2.0));
        assert_eq!(boxes[1].label, "Fatalities");
        assert!(boxes[1].stats.is_none());
    }

    #[test]
    fn test_ridgeline_covers_every_year_newest_first() {
        let records = vec![
            weekly("Syria", 2020, "Peaceful protest", 4.0),
            weekly("Syria", 2020, "Peaceful protest", 6.0),
            weekly("Syria", 2021, "Peaceful protest", 42.0),
            weekly("Syria", 2021, "Violent demonstration", 1.0),
            weekly("Palestine", 2019, "Peaceful protest", 3.0),
        ];
        let selection = Selection::country("Syria").with_subtype("Peaceful protest");
        let ridges = Pipeline::default().ridgeline(&records, &selection);

        assert_eq!(ridges.len(), 10);
        assert_eq!(ridges[0].year, 2024);
        assert_eq!(ridges[9].year, 2015);

        let y2021 = ridges.iter().find(|r| r.year == 2021).unwrap();
        assert_eq!(y2021.density, Density::Spike { x: 42.0 });
        assert_eq!(y2021.sufficiency, Sufficiency::Insufficient);

        let y2020 = ridges.iter().find(|r| r.year == 2020).unwrap();
        assert_eq!(y2020.density.peak(), Some(1.0));

        let y2019 = ridges.iter().find(|r| r.year == 2019).unwrap();
        assert_eq!(y2019.sufficiency, Sufficiency::NoData);
        assert!(y2019.density.is_empty());
        assert!(y2019.summary.is_none());
    }

    #[test]
    fn test_violin_only_years_with_data() {
        let records: Vec<Record> = (0..25)
            .map(|i| weekly("Palestine", 2023, "Peaceful protest", i as f64))
            .chain(std::iter::once(weekly("Palestine", 2016, "Peaceful protest", 7.0)))
            .collect();
        let violins = Pipeline::default().violin(&records, &Selection::country("Palestine"));
        let years: Vec<i32> = violins.iter().map(|v| v.year).collect();
        assert_eq!(years, vec![2016, 2023]);
        assert_eq!(violins[1].sufficiency, Sufficiency::Sufficient);
        assert_eq!(violins[1].bins.len(), 5);
        assert_eq!(violins[0].sufficiency, Sufficiency::Insufficient);
    }

    #[test]
    fn test_shares_union_of_keys() {
        let civilians = vec![
            Record::new("Syria", 2020, 30.0),
            Record::new("Iraq", 2020, 5.0),
        ];
        let total = vec![
            Record::new("Syria", 2020, 100.0),
            Record::new("Syria", 2020, 20.0),
            Record::new("Yemen", 2020, 10.0),
        ];
        let shares = Pipeline::default().shares(&civilians, &total);
        let keys: Vec<String> = shares.iter().map(|s| s.key.to_string()).collect();
        assert_eq!(keys, vec!["Syria|2020", "Yemen|2020", "Iraq|2020"]);

        assert!((shares[0].share.share - 0.25).abs() < 1e-12);
        assert_eq!(shares[0].share.other, 90.0);
        assert_eq!(shares[1].share.part, 0.0);
        assert_eq!(shares[2].share.share, 0.0);
        assert_eq!(shares[2].share.other, 0.0);
    }

    #[test]
    fn test_shares_are_deterministic() {
        let part = vec![Record::new("Syria", 2020, 30.0)];
        let whole = vec![Record::new("Syria", 2020, 70.0)];
        let pipeline = Pipeline::default();
        assert_eq!(pipeline.shares(&part, &whole), pipeline.shares(&part, &whole));
        let single = pipeline.share_for(&part, &whole, "Syria", 2020);
        assert!((single.percentage() - 300.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_and_proportions() {
        let records = vec![
            Record::new("Syria", 2022, 40.0),
            Record::new("Iraq", 2022, 60.0),
            Record::new("Syria", 2021, 500.0),
        ];
        let pipeline = Pipeline::default();
        let top = pipeline.top(&records, 2022, 10);
        assert_eq!(top[0].key.to_string(), "Iraq");
        assert_eq!(top.len(), 2);

        let props = pipeline.proportions(&records, 2022);
        assert!((props[1].share - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_flows() {
        let records = vec![
            weekly("Syria", 2020, "Peaceful protest", 3.0),
            weekly("Iraq", 2020, "Peaceful protest", 9.0),
        ];
        let graph = Pipeline::default().flows(&records, &Selection::country("Syria"), SANKEY_FLOW);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].value, 3.0);
        assert_eq!(graph.links[0].fatalities, None);
    }

    #[test]
    fn test_network_flows_with_fatalities() {
        let events = vec![
            weekly("Syria", 2020, "Peaceful protest", 3.0),
            weekly("Iraq", 2020, "Peaceful protest", 9.0),
            Record::new("Iraq", 2021, 2.0).with_event_type("Battles"),
        ];
        let fatalities = vec![
            weekly("Iraq", 2020, "Peaceful protest", 1.0),
            Record::new("Iraq", 2021, 6.0).with_event_type("Battles"),
        ];
        let graph = Pipeline::default().flows_with_fatalities(
            &events,
            Some(&fatalities),
            &Selection::default(),
            NETWORK_FLOW,
        );
        let links: Vec<(&str, &str, f64, Option<f64>)> = graph
            .links
            .iter()
            .map(|l| (l.source.as_str(), l.target.as_str(), l.value, l.fatalities))
            .collect();
        assert_eq!(
            links,
            vec![
                ("Syria", "Protests", 3.0, None),
                ("Iraq", "Protests", 9.0, Some(1.0)),
                ("Iraq", "Battles", 2.0, Some(6.0)),
            ]
        );
    }

    #[test]
    fn test_year_series_and_heatmap() {
        let records = vec![Record::new("Syria", 2015, 1.0), Record::new("Iraq", 2024, 2.0)];
        let pipeline = Pipeline::default();
        let series = pipeline.year_series(&records, &Selection::country("Syria"));
        assert_eq!(series.len(), 10);
        assert_eq!(series[0].value, Some(1.0));
        assert!(series[9].is_missing());

        let grid = pipeline.heatmap(&records);
        assert_eq!(grid.rows, vec!["Iraq", "Syria"]);
        assert_eq!(grid.cells.len(), 20);
    }
}
