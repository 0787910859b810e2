use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clock::Clock;
use crate::date_label::LabelFormat;
use crate::report::{Floor, FloorReport, HOURLY_BUCKETS, HourlyReport};
use crate::window::{DateWindow, WindowAnchor, build_window};

/// How a floor table picks its dates and where its latest-period figures come from.
///
/// `latest_period_offset` counts back from the newest date in the window:
/// 0 reads regular/mini/short from the last date, 1 from the second-to-last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableView {
    pub window_size: usize,
    pub anchor: WindowAnchor,
    pub label_format: LabelFormat,
    pub latest_period_offset: usize,
    pub editable: bool,
}

impl TableView {
    /// Read-only bottom table: ten days up to today, latest figures from yesterday.
    pub const SUMMARY: TableView = TableView {
        window_size: 10,
        anchor: WindowAnchor::UpToToday,
        label_format: LabelFormat::Short,
        latest_period_offset: 1,
        editable: false,
    };

    /// Editable floor table: seven days up to today, latest figures from today.
    pub const EDITOR: TableView = TableView {
        window_size: 7,
        anchor: WindowAnchor::UpToToday,
        label_format: LabelFormat::Short,
        latest_period_offset: 0,
        editable: true,
    };

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "summary" => Some(TableView::SUMMARY),
            "editor" => Some(TableView::EDITOR),
            _ => None,
        }
    }

    pub fn window(&self, clock: &dyn Clock) -> DateWindow {
        build_window(self.window_size, clock.today(), self.anchor, self.label_format)
    }

    /// Build this view's window from `clock` and reconcile `records` over every floor.
    pub fn aggregate(&self, clock: &dyn Clock, records: &[FloorReport]) -> AggregationResult {
        let window = self.window(clock);
        reconcile(&window, records, &Floor::ALL, self.latest_period_offset)
            .with_editable(self.editable)
    }
}

/// The three latest-period columns of a floor row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarField {
    Regular,
    Mini,
    Short,
}

/// One floor across the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryRow {
    pub floor: Floor,
    pub regular: f64,
    pub mini: f64,
    pub short: f64,
    /// Day values aligned 1:1 with the window labels.
    pub days: Vec<f64>,
}

impl CategoryRow {
    fn empty(floor: Floor, len: usize) -> Self {
        CategoryRow {
            floor,
            regular: 0.0,
            mini: 0.0,
            short: 0.0,
            days: vec![0.0; len],
        }
    }

    /// Regular + mini + short.
    pub fn total(&self) -> f64 {
        self.regular + self.mini + self.short
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScalarTotals {
    pub regular: f64,
    pub mini: f64,
    pub short: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("table is read-only")]
    ReadOnly,
    #[error("floor {0} is not in this table")]
    UnknownFloor(Floor),
    #[error("day index {index} is outside a {len}-day window")]
    DayOutOfRange { index: usize, len: usize },
}

/// Dense floor-by-date matrix.
///
/// Only the rows are stored. Every total is summed from them on each call,
/// so an edit can never leave a stale total behind.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationResult {
    window: DateWindow,
    rows: Vec<CategoryRow>,
    latest_period_offset: usize,
    editable: bool,
}

impl AggregationResult {
    /// The dates the columns are aligned with.
    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    /// One row per category, in the order the categories were given.
    pub fn rows(&self) -> &[CategoryRow] {
        &self.rows
    }

    pub fn row(&self, floor: Floor) -> Option<&CategoryRow> {
        self.rows.iter().find(|r| r.floor == floor)
    }

    pub fn latest_period_offset(&self) -> usize {
        self.latest_period_offset
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Grant or withdraw the edit capability.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Regular, mini and short summed over every floor.
    pub fn scalar_totals(&self) -> ScalarTotals {
        self.rows.iter().fold(ScalarTotals::default(), |acc, row| ScalarTotals {
            regular: acc.regular + row.regular,
            mini: acc.mini + row.mini,
            short: acc.short + row.short,
        })
    }

    /// Per-date sums across every floor, aligned with the window.
    pub fn column_totals(&self) -> Vec<f64> {
        (0..self.window.len())
            .map(|j| self.rows.iter().map(|r| r.days.get(j).copied().unwrap_or(0.0)).sum())
            .collect()
    }

    /// Sum of every row's regular + mini + short.
    pub fn grand_total(&self) -> f64 {
        self.rows.iter().map(CategoryRow::total).sum()
    }

    /// Overwrite one latest-period figure of a floor
    ///
    /// Totals reflect the change on their next read. Non-finite values are
    /// stored as 0.
    ///
    /// # Arguments
    /// * `floor` - Row to edit
    /// * `field` - Which of regular/mini/short
    /// * `value` - New figure
    ///
    /// # Returns
    /// * `Result<(), EditError>` - `ReadOnly` unless the table was built
    ///   editable, `UnknownFloor` if the row is absent
    ///
    /// # Examples
    /// ```
    /// use floor_dashboard::aggregate::{EditError, ScalarField, TableView};
    /// use floor_dashboard::clock::FixedClock;
    /// use floor_dashboard::report::Floor;
    /// use chrono::NaiveDate;
    ///
    /// let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 22).unwrap());
    ///
    /// let mut editor = TableView::EDITOR.aggregate(&clock, &[]);
    /// editor.set_scalar(Floor::A3, ScalarField::Mini, 6.0).unwrap();
    /// assert_eq!(editor.grand_total(), 6.0);
    ///
    /// let mut summary = TableView::SUMMARY.aggregate(&clock, &[]);
    /// assert_eq!(
    ///     summary.set_scalar(Floor::A3, ScalarField::Mini, 6.0),
    ///     Err(EditError::ReadOnly)
    /// );
    /// ```
    pub fn set_scalar(&mut self, floor: Floor, field: ScalarField, value: f64) -> Result<(), EditError> {
        let row = self.row_mut(floor)?;
        let value = finite_or_zero(value);
        match field {
            ScalarField::Regular => row.regular = value,
            ScalarField::Mini => row.mini = value,
            ScalarField::Short => row.short = value,
        }
        Ok(())
    }

    /// Overwrite the day value of `floor` at window position `index`
    ///
    /// # Errors
    /// * `ReadOnly` unless the table was built editable
    /// * `UnknownFloor` if the row is absent
    /// * `DayOutOfRange` if `index` is not inside the window
    pub fn set_day_value(&mut self, floor: Floor, index: usize, value: f64) -> Result<(), EditError> {
        let len = self.window.len();
        let row = self.row_mut(floor)?;
        let cell = row
            .days
            .get_mut(index)
            .ok_or(EditError::DayOutOfRange { index, len })?;
        *cell = finite_or_zero(value);
        Ok(())
    }

    fn row_mut(&mut self, floor: Floor) -> Result<&mut CategoryRow, EditError> {
        if !self.editable {
            return Err(EditError::ReadOnly);
        }
        self.rows
            .iter_mut()
            .find(|r| r.floor == floor)
            .ok_or(EditError::UnknownFloor(floor))
    }
}

/// Spread sparse floor reports over `window`.
///
/// A record matches a window date only when its `date` string is identical
/// to the window label. Records in the other label format therefore never
/// match; build the window in the format the records were stored with.
/// When several records share a date the first one wins.
///
/// Day values fill every matched date. Regular/mini/short come only from
/// the date `latest_period_offset` places back from the end; an offset past
/// the start of the window leaves them at zero. Anything missing reads as 0.
///
/// # Arguments
/// * `window` - Dates to align against
/// * `records` - Stored floor reports, in any order
/// * `categories` - Floors to produce rows for
/// * `latest_period_offset` - Which date supplies regular/mini/short
///
/// # Returns
/// * `AggregationResult` - One row per category, read-only
///
/// # Examples
/// ```
/// use floor_dashboard::aggregate::reconcile;
/// use floor_dashboard::report::{Floor, FloorEntry, FloorReport};
/// use floor_dashboard::window::{WindowAnchor, build_window};
/// use floor_dashboard::LabelFormat;
/// use chrono::NaiveDate;
///
/// let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
/// let window = build_window(3, today, WindowAnchor::UpToToday, LabelFormat::Short);
/// let records = vec![FloorReport::new(
///     "11/2",
///     vec![FloorEntry::new(Floor::A2, 5.0, 2.0, 1.0, 40.0)],
/// )];
///
/// let result = reconcile(&window, &records, &[Floor::A2], 1);
/// assert_eq!(result.grand_total(), 8.0);
/// assert_eq!(result.column_totals(), vec![0.0, 40.0, 0.0]);
/// ```
pub fn reconcile(
    window: &DateWindow,
    records: &[FloorReport],
    categories: &[Floor],
    latest_period_offset: usize,
) -> AggregationResult {
    let by_date = first_by_date(records.iter().map(|r| (r.date.as_str(), r)));
    let labels = window.rendered();
    let scalar_index = window.index_from_end(latest_period_offset);

    let rows = categories
        .iter()
        .map(|&floor| {
            let mut row = CategoryRow::empty(floor, labels.len());
            for (i, label) in labels.iter().enumerate() {
                let Some(entry) = by_date.get(label.as_str()).and_then(|r| r.entry(floor)) else {
                    continue;
                };
                if scalar_index == Some(i) {
                    row.regular = entry.regular.value();
                    row.mini = entry.mini.value();
                    row.short = entry.short.value();
                }
                row.days[i] = entry.day_value.value();
            }
            row
        })
        .collect();

    AggregationResult {
        window: window.clone(),
        rows,
        latest_period_offset,
        editable: false,
    }
}

/// The fixed hourly buckets for one date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct HourlyBuckets {
    #[serde(rename = "12H")]
    pub h12: f64,
    #[serde(rename = "10H")]
    pub h10: f64,
    #[serde(rename = "8H")]
    pub h8: f64,
}

impl HourlyBuckets {
    fn from_report(report: &HourlyReport) -> Self {
        HourlyBuckets {
            h12: report.bucket(HOURLY_BUCKETS[0]),
            h10: report.bucket(HOURLY_BUCKETS[1]),
            h8: report.bucket(HOURLY_BUCKETS[2]),
        }
    }

    pub fn total(&self) -> f64 {
        self.h12 + self.h10 + self.h8
    }
}

/// Hourly buckets for each window date, zero where no report matches.
///
/// Same exact-string matching as [`reconcile`]; hourly reports are stored
/// with ISO labels, so pass an ISO window.
pub fn reconcile_hourly(window: &DateWindow, records: &[HourlyReport]) -> Vec<HourlyBuckets> {
    let by_date = first_by_date(records.iter().map(|r| (r.date.as_str(), r)));
    window
        .rendered()
        .iter()
        .map(|label| {
            by_date
                .get(label.as_str())
                .map(|r| HourlyBuckets::from_report(r))
                .unwrap_or_default()
        })
        .collect()
}

fn first_by_date<'a, T>(items: impl Iterator<Item = (&'a str, &'a T)>) -> HashMap<&'a str, &'a T> {
    let mut map = HashMap::new();
    for (date, item) in items {
        map.entry(date).or_insert(item);
    }
    map
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
