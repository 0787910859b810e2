use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregate::{AggregationResult, HourlyBuckets, TableView, reconcile_hourly};
use crate::clock::Clock;
use crate::date_label::{DateLabel, LabelFormat};
use crate::format::{format_count, format_currency, format_dollar};
use crate::report::{Floor, FloorReport, FobReport, HourlyReport};

/// Figures shown on the FOB summary cards.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FobSummary {
    /// Date of the report the figures came from, if any.
    pub date: Option<String>,
    #[serde(rename = "monthlyUptoFOB")]
    pub monthly_upto_fob: f64,
    #[serde(rename = "yearlyUptoFOB")]
    pub yearly_upto_fob: f64,
    pub runday: f64,
}

impl FobSummary {
    /// Today's report if there is one, otherwise the most recent dated one.
    ///
    /// Reports whose date does not parse are never picked as "most recent".
    /// With nothing usable every figure is zero.
    pub fn select(records: &[FobReport], today: NaiveDate) -> Self {
        let today_label = DateLabel::new(today, LabelFormat::Iso).render();

        let chosen = records.iter().find(|r| r.date == today_label).or_else(|| {
            records
                .iter()
                .filter_map(|r| DateLabel::parse(&r.date, today).map(|label| (label.date(), r)))
                .max_by_key(|(date, _)| *date)
                .map(|(_, r)| r)
        });

        match chosen {
            Some(report) => FobSummary {
                date: Some(report.date.clone()),
                monthly_upto_fob: report.monthly_upto_fob.value(),
                yearly_upto_fob: report.yearly_upto_fob.value(),
                runday: report.runday.value(),
            },
            None => FobSummary::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FobCard {
    #[serde(flatten)]
    pub figures: FobSummary,
    pub monthly_display: String,
    pub yearly_display: String,
    pub runday_display: String,
}

impl From<FobSummary> for FobCard {
    fn from(figures: FobSummary) -> Self {
        FobCard {
            monthly_display: format_currency(figures.monthly_upto_fob),
            yearly_display: format_currency(figures.yearly_upto_fob),
            runday_display: format_count(figures.runday),
            figures,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FloorTableRow {
    pub floor: Floor,
    pub regular: f64,
    pub mini: f64,
    pub short: f64,
    pub total: f64,
    pub days: Vec<f64>,
    pub regular_display: String,
    pub mini_display: String,
    pub short_display: String,
    pub days_display: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FloorTableTotals {
    pub regular: f64,
    pub mini: f64,
    pub short: f64,
    pub days: Vec<f64>,
    pub regular_display: String,
    pub mini_display: String,
    pub short_display: String,
    pub days_display: Vec<String>,
}

/// A floor table ready to render: numbers plus their display strings.
///
/// Counts use [`format_count`], per-day values use [`format_dollar`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FloorTable {
    pub view: TableView,
    pub editable: bool,
    pub dates: Vec<String>,
    /// Hourly buckets for the same dates, looked up by ISO label.
    pub hourly: Vec<HourlyBuckets>,
    pub rows: Vec<FloorTableRow>,
    pub totals: FloorTableTotals,
    pub grand_total: f64,
    pub grand_total_display: String,
}

impl FloorTable {
    pub fn build(view: TableView, result: &AggregationResult, hourly: &[HourlyReport]) -> Self {
        let hourly_window = result.window().with_format(LabelFormat::Iso);
        let scalars = result.scalar_totals();
        let column_totals = result.column_totals();
        let grand_total = result.grand_total();

        let rows = result
            .rows()
            .iter()
            .map(|row| FloorTableRow {
                floor: row.floor,
                regular: row.regular,
                mini: row.mini,
                short: row.short,
                total: row.total(),
                regular_display: format_count(row.regular),
                mini_display: format_count(row.mini),
                short_display: format_count(row.short),
                days_display: row.days.iter().copied().map(format_dollar).collect(),
                days: row.days.clone(),
            })
            .collect();

        FloorTable {
            view,
            editable: result.is_editable(),
            dates: result.window().rendered(),
            hourly: reconcile_hourly(&hourly_window, hourly),
            rows,
            totals: FloorTableTotals {
                regular: scalars.regular,
                mini: scalars.mini,
                short: scalars.short,
                regular_display: format_count(scalars.regular),
                mini_display: format_count(scalars.mini),
                short_display: format_count(scalars.short),
                days_display: column_totals.iter().copied().map(format_dollar).collect(),
                days: column_totals,
            },
            grand_total,
            grand_total_display: format_count(grand_total),
        }
    }
}

/// Everything the dashboard page shows, computed in one pass from one clock reading.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub today: String,
    pub fob: FobCard,
    pub summary: FloorTable,
    pub editor: FloorTable,
}

impl DashboardView {
    pub fn build(
        clock: &dyn Clock,
        floor: &[FloorReport],
        hourly: &[HourlyReport],
        fob: &[FobReport],
    ) -> Self {
        let today = clock.today();
        let summary = TableView::SUMMARY.aggregate(clock, floor);
        let editor = TableView::EDITOR.aggregate(clock, floor);

        DashboardView {
            generated_at: clock.now(),
            today: DateLabel::new(today, LabelFormat::Iso).render(),
            fob: FobSummary::select(fob, today).into(),
            summary: FloorTable::build(TableView::SUMMARY, &summary, hourly),
            editor: FloorTable::build(TableView::EDITOR, &editor, hourly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::report::{FloorEntry, hourly_buckets};

    fn nov(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    #[test]
    fn fob_prefers_todays_report() {
        let records = vec![
            FobReport::new("2025-11-21", 10.0, 20.0, 3.0),
            FobReport::new("2025-11-22", 11.0, 21.0, 4.0),
            FobReport::new("2025-11-25", 99.0, 99.0, 9.0),
        ];
        let summary = FobSummary::select(&records, nov(22));
        assert_eq!(summary.date.as_deref(), Some("2025-11-22"));
        assert_eq!(summary.runday, 4.0);
    }

    #[test]
    fn fob_falls_back_to_most_recent() {
        let records = vec![
            FobReport::new("2025-11-19", 10.0, 20.0, 3.0),
            FobReport::new("not a date", 50.0, 50.0, 5.0),
            FobReport::new("2025-11-20", 12.0, 22.0, 4.0),
        ];
        let summary = FobSummary::select(&records, nov(22));
        assert_eq!(summary.date.as_deref(), Some("2025-11-20"));
        assert_eq!(summary.monthly_upto_fob, 12.0);
    }

    #[test]
    fn fob_without_reports_is_zero() {
        let summary = FobSummary::select(&[], nov(22));
        assert_eq!(summary, FobSummary::default());
        let card = FobCard::from(summary);
        assert_eq!(card.monthly_display, "$0");
        assert_eq!(card.runday_display, "0");
    }

    #[test]
    fn view_pairs_short_floor_keys_with_iso_hourly_keys() {
        let clock = FixedClock::on(nov(22));
        let floor = vec![FloorReport::new(
            "11/21",
            vec![FloorEntry::new(Floor::A2, 5.0, 2.0, 1.0, 1500.0)],
        )];
        let hourly = vec![HourlyReport::new("2025-11-21", hourly_buckets(12.0, 10.0, 8.0))];
        let fob = vec![FobReport::new("2025-11-22", 1234.5, 98000.0, 21.0)];

        let view = DashboardView::build(&clock, &floor, &hourly, &fob);

        assert_eq!(view.today, "2025-11-22");
        assert_eq!(view.fob.monthly_display, "$1,235");

        // Summary reads latest figures from the second-to-last date (11/21).
        assert_eq!(view.summary.dates.len(), 10);
        assert_eq!(view.summary.grand_total, 8.0);
        assert_eq!(view.summary.totals.days_display[8], "$1,500");
        assert_eq!(view.summary.hourly[8].h12, 12.0);

        // Editor reads them from today, which has no report.
        assert_eq!(view.editor.dates.len(), 7);
        assert_eq!(view.editor.grand_total, 0.0);
        assert_eq!(view.editor.totals.days[5], 1500.0);
        assert!(view.editor.editable);
    }
}
