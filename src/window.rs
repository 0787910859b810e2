use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date_label::{DateLabel, LabelFormat};

/// Where a trailing window ends relative to its anchor date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Last label is the anchor date itself.
    UpToToday,
    /// Last label is the day before the anchor date.
    YesterdayAnchored,
}

impl WindowAnchor {
    fn end_date(self, anchor_date: NaiveDate) -> NaiveDate {
        match self {
            WindowAnchor::UpToToday => anchor_date,
            WindowAnchor::YesterdayAnchored => anchor_date.pred_opt().unwrap_or(anchor_date),
        }
    }
}

/// Consecutive calendar dates, oldest first, all in one label format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateWindow {
    labels: Vec<DateLabel>,
    format: LabelFormat,
}

impl DateWindow {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn format(&self) -> LabelFormat {
        self.format
    }

    pub fn labels(&self) -> &[DateLabel] {
        &self.labels
    }

    /// Labels as document keys, oldest first.
    pub fn rendered(&self) -> Vec<String> {
        self.labels.iter().map(DateLabel::render).collect()
    }

    /// The same dates, relabelled.
    pub fn with_format(&self, format: LabelFormat) -> DateWindow {
        DateWindow {
            labels: self.labels.iter().map(|l| l.convert(format)).collect(),
            format,
        }
    }

    pub fn first(&self) -> Option<&DateLabel> {
        self.labels.first()
    }

    pub fn last(&self) -> Option<&DateLabel> {
        self.labels.last()
    }

    /// Index counted back from the newest label; 0 is the last date.
    pub fn index_from_end(&self, offset: usize) -> Option<usize> {
        self.labels.len().checked_sub(offset + 1)
    }
}

/// Build `window_size` consecutive dates ending at the anchor's end date.
///
/// A size of zero gives an empty window. Dates that would fall before the
/// earliest representable calendar date are skipped.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use floor_dashboard::date_label::LabelFormat;
/// use floor_dashboard::window::{build_window, WindowAnchor};
///
/// let today = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
/// let window = build_window(3, today, WindowAnchor::UpToToday, LabelFormat::Short);
/// assert_eq!(window.rendered(), vec!["11/1", "11/2", "11/3"]);
/// ```
pub fn build_window(
    window_size: usize,
    anchor_date: NaiveDate,
    anchor: WindowAnchor,
    format: LabelFormat,
) -> DateWindow {
    let end = anchor.end_date(anchor_date);
    let labels = (0..window_size)
        .rev()
        .filter_map(|back| end.checked_sub_days(Days::new(back as u64)))
        .map(|date| DateLabel::new(date, format))
        .collect();

    DateWindow { labels, format }
}
