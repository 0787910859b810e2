use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref SHORT_LABEL_REGEX: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})$").unwrap();
    static ref ISO_LABEL_REGEX: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
}

/// The two ways report documents spell their date key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// `month/day`, no zero padding and no year, e.g. `11/5`
    Short,
    /// `YYYY-MM-DD`, e.g. `2024-11-05`
    Iso,
}

impl LabelFormat {
    /// Guess the format of a raw label by its shape.
    pub fn detect(text: &str) -> Option<Self> {
        let text = text.trim();
        if ISO_LABEL_REGEX.is_match(text) {
            Some(LabelFormat::Iso)
        } else if SHORT_LABEL_REGEX.is_match(text) {
            Some(LabelFormat::Short)
        } else {
            None
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "short" => Some(LabelFormat::Short),
            "iso" => Some(LabelFormat::Iso),
            _ => None,
        }
    }
}

/// A calendar date tagged with the label format it is written in.
///
/// The date itself is always complete; the tag only decides how it is
/// rendered. Converting between formats never loses the year because the
/// year is kept in `date` even when the short rendering drops it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateLabel {
    date: NaiveDate,
    format: LabelFormat,
}

impl DateLabel {
    pub fn new(date: NaiveDate, format: LabelFormat) -> Self {
        DateLabel { date, format }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn format(&self) -> LabelFormat {
        self.format
    }

    /// Same calendar date, rendered in `format`.
    pub fn convert(self, format: LabelFormat) -> Self {
        DateLabel {
            date: self.date,
            format,
        }
    }

    /// The string form used as a document key.
    pub fn render(&self) -> String {
        match self.format {
            LabelFormat::Short => format!("{}/{}", self.date.month(), self.date.day()),
            LabelFormat::Iso => self.date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Parse a label in either format.
    ///
    /// Short labels carry no year. They resolve to the most recent
    /// occurrence of that month/day on or before `reference`, so `12/31`
    /// read on 2026-01-02 is 2025-12-31 and `2/29` lands on the latest
    /// leap year that is not in the future.
    ///
    /// # Returns
    /// * `None` if the text matches neither shape or names no real date
    pub fn parse(text: &str, reference: NaiveDate) -> Option<Self> {
        let text = text.trim();

        if let Some(caps) = ISO_LABEL_REGEX.captures(text) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            return Some(DateLabel::new(date, LabelFormat::Iso));
        }

        if let Some(caps) = SHORT_LABEL_REGEX.captures(text) {
            let month: u32 = caps[1].parse().ok()?;
            let day: u32 = caps[2].parse().ok()?;
            let date = resolve_short(month, day, reference)?;
            return Some(DateLabel::new(date, LabelFormat::Short));
        }

        None
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Rewrite a raw label into `target` format.
///
/// Text that does not parse as a date is returned unchanged; the caller's
/// string is still a usable key, it just cannot be converted.
pub fn normalize_label(text: &str, target: LabelFormat, reference: NaiveDate) -> String {
    match DateLabel::parse(text, reference) {
        Some(label) => label.convert(target).render(),
        None => text.trim().to_string(),
    }
}

fn resolve_short(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    // Eight years always reaches a leap year.
    let mut year = reference.year();
    for _ in 0..8 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date <= reference {
                return Some(date);
            }
        }
        year -= 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renders_short_without_padding() {
        let label = DateLabel::new(ymd(2024, 11, 5), LabelFormat::Short);
        assert_eq!(label.render(), "11/5");
        assert_eq!(label.convert(LabelFormat::Iso).render(), "2024-11-05");
    }

    #[test]
    fn short_label_resolves_to_previous_year_when_in_future() {
        let label = DateLabel::parse("12/31", ymd(2026, 1, 2)).unwrap();
        assert_eq!(label.date(), ymd(2025, 12, 31));
        assert_eq!(label.format(), LabelFormat::Short);

        let label = DateLabel::parse("1/2", ymd(2026, 1, 2)).unwrap();
        assert_eq!(label.date(), ymd(2026, 1, 2));
    }

    #[test]
    fn leap_day_walks_back_to_leap_year() {
        let label = DateLabel::parse("2/29", ymd(2026, 10, 19)).unwrap();
        assert_eq!(label.date(), ymd(2024, 2, 29));
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(DateLabel::parse("4/31", ymd(2026, 10, 19)).is_none());
        assert!(DateLabel::parse("13/1", ymd(2026, 10, 19)).is_none());
        assert!(DateLabel::parse("2026-02-30", ymd(2026, 10, 19)).is_none());
        assert!(DateLabel::parse("yesterday", ymd(2026, 10, 19)).is_none());
    }

    #[test]
    fn detects_format_by_shape() {
        assert_eq!(LabelFormat::detect("11/5"), Some(LabelFormat::Short));
        assert_eq!(LabelFormat::detect("2024-11-05"), Some(LabelFormat::Iso));
        assert_eq!(LabelFormat::detect("11-5"), None);
    }

    #[test]
    fn normalize_keeps_unparseable_text() {
        let today = ymd(2025, 11, 22);
        assert_eq!(normalize_label("2025-11-21", LabelFormat::Short, today), "11/21");
        assert_eq!(normalize_label("11/21", LabelFormat::Iso, today), "2025-11-21");
        assert_eq!(normalize_label(" week 4 ", LabelFormat::Iso, today), "week 4");
    }
}
