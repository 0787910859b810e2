use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::date_label::LabelFormat;

/// Bucket names carried by every hourly throughput report.
pub const HOURLY_BUCKETS: [&str; 3] = ["12H", "10H", "8H"];

/// Production floors tracked by the dashboard, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Floor {
    A2,
    B2,
    A3,
    B3,
    A4,
    B4,
    A5,
    K3,
    #[serde(rename = "SMD")]
    Smd,
}

impl Floor {
    pub const ALL: [Floor; 9] = [
        Floor::A2,
        Floor::B2,
        Floor::A3,
        Floor::B3,
        Floor::A4,
        Floor::B4,
        Floor::A5,
        Floor::K3,
        Floor::Smd,
    ];

    /// The code stored in `FloorEntry::floor`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Floor::A2 => "A2",
            Floor::B2 => "B2",
            Floor::A3 => "A3",
            Floor::B3 => "B3",
            Floor::A4 => "A4",
            Floor::B4 => "B4",
            Floor::A5 => "A5",
            Floor::K3 => "K3",
            Floor::Smd => "SMD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Floor::ALL
            .iter()
            .copied()
            .find(|floor| floor.as_str().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored number that never fails to read.
///
/// Documents reach the dashboard from hand-filled forms, so a field may be
/// missing, `null`, a numeric string or plain garbage. Whatever is stored
/// reads back as a finite number: numbers and numeric strings keep their
/// value, `true` is 1, and everything else is 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0.0);

    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Quantity(value)
        } else {
            Quantity::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Read any JSON value as a number, failing closed to zero.
    pub fn coerce(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Number(n) => Quantity::new(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Quantity::ZERO
                } else {
                    Quantity::new(s.parse::<f64>().unwrap_or(0.0))
                }
            }
            Value::Bool(true) => Quantity(1.0),
            _ => Quantity::ZERO,
        }
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::new(value)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Quantity::new(value as f64)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Whole values go out as integers so stored documents keep `5`, not `5.0`.
        if self.0.fract() == 0.0 && self.0.abs() < 9_007_199_254_740_992.0 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Quantity::coerce(&value))
    }
}

/// One floor's figures inside a floor report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorEntry {
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub regular: Quantity,
    #[serde(default)]
    pub mini: Quantity,
    #[serde(default)]
    pub short: Quantity,
    #[serde(default, rename = "dayValue")]
    pub day_value: Quantity,
}

impl FloorEntry {
    pub fn new(floor: Floor, regular: f64, mini: f64, short: f64, day_value: f64) -> Self {
        FloorEntry {
            floor: floor.as_str().to_string(),
            regular: regular.into(),
            mini: mini.into(),
            short: short.into(),
            day_value: day_value.into(),
        }
    }
}

/// Daily per-floor production, keyed by a short (`M/D`) date label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorReport {
    #[serde(rename = "_id", default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub data: Vec<FloorEntry>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FloorReport {
    pub fn new(date: impl Into<String>, data: Vec<FloorEntry>) -> Self {
        FloorReport {
            id: new_id(),
            date: date.into(),
            data,
            created_at: None,
            updated_at: None,
        }
    }

    /// First entry for `floor`, if the report has one.
    pub fn entry(&self, floor: Floor) -> Option<&FloorEntry> {
        self.data.iter().find(|e| e.floor == floor.as_str())
    }
}

/// Hourly throughput buckets for one day, keyed by an ISO date label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyReport {
    #[serde(rename = "_id", default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_buckets")]
    pub data: BTreeMap<String, Quantity>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl HourlyReport {
    pub fn new(date: impl Into<String>, data: BTreeMap<String, Quantity>) -> Self {
        HourlyReport {
            id: new_id(),
            date: date.into(),
            data,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn bucket(&self, name: &str) -> f64 {
        self.data.get(name).copied().unwrap_or_default().value()
    }
}

/// Cumulative free-on-board shipment totals as of one ISO date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FobReport {
    #[serde(rename = "_id", default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "monthlyUptoFOB", default)]
    pub monthly_upto_fob: Quantity,
    #[serde(rename = "yearlyUptoFOB", default)]
    pub yearly_upto_fob: Quantity,
    #[serde(default)]
    pub runday: Quantity,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FobReport {
    pub fn new(date: impl Into<String>, monthly: f64, yearly: f64, runday: f64) -> Self {
        FobReport {
            id: new_id(),
            date: date.into(),
            monthly_upto_fob: monthly.into(),
            yearly_upto_fob: yearly.into(),
            runday: runday.into(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// The three report collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Floor,
    Hourly,
    Fob,
}

impl ReportKind {
    /// Label format documents of this kind are stored and looked up with.
    pub fn storage_format(self) -> LabelFormat {
        match self {
            ReportKind::Floor => LabelFormat::Short,
            ReportKind::Hourly | ReportKind::Fob => LabelFormat::Iso,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Floor => "floor report",
            ReportKind::Hourly => "hourly report",
            ReportKind::Fob => "FOB report",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build an hourly bucket map from the three fixed bucket values.
pub fn hourly_buckets(h12: f64, h10: f64, h8: f64) -> BTreeMap<String, Quantity> {
    HOURLY_BUCKETS
        .iter()
        .zip([h12, h10, h8])
        .map(|(name, v)| (name.to_string(), Quantity::new(v)))
        .collect()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn lenient_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FloorEntry>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let entries = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(entries)
}

fn lenient_buckets<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, Quantity>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let buckets = match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), Quantity::coerce(v)))
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantity_fails_closed() {
        assert_eq!(Quantity::coerce(&json!(12)).value(), 12.0);
        assert_eq!(Quantity::coerce(&json!("7.5")).value(), 7.5);
        assert_eq!(Quantity::coerce(&json!("abc")).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!("")).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!(null)).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!("NaN")).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!("inf")).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!([1, 2])).value(), 0.0);
        assert_eq!(Quantity::coerce(&json!(true)).value(), 1.0);
    }

    #[test]
    fn floor_report_reads_partial_documents() {
        let report: FloorReport = serde_json::from_value(json!({
            "_id": "r1",
            "date": "11/2",
            "data": [
                { "floor": "A2", "regular": 5, "mini": "2", "dayValue": "abc" },
                "garbage",
                { "floor": "B2" }
            ]
        }))
        .unwrap();

        assert_eq!(report.data.len(), 2);
        let a2 = report.entry(Floor::A2).unwrap();
        assert_eq!(a2.regular.value(), 5.0);
        assert_eq!(a2.mini.value(), 2.0);
        assert_eq!(a2.short.value(), 0.0);
        assert_eq!(a2.day_value.value(), 0.0);
        assert!(report.entry(Floor::Smd).is_none());
    }

    #[test]
    fn non_array_data_reads_as_empty() {
        let report: FloorReport =
            serde_json::from_value(json!({ "date": "11/2", "data": "oops" })).unwrap();
        assert!(report.data.is_empty());
        assert!(!report.id.is_empty());
    }

    #[test]
    fn whole_quantities_serialize_as_integers() {
        let entry = FloorEntry::new(Floor::Smd, 5.0, 0.0, 1.5, 40.0);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({ "floor": "SMD", "regular": 5, "mini": 0, "short": 1.5, "dayValue": 40 })
        );
    }

    #[test]
    fn fob_uses_original_field_names() {
        let report: FobReport = serde_json::from_value(json!({
            "date": "2025-11-22",
            "monthlyUptoFOB": 1200.5,
            "yearlyUptoFOB": "98000",
            "runday": 21
        }))
        .unwrap();
        assert_eq!(report.monthly_upto_fob.value(), 1200.5);
        assert_eq!(report.yearly_upto_fob.value(), 98000.0);
        assert_eq!(report.runday.value(), 21.0);
    }

    #[test]
    fn floor_codes_round_trip() {
        for floor in Floor::ALL {
            assert_eq!(Floor::from_code(floor.as_str()), Some(floor));
        }
        assert_eq!(Floor::from_code("smd"), Some(Floor::Smd));
        assert_eq!(Floor::from_code("Z9"), None);
    }
}
