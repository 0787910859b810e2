/*!
# Production Floor Dashboard

A browser-based dashboard for daily production figures, built in Rust.

## Overview

Supervisors record one floor report per day, holding regular, mini and short
counts plus a day value for each production floor. Hourly output buckets and
FOB (freight on board) running totals are recorded alongside. The dashboard
lines these reports up against a rolling window of recent dates and shows
them as a read-only summary table and an editable entry table.

## Architecture

### Core
- **Date labels**: `M/D` short labels and `YYYY-MM-DD` ISO labels, with
  conversion between the two relative to a reference date
- **Windows**: fixed-length runs of consecutive date labels ending today or
  yesterday
- **Aggregation**: reconciles stored reports against a window by exact label
  match, filling gaps with zeros and taking the latest figures from a
  configurable offset
- **Formatting**: count, dollar and currency display strings

### Storage
- One JSON file per collection (floor, hourly, FOB reports and users),
  rewritten atomically on every change

### Web layer (`web` feature)
- **Technologies**: Rust, axum, tokio
- Session cookie login with argon2 password hashes
- JSON API for report CRUD and the computed dashboard view
- Periodic background recompute of the dashboard snapshot
- CSV and XLSX export of either table

## Modules

- **date_label**: label parsing, rendering and normalization
- **clock**: injectable source of "now"
- **window**: date window construction
- **report**: stored report records and lenient number coercion
- **aggregate**: table views, reconciliation and totals
- **format**: number display helpers
- **dashboard**: the full computed dashboard view
- **store**: JSON-file report collections
- **downloader**: CSV and XLSX export
- **config**: server command line and environment settings
- **login**: users, sessions and the auth middleware
- **refresh**: background dashboard recompute
- **app**: routing and handlers
*/

pub mod aggregate;
pub mod clock;
pub mod dashboard;
pub mod date_label;
pub mod downloader;
pub mod format;
pub mod report;
pub mod store;
pub mod window;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod refresh;

pub use aggregate::{AggregationResult, CategoryRow, TableView, reconcile};
pub use clock::{Clock, FixedClock, SystemClock};
pub use date_label::{DateLabel, LabelFormat, normalize_label};
pub use report::{Floor, FloorEntry, FloorReport, FobReport, HourlyReport, Quantity};
pub use window::{DateWindow, WindowAnchor, build_window};
