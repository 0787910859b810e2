#![cfg(not(tarpaulin_include))]

use crate::dashboard::FloorTable;

/// Errors raised while building a spreadsheet export.
#[cfg(feature = "web")]
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("xlsx export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

const SCALAR_HEADERS: [&str; 5] = ["Floor", "Regular", "Mini", "Short", "Total"];

/// Convert a floor table to CSV format
///
/// Columns are the floor code, the three scalar figures, the row total and
/// one column per window date. A `Total` row carries the column sums and a
/// final `Grand Total` row carries the sum of every scalar figure.
///
/// Values are written as plain numbers, not their display strings.
///
/// # Examples
/// ```
/// use floor_dashboard::aggregate::TableView;
/// use floor_dashboard::clock::FixedClock;
/// use floor_dashboard::dashboard::FloorTable;
/// use floor_dashboard::downloader::to_csv;
/// use chrono::NaiveDate;
///
/// let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 22).unwrap());
/// let result = TableView::EDITOR.aggregate(&clock, &[]);
/// let csv = to_csv(&FloorTable::build(TableView::EDITOR, &result, &[]));
/// assert!(csv.starts_with("Floor,Regular,Mini,Short,Total,11/16,"));
/// ```
pub fn to_csv(table: &FloorTable) -> String {
    let mut csv_content = String::new();

    let header: Vec<String> = SCALAR_HEADERS
        .iter()
        .map(|h| h.to_string())
        .chain(table.dates.iter().cloned())
        .collect();
    push_record(&mut csv_content, &header);

    for row in &table.rows {
        let mut record = vec![
            row.floor.to_string(),
            row.regular.to_string(),
            row.mini.to_string(),
            row.short.to_string(),
            row.total.to_string(),
        ];
        record.extend(row.days.iter().map(|v| v.to_string()));
        push_record(&mut csv_content, &record);
    }

    let totals = &table.totals;
    let mut record = vec![
        "Total".to_string(),
        totals.regular.to_string(),
        totals.mini.to_string(),
        totals.short.to_string(),
        table.grand_total.to_string(),
    ];
    record.extend(totals.days.iter().map(|v| v.to_string()));
    push_record(&mut csv_content, &record);

    push_record(
        &mut csv_content,
        &["Grand Total".to_string(), table.grand_total.to_string()],
    );

    csv_content
}

/// Convert a floor table to XLSX format
///
/// Same layout as [`to_csv`], written as numbers into a single worksheet.
#[cfg(feature = "web")]
pub fn to_xlsx(table: &FloorTable) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(if table.editable { "Editor" } else { "Summary" })?;

    let mut col: u16 = 0;
    for header in SCALAR_HEADERS.iter().map(|h| h.to_string()).chain(table.dates.iter().cloned()) {
        worksheet.write_string_with_format(0, col, header.as_str(), &bold)?;
        col += 1;
    }

    let mut r: u32 = 1;
    for row in &table.rows {
        worksheet.write_string(r, 0, row.floor.as_str())?;
        let values = [row.regular, row.mini, row.short, row.total]
            .into_iter()
            .chain(row.days.iter().copied());
        for (c, value) in values.enumerate() {
            worksheet.write_number(r, c as u16 + 1, value)?;
        }
        r += 1;
    }

    let totals = &table.totals;
    worksheet.write_string_with_format(r, 0, "Total", &bold)?;
    let values = [totals.regular, totals.mini, totals.short, table.grand_total]
        .into_iter()
        .chain(totals.days.iter().copied());
    for (c, value) in values.enumerate() {
        worksheet.write_number(r, c as u16 + 1, value)?;
    }

    worksheet.write_string_with_format(r + 1, 0, "Grand Total", &bold)?;
    worksheet.write_number(r + 1, 1, table.grand_total)?;

    Ok(workbook.save_to_buffer()?)
}

fn push_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push('\n');
}

// Quote fields containing commas, quotes or newlines.
fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
