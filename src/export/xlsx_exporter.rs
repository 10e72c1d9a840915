use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use tracing::{debug, warn};

use super::{DataTransformer, Table};
use crate::entity::{children, is_present, project, project_email, project_follow_up, DataLevel, EntityKind};
use crate::error::{ScrapeDashError, ScrapeDashResult};

pub const WEBSITES_SHEET: &str = "Websites";
pub const EMAILS_SHEET: &str = "Emails";
pub const FOLLOW_UPS_SHEET: &str = "Follow-ups";

/// Widest column, in characters
pub const MAX_COLUMN_WIDTH: usize = 50;

/// Excel's per-cell string limit
const MAX_CELL_CHARS: usize = 32_767;

/// One worksheet ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub table: Table,
    pub column_widths: Vec<usize>,
}

impl SheetData {
    /// Flatten `data` into a sheet with its own union header
    pub fn build(name: impl Into<String>, data: &[Value]) -> Self {
        let table = DataTransformer::to_table(data);
        let column_widths = column_widths(&table);
        Self {
            name: name.into(),
            table,
            column_widths,
        }
    }
}

/// `min(longest header or cell + 2, 50)` per column
pub fn column_widths(table: &Table) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = table
                .rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| DataTransformer::value_to_string(cell).chars().count())
                .fold(header.chars().count(), usize::max);
            (longest + 2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Split scratcher composites into one sheet per entity kind.
///
/// Websites rows are the projected composites without their child
/// collections; email and follow-up rows are projected on their own and
/// tagged with the parent `job_id`. Kinds with no rows get no sheet.
pub fn scratcher_sheets(bundles: &[&Value], level: DataLevel) -> Vec<SheetData> {
    let mut websites = Vec::with_capacity(bundles.len());
    let mut emails = Vec::new();
    let mut follow_ups = Vec::new();

    for bundle in bundles {
        let parent_id = Value::String(EntityKind::Scratcher.primary_id(bundle).unwrap_or_default());

        let mut website = project(EntityKind::Scratcher, bundle, level);
        if let Value::Object(map) = &mut website {
            map.remove("emails");
            map.remove("follow_ups");
            map.remove("text");
        }
        websites.push(website);

        for email in children(bundle, "emails") {
            let mut row = project_email(email, level);
            if let Value::Object(map) = &mut row {
                if !is_present(map.get("job_id")) {
                    map.insert("job_id".into(), parent_id.clone());
                }
            }
            emails.push(row);
        }

        for follow_up in children(bundle, "follow_ups") {
            let mut row = project_follow_up(follow_up, level);
            if let Value::Object(map) = &mut row {
                map.insert("job_id".into(), parent_id.clone());
            }
            follow_ups.push(row);
        }
    }

    [(WEBSITES_SHEET, websites), (EMAILS_SHEET, emails), (FOLLOW_UPS_SHEET, follow_ups)]
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(name, rows)| SheetData::build(name, &rows))
        .collect()
}

/// Write the sheets into an XLSX workbook held in memory
pub fn export_xlsx(sheets: &[SheetData]) -> ScrapeDashResult<Vec<u8>> {
    debug!("Exporting {} sheets to XLSX", sheets.len());

    if sheets.is_empty() {
        return Err(ScrapeDashError::EmptyExport);
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in sheet.table.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }

        for (index, row) in sheet.table.rows.iter().enumerate() {
            let row_num = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                write_cell(worksheet, row_num, col as u16, cell)?;
            }
        }

        for (col, width) in sheet.column_widths.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width as f64)?;
        }

        debug!(
            "Sheet {}: {} columns, {} rows",
            sheet.name,
            sheet.table.headers.len(),
            sheet.table.rows.len()
        );
    }

    let bytes = workbook.save_to_buffer()?;
    Ok(bytes)
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Value) -> Result<(), XlsxError> {
    match cell {
        Value::Number(n) => match n.as_f64() {
            Some(number) => worksheet.write_number(row, col, number)?,
            None => worksheet.write_string(row, col, n.to_string())?,
        },
        Value::Bool(b) => worksheet.write_boolean(row, col, *b)?,
        other => {
            let text = DataTransformer::value_to_string(other);
            if text.chars().count() > MAX_CELL_CHARS {
                warn!("Truncating cell at row {} column {} to {} characters", row, col, MAX_CELL_CHARS);
                let truncated: String = text.chars().take(MAX_CELL_CHARS).collect();
                worksheet.write_string(row, col, truncated)?
            } else {
                worksheet.write_string(row, col, text)?
            }
        }
    };
    Ok(())
}
