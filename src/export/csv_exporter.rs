use csv::{QuoteStyle, WriterBuilder};
use serde_json::Value;
use tracing::debug;

use super::DataTransformer;
use crate::error::{ScrapeDashError, ScrapeDashResult};

/// Export projected records to CSV.
///
/// Records are flattened, the header is the sorted union of all keys and
/// absent cells are written empty. Cells are quoted only when they contain
/// a comma, a quote or a line break (`\n` or `\r`). A row made of one empty
/// cell is written as `""` so it does not read back as a blank line.
pub fn export_csv(data: &[Value]) -> ScrapeDashResult<Vec<u8>> {
    debug!("Exporting {} records to CSV", data.len());

    if data.is_empty() {
        return Err(ScrapeDashError::EmptyExport);
    }

    let table = DataTransformer::to_table(data);

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;

    for row in &table.rows {
        let record: Vec<String> = row.iter().map(DataTransformer::value_to_string).collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ScrapeDashError::Io(e.into_error()))?;

    debug!("CSV export produced {} columns, {} bytes", table.headers.len(), bytes.len());
    Ok(bytes)
}
