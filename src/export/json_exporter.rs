use serde_json::Value;
use tracing::debug;

use crate::error::ScrapeDashResult;

/// Serialize projected records as a pretty-printed JSON array.
/// Nesting is kept as is; this is the only structure-preserving format.
pub fn export_json(data: &[Value]) -> ScrapeDashResult<Vec<u8>> {
    debug!("Exporting {} records to JSON", data.len());

    let bytes = serde_json::to_vec_pretty(data)?;

    debug!("JSON export produced {} bytes", bytes.len());
    Ok(bytes)
}
