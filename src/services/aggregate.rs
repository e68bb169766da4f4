use crate::api::error::AppError;
use crate::models::{CellScalar, CombinedTable, Table};

/// Union-concatenates the per-file tables of one request.
///
/// Columns are unioned in first-seen order across tables in input order; rows
/// are concatenated preserving file order, with `CellScalar::Empty` filling
/// every column a source table lacked. Zero input tables is `EmptyResult` —
/// the caller must not attempt materialization.
pub fn aggregate(tables: Vec<Table>) -> Result<CombinedTable, AppError> {
    if tables.is_empty() {
        return Err(AppError::EmptyResult);
    }

    // Union header and each table's column positions in it, built together
    let mut columns: Vec<String> = Vec::new();
    let mut mappings: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut mapping = Vec::with_capacity(table.columns.len());
        for name in &table.columns {
            let idx = match columns.iter().position(|c| c == name) {
                Some(i) => i,
                None => {
                    columns.push(name.clone());
                    columns.len() - 1
                }
            };
            mapping.push(idx);
        }
        mappings.push(mapping);
    }

    let mut combined = CombinedTable {
        columns,
        rows: Vec::new(),
    };

    for (table, mapping) in tables.into_iter().zip(mappings) {
        for row in table.rows {
            let mut out = vec![CellScalar::Empty; combined.columns.len()];
            for (src_idx, value) in row.into_iter().enumerate() {
                if let Some(&dst_idx) = mapping.get(src_idx) {
                    out[dst_idx] = value;
                }
            }
            combined.rows.push(out);
        }
    }

    Ok(combined)
}
