use std::io::Read;
use std::path::Path;

use crate::error::{ForecastError, Result};

/// Reads one numeric column of a headed CSV file as an ordered series.
///
/// `column` selects by header name; `None` takes the last column.
pub fn load_series<P: AsRef<Path>>(path: P, column: Option<&str>) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path.as_ref())?;
    let series = series_from_reader(file, column)?;
    log::info!(
        "loaded {} observations from {}",
        series.len(),
        path.as_ref().display()
    );
    Ok(series)
}

pub fn series_from_reader<R: Read>(reader: R, column: Option<&str>) -> Result<Vec<f64>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let index = match column {
        Some(name) => headers.iter().position(|h| h == name).ok_or_else(|| {
            ForecastError::InvalidParameter(format!("column '{name}' not found in CSV header"))
        })?,
        None => headers.len().checked_sub(1).ok_or_else(|| {
            ForecastError::InvalidParameter("CSV has no columns".to_string())
        })?,
    };

    let mut series = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = record.get(index).unwrap_or("");
        let value: f64 = cell.parse().map_err(|_| {
            ForecastError::InvalidParameter(format!(
                "row {}: cannot parse '{cell}' as a number",
                row + 1
            ))
        })?;
        series.push(value);
    }
    Ok(series)
}
