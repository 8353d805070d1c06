//! CSV candle import and export.
//!
//! Format: header `time,open,high,low,close,volume`, one row per minute,
//! `time` in RFC 3339 (UTC offset required).

use super::provider::DataError;
use crate::domain::Candle;
use std::io::{Read, Write};
use std::path::Path;

/// Read candles from any CSV reader.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut candles = Vec::new();
    for (row, record) in rdr.deserialize::<Candle>().enumerate() {
        let candle = record.map_err(|e| DataError::CsvError(format!("row {}: {e}", row + 1)))?;
        candles.push(candle);
    }
    Ok(candles)
}

/// Read candles from a CSV file on disk.
pub fn read_candles_file(path: &Path) -> Result<Vec<Candle>, DataError> {
    let file = std::fs::File::open(path)
        .map_err(|e| DataError::CsvError(format!("open {}: {e}", path.display())))?;
    read_candles(file)
}

/// Write candles as CSV.
pub fn write_candles<W: Write>(writer: W, candles: &[Candle]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for candle in candles {
        wtr.serialize(candle)
            .map_err(|e| DataError::CsvError(format!("write: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| DataError::CsvError(format!("flush: {e}")))?;
    Ok(())
}
