//! Streaming decoder for source files.
//!
//! The layout is fixed: `date_txt, time_txt, open, high, low, close, volume`,
//! comma separated, with an optional header row declared by the caller.
//! Rows are decoded one at a time so a file is never held in memory.

use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Read;
use std::str::FromStr;

use super::ingest_model::RawBar;
use crate::constants::{COPY_CHUNK_SIZE, PRICE_PRECISION, PRICE_SCALE, SOURCE_FIELD_COUNT};
use crate::errors::{Result, ValidationError};

/// Decodes [`RawBar`]s from a delimited byte stream.
pub struct BarReader<R: Read> {
    records: csv::Reader<R>,
    record: StringRecord,
}

impl<R: Read> BarReader<R> {
    pub fn new(source: R, has_header: bool) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(has_header)
            .flexible(true)
            .trim(Trim::None)
            .buffer_capacity(COPY_CHUNK_SIZE)
            .from_reader(source);
        Self {
            records,
            record: StringRecord::new(),
        }
    }

    /// Reads the next bar, or `None` at end of input.
    pub fn next_bar(&mut self) -> Result<Option<RawBar>> {
        if !self.records.read_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map(|p| p.line()).unwrap_or(0);
        parse_record(&self.record, line).map(Some)
    }

    /// Fills `batch` with up to `max` bars and returns how many were read.
    pub fn read_batch(&mut self, batch: &mut Vec<RawBar>, max: usize) -> Result<usize> {
        batch.clear();
        while batch.len() < max {
            match self.next_bar()? {
                Some(bar) => batch.push(bar),
                None => break,
            }
        }
        Ok(batch.len())
    }
}

fn parse_record(record: &StringRecord, line: u64) -> Result<RawBar> {
    if record.len() != SOURCE_FIELD_COUNT {
        return Err(ValidationError::malformed_row(
            line,
            format!(
                "expected {} fields, found {}",
                SOURCE_FIELD_COUNT,
                record.len()
            ),
        )
        .into());
    }

    Ok(RawBar {
        date_txt: record[0].to_string(),
        time_txt: record[1].to_string(),
        open: parse_price("open", &record[2], line)?,
        high: parse_price("high", &record[3], line)?,
        low: parse_price("low", &record[4], line)?,
        close: parse_price("close", &record[5], line)?,
        volume: parse_volume(&record[6], line)?,
    })
}

/// Parses a price into numeric(20,10): extra fractional digits are rounded
/// half away from zero, an integer part wider than 10 digits is rejected.
fn parse_price(field: &str, raw: &str, line: u64) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim()).map_err(|e| {
        ValidationError::malformed_row(line, format!("{} '{}' is not a decimal: {}", field, raw, e))
    })?;
    let value = value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);

    let limit = Decimal::from_i128_with_scale(10i128.pow(PRICE_PRECISION - PRICE_SCALE), 0);
    if value.abs() >= limit {
        return Err(ValidationError::malformed_row(
            line,
            format!(
                "{} '{}' exceeds numeric({},{})",
                field, raw, PRICE_PRECISION, PRICE_SCALE
            ),
        )
        .into());
    }
    Ok(value)
}

fn parse_volume(raw: &str, line: u64) -> Result<i64> {
    let volume: i64 = raw.trim().parse().map_err(|e| {
        ValidationError::malformed_row(line, format!("volume '{}' is not an integer: {}", raw, e))
    })?;
    if volume < 0 {
        return Err(
            ValidationError::malformed_row(line, format!("volume {} is negative", volume)).into(),
        );
    }
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use rust_decimal_macros::dec;

    fn read_all(input: &str, has_header: bool) -> Result<Vec<RawBar>> {
        let mut reader = BarReader::new(input.as_bytes(), has_header);
        let mut bars = Vec::new();
        while let Some(bar) = reader.next_bar()? {
            bars.push(bar);
        }
        Ok(bars)
    }

    fn malformed_line(err: Error) -> u64 {
        match err {
            Error::Validation(ValidationError::MalformedRow { line, .. }) => line,
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_reads_rows_without_header() {
        let bars = read_all(
            "2024.01.02,00:00,1.1010,1.1020,1.1000,1.1015,120\n\
             2024.01.02,00:01,1.1015,1.1030,1.1010,1.1025,95\n",
            false,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date_txt, "2024.01.02");
        assert_eq!(bars[0].time_txt, "00:00");
        assert_eq!(bars[0].open, dec!(1.1010));
        assert_eq!(bars[1].close, dec!(1.1025));
        assert_eq!(bars[1].volume, 95);
    }

    #[test]
    fn test_header_row_is_skipped_only_when_declared() {
        let input = "date,time,open,high,low,close,volume\n\
                     2024.01.02,00:00,1,2,0.5,1.5,7\n";
        let bars = read_all(input, true).unwrap();
        assert_eq!(bars.len(), 1);

        // Undeclared header is decoded as data and fails on the price column.
        let err = read_all(input, false).unwrap_err();
        assert_eq!(malformed_line(err), 1);
    }

    #[test]
    fn test_wrong_field_count() {
        let err = read_all(
            "2024.01.02,00:00,1,2,0.5,1.5,7\n2024.01.02,00:01,1,2,0.5,1.5\n",
            false,
        )
        .unwrap_err();
        assert_eq!(malformed_line(err), 2);
    }

    #[test]
    fn test_non_numeric_price() {
        let err = read_all("2024.01.02,00:00,abc,2,0.5,1.5,7\n", false).unwrap_err();
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_price_is_rounded_to_ten_places() {
        let bars = read_all("2024.01.02,00:00,1.123456789049,1.00000000005,1,1,0\n", false).unwrap();
        assert_eq!(bars[0].open, dec!(1.1234567890));
        assert_eq!(bars[0].high, dec!(1.0000000001));
    }

    #[test]
    fn test_price_integer_part_overflow() {
        assert!(read_all("2024.01.02,00:00,9999999999.5,1,1,1,0\n", false).is_ok());
        let err = read_all("2024.01.02,00:00,10000000000,1,1,1,0\n", false).unwrap_err();
        assert!(err.to_string().contains("numeric(20,10)"));
    }

    #[test]
    fn test_volume_must_be_non_negative_integer() {
        assert!(read_all("2024.01.02,00:00,1,1,1,1,1.5\n", false).is_err());
        assert!(read_all("2024.01.02,00:00,1,1,1,1,-3\n", false).is_err());
        let bars = read_all("2024.01.02,00:00,1,1,1,1,9223372036854775807\n", false).unwrap();
        assert_eq!(bars[0].volume, i64::MAX);
    }

    #[test]
    fn test_date_and_time_text_is_not_validated_here() {
        let bars = read_all("not-a-date,later,1,1,1,1,1\n", false).unwrap();
        assert_eq!(bars[0].date_txt, "not-a-date");
    }

    #[test]
    fn test_read_batch() {
        let input: String = (0..5)
            .map(|i| format!("2024.01.02,00:0{},1,1,1,1,{}\n", i, i))
            .collect();
        let mut reader = BarReader::new(input.as_bytes(), false);
        let mut batch = Vec::new();
        assert_eq!(reader.read_batch(&mut batch, 2).unwrap(), 2);
        assert_eq!(reader.read_batch(&mut batch, 2).unwrap(), 2);
        assert_eq!(reader.read_batch(&mut batch, 2).unwrap(), 1);
        assert_eq!(batch[0].volume, 4);
        assert_eq!(reader.read_batch(&mut batch, 2).unwrap(), 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(read_all("", false).unwrap().is_empty());
        assert!(read_all("date,time,open,high,low,close,volume\n", true)
            .unwrap()
            .is_empty());
    }
}
