//! Cell rendering: date serials and numeric cleanup.
//!
//! Spreadsheets store dates as day counts from 1899-12-30 (the epoch that
//! absorbs Excel's fictitious 1900-02-29). The mainframe expects `YYYYMMDD`.

use chrono::{Datelike, Days, NaiveDate};
use once_cell::sync::Lazy;

use crate::models::Cell;

/// Largest serial the spreadsheet format can express (9999-12-31).
pub const MAX_SERIAL: i64 = 2_958_465;

/// Numbers in this range already are `YYYYMMDD` dates; a fractional part
/// is dropped.
const PREFORMATTED: std::ops::RangeInclusive<f64> = 10_000_101.0..=99_991_231.0;

/// Text layouts accepted in date columns besides serials.
const TEXT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

static EPOCH: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(1899, 12, 30).expect("1899-12-30 is a valid date"));

/// Day 0 of date serials.
pub fn epoch() -> NaiveDate {
    *EPOCH
}

/// Date of a serial. The fractional part (time of day) is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    if days < 0.0 || days > MAX_SERIAL as f64 {
        return None;
    }
    epoch().checked_add_days(Days::new(days as u64))
}

/// Serial of a date.
pub fn date_to_serial(date: NaiveDate) -> i64 {
    date.signed_duration_since(epoch()).num_days()
}

/// `YYYYMMDD`
pub fn yyyymmdd(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

/// Render a cell of a date column.
///
/// - `Ok(Some(_))`: rendered as `YYYYMMDD`
/// - `Ok(None)`: empty, left as is
/// - `Err(())`: not a date
pub fn render_date(cell: &Cell) -> Result<Option<String>, ()> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Date(d) => Ok(Some(yyyymmdd(*d))),
        Cell::Number(n) => render_serial(*n).map(Some),
        Cell::Bool(_) => Err(()),
        Cell::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if let Ok(n) = text.parse::<f64>() {
                return render_serial(n).map(Some);
            }
            parse_text_date(text).map(|d| Some(yyyymmdd(d))).ok_or(())
        }
    }
}

fn render_serial(n: f64) -> Result<String, ()> {
    if PREFORMATTED.contains(&n) {
        let candidate = format!("{:.0}", n.trunc());
        if NaiveDate::parse_from_str(&candidate, "%Y%m%d").is_ok() {
            return Ok(candidate);
        }
    }
    serial_to_date(n).map(yyyymmdd).ok_or(())
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    // Drop a time part ("2024-01-31 00:00:00", "2024-01-31T10:00")
    let date_part = text.split(|c| c == ' ' || c == 'T').next().unwrap_or(text);
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Render a number: integral values without fractional part, others with
/// `decimal` as separator.
pub fn format_number(value: f64, decimal: char) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        if value == 0.0 {
            return "0".to_string();
        }
        return format!("{:.0}", value);
    }
    let text = value.to_string();
    if decimal == '.' {
        text
    } else {
        text.replace('.', &decimal.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(serial_to_date(1.0), Some(date(1899, 12, 31)));
        assert_eq!(serial_to_date(61.0), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_date(45292.0), Some(date(2024, 1, 1)));
        assert_eq!(serial_to_date(45292.75), Some(date(2024, 1, 1)));
        assert_eq!(serial_to_date(MAX_SERIAL as f64), Some(date(9999, 12, 31)));
        assert_eq!(serial_to_date(-1.0), None);
        assert_eq!(serial_to_date(f64::NAN), None);
    }

    #[test]
    fn test_serial_round_trip() {
        for serial in (1..=MAX_SERIAL).step_by(997).chain([61, 60_000, MAX_SERIAL]) {
            let d = serial_to_date(serial as f64).unwrap();
            assert_eq!(date_to_serial(d), serial);
        }
    }

    #[test]
    fn test_render_date_cells() {
        assert_eq!(render_date(&Cell::Number(45292.0)), Ok(Some("20240101".into())));
        assert_eq!(render_date(&Cell::Text(" 45292 ".into())), Ok(Some("20240101".into())));
        assert_eq!(render_date(&Cell::Number(20240131.0)), Ok(Some("20240131".into())));
        assert_eq!(render_date(&Cell::Text("20240131".into())), Ok(Some("20240131".into())));
        assert_eq!(render_date(&Cell::Date(date(2023, 7, 9))), Ok(Some("20230709".into())));
        assert_eq!(render_date(&Cell::Text("2024-02-29 00:00:00".into())), Ok(Some("20240229".into())));
        assert_eq!(render_date(&Cell::Text("31/12/2023".into())), Ok(Some("20231231".into())));
        assert_eq!(render_date(&Cell::Empty), Ok(None));
        assert_eq!(render_date(&Cell::Text("   ".into())), Ok(None));
    }

    #[test]
    fn test_preformatted_date_drops_fraction() {
        assert_eq!(render_date(&Cell::Number(20240131.5)), Ok(Some("20240131".into())));
        assert_eq!(render_date(&Cell::Text("20240131.25".into())), Ok(Some("20240131".into())));
        assert_eq!(render_date(&Cell::Number(20241301.5)), Err(()));
    }

    #[test]
    fn test_epoch_is_day_zero() {
        assert_eq!(epoch(), date(1899, 12, 30));
        assert_eq!(date_to_serial(epoch()), 0);
    }

    #[test]
    fn test_render_date_rejects_garbage() {
        assert_eq!(render_date(&Cell::Text("pending".into())), Err(()));
        assert_eq!(render_date(&Cell::Number(-5.0)), Err(()));
        assert_eq!(render_date(&Cell::Bool(true)), Err(()));
    }

    #[test]
    fn test_format_number_integral() {
        assert_eq!(format_number(2_500_000.0, '.'), "2500000");
        assert_eq!(format_number(2_500_000.0, ','), "2500000");
        assert_eq!(format_number(-0.0, '.'), "0");
        assert_eq!(format_number(-42.0, ','), "-42");
    }

    #[test]
    fn test_format_number_fraction_both_separators() {
        assert_eq!(format_number(1234.56, '.'), "1234.56");
        assert_eq!(format_number(1234.56, ','), "1234,56");
        assert_eq!(format_number(0.05, ','), "0,05");
    }
}
