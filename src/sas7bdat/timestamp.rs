//! SAS epoch and release-string conversions.
//!
//! SAS7BDAT headers store timestamps as IEEE 754 doubles counting seconds
//! since 1960-01-01 00:00:00 in local wall-clock time, and the originating
//! software version as an 8-byte release string like `9.0101M0`.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

fn sas_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1960, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Seconds between the SAS epoch and `t`, in local wall-clock time.
#[must_use]
pub fn seconds_since_1960(t: DateTime<Local>) -> f64 {
    (t.naive_local() - sas_epoch()).num_seconds() as f64
}

/// Recover a local timestamp from SAS epoch seconds.
///
/// Returns `None` for values outside the representable range or falling
/// into a local-time gap.
#[must_use]
pub fn datetime_from_seconds(seconds: f64) -> Option<DateTime<Local>> {
    if !seconds.is_finite() {
        return None;
    }
    let naive = sas_epoch().checked_add_signed(chrono::TimeDelta::try_seconds(seconds as i64)?)?;
    Local.from_local_datetime(&naive).earliest()
}

/// Format the 8-byte release field from a declared file version.
///
/// Layout is `<major>.<4-digit minor>M0` with the final byte forced to
/// `'0'`; overlong major versions truncate from the right, exactly as the
/// field width dictates.
#[must_use]
pub fn format_release(version: i64) -> [u8; 8] {
    let mut field = [0u8; 8];
    let text = format!("{}.{:04}M0", version / 10000, version % 10000);
    let bytes = text.as_bytes();
    let n = bytes.len().min(7);
    field[..n].copy_from_slice(&bytes[..n]);
    field[7] = b'0';
    field
}

/// Parse a release field back into a declared version, 0 if unparseable.
#[must_use]
pub fn parse_release(field: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(field);
    let text = text.trim_end_matches(['\0', ' ']);
    let Some((major, rest)) = text.split_once('.') else {
        return 0;
    };
    let minor: String = rest.chars().take_while(char::is_ascii_digit).collect();
    match (major.parse::<i64>(), minor.parse::<i64>()) {
        (Ok(maj), Ok(min)) => maj * 10000 + min,
        _ => 0,
    }
}
