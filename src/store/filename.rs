//! Content-addressed raw file names.
//!
//! A name is `{YYYY_MM_DD_HH_MM_SS}_{md5(title)}.xml`, where the timestamp keeps
//! the wall-clock fields of the feed's own offset. The first seven characters
//! (`YYYY_MM`) are the archive month.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use md5::{Digest, Md5};

use crate::error::{AppError, Result};

const NORMALIZED_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Length of the `YYYY_MM` prefix used to group files by month.
pub const MONTH_PREFIX_LEN: usize = 7;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%a, %d %b %Y %H:%M:%S %z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

pub fn derive_filename(title: &str, pub_date: &str) -> Result<String> {
    let timestamp = parse_pub_date(pub_date)?;
    let hash = hex::encode(Md5::digest(title.as_bytes()));
    Ok(format!(
        "{}_{}.xml",
        timestamp.format(NORMALIZED_FORMAT),
        hash
    ))
}

/// Parse a feed timestamp into its local wall-clock time.
pub fn parse_pub_date(pub_date: &str) -> Result<NaiveDateTime> {
    let s = pub_date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(s, format) {
            return Ok(dt.naive_local());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(AppError::InvalidTimestamp(pub_date.to_string()))
}
