//! Logical submission month from a record identifier.
//!
//! Repository datestamps track the last metadata change, so a paper revised
//! in 2024 shows up under 2024 even if it was submitted in 2019. The
//! identifier itself encodes the submission month (`YYMM.NNNNN`), which is
//! what we bucket on.

use crate::models::YearMonth;

/// Extracts the `(year, month)` bucket from an identifier such as
/// `oai:arXiv.org:2401.12345`.
///
/// Only the segment after the last `:` is examined. It must be four digits
/// `YYMM`, a `.`, then at least one digit, optionally followed by a version
/// suffix (`v2`). `YY` maps to `2000 + YY` and `MM` must be `01..=12`.
///
/// Old-style identifiers (`math/0501001`) and anything malformed yield
/// `None`; callers skip those records.
///
/// # Examples
///
/// ```
/// use pubtrend_core::identifier::parse_year_month;
///
/// let ym = parse_year_month("oai:arXiv.org:2401.12345").unwrap();
/// assert_eq!((ym.year(), ym.month()), (2024, 1));
///
/// assert!(parse_year_month("oai:arXiv.org:math/0501001").is_none());
/// ```
pub fn parse_year_month(identifier: &str) -> Option<YearMonth> {
    let segment = identifier.rsplit(':').next()?;
    let (prefix, rest) = segment.split_once('.')?;

    if prefix.len() != 4 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let suffix = &rest[digits..];
    if !suffix.is_empty() && !is_version_suffix(suffix) {
        return None;
    }

    let yy: i32 = prefix[..2].parse().ok()?;
    let mm: u32 = prefix[2..].parse().ok()?;
    YearMonth::new(2000 + yy, mm)
}

fn is_version_suffix(s: &str) -> bool {
    s.strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
