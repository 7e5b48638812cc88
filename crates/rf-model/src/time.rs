//! Timestamp normalization for feed items.
//!
//! Feeds publish dates in whatever layout their generator prefers. Rather
//! than probing every layout, the normalizer picks one by the length of the
//! raw string, with two tie-breaks for layouts that share a length:
//!
//! - ISO-8601 length: the byte at offset 19 decides between the `Z` suffixed
//!   form and the numeric offset form.
//! - Ruby-date length: a space at offset 3 selects Ruby-date, anything else
//!   RFC 850.
//!
//! A well-formed timestamp in an unlisted layout whose length happens to
//! match a listed one will not parse. Unparsable input yields [`sentinel`].

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// Known timestamp layouts, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `2006-01-02T15:04:05+09:00`
    Iso8601,
    /// `2006-01-02T15:04:05Z`
    Rfc3339,
    /// `2006-01-02T15:04:05.999999999+09:00`
    Rfc3339Nano,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `Monday, 02-Jan-06 15:04:05 MST`
    Rfc850,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon Jan  2 15:04:05 2006`
    Ansic,
    /// `Mon Jan  2 15:04:05 MST 2006`
    UnixDate,
    /// `Mon Jan 02 15:04:05 -0700 2006`
    RubyDate,
}

const LAYOUTS: [Layout; 11] = [
    Layout::Iso8601,
    Layout::Rfc3339,
    Layout::Rfc3339Nano,
    Layout::Rfc822,
    Layout::Rfc822Z,
    Layout::Rfc850,
    Layout::Rfc1123,
    Layout::Rfc1123Z,
    Layout::Ansic,
    Layout::UnixDate,
    Layout::RubyDate,
];

impl Layout {
    /// Byte length of a timestamp written in this layout.
    pub const fn width(self) -> usize {
        match self {
            Layout::Iso8601 => 25,
            Layout::Rfc3339 => 20,
            Layout::Rfc3339Nano => 35,
            Layout::Rfc822 => 19,
            Layout::Rfc822Z => 21,
            Layout::Rfc850 => 30,
            Layout::Rfc1123 => 29,
            Layout::Rfc1123Z => 31,
            Layout::Ansic => 24,
            Layout::UnixDate => 28,
            Layout::RubyDate => 30,
        }
    }

    fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Iso8601 => with_offset(raw, "%Y-%m-%dT%H:%M:%S%:z"),
            Layout::Rfc3339 => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive)),
            Layout::Rfc3339Nano => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc822 => with_zone_suffix(raw, "%d %b %y %H:%M"),
            Layout::Rfc822Z => with_offset(raw, "%d %b %y %H:%M %z"),
            Layout::Rfc850 => with_zone_suffix(skip_weekday(raw)?, "%d-%b-%y %H:%M:%S"),
            Layout::Rfc1123 => with_zone_suffix(skip_weekday(raw)?, "%d %b %Y %H:%M:%S"),
            Layout::Rfc1123Z => with_offset(skip_weekday(raw)?, "%d %b %Y %H:%M:%S %z"),
            Layout::Ansic => {
                let fields: Vec<&str> = skip_weekday(raw)?.split_whitespace().collect();
                in_utc(&fields.join(" "), "%b %d %H:%M:%S %Y")
            }
            Layout::UnixDate => {
                // month day clock zone year
                let fields: Vec<&str> = skip_weekday(raw)?.split_whitespace().collect();
                let [month, day, clock, zone, year] = fields.as_slice() else {
                    return None;
                };
                let naive = NaiveDateTime::parse_from_str(
                    &format!("{month} {day} {clock} {year}"),
                    "%b %d %H:%M:%S %Y",
                )
                .ok()?;
                localize(naive, zone_offset(zone))
            }
            Layout::RubyDate => with_offset(skip_weekday(raw)?, "%b %d %H:%M:%S %z %Y"),
        }
    }
}

/// The instant returned when no layout matches.
pub fn sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Choose the layout for `raw` by length, applying the tie-break rules.
pub fn select(raw: &str) -> Option<Layout> {
    let len = raw.len();
    let candidate = LAYOUTS.iter().copied().find(|layout| layout.width() == len)?;
    let bytes = raw.as_bytes();
    let layout = match candidate {
        Layout::Iso8601 | Layout::Rfc3339 => {
            if bytes.get(19) == Some(&b'Z') {
                Layout::Rfc3339
            } else {
                Layout::Iso8601
            }
        }
        Layout::Rfc850 | Layout::RubyDate => {
            if bytes.get(3) == Some(&b' ') {
                Layout::RubyDate
            } else {
                Layout::Rfc850
            }
        }
        other => other,
    };
    Some(layout)
}

/// Parse `raw`, or `None` when the selected layout does not match.
pub fn try_parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    select(raw)?.parse(raw)
}

/// Parse `raw`, failing closed to [`sentinel`].
pub fn parse(raw: &str) -> DateTime<Utc> {
    try_parse(raw).unwrap_or_else(sentinel)
}

/// Weekday names are not checked against the date, so drop them.
fn skip_weekday(raw: &str) -> Option<&str> {
    raw.split_once(' ').map(|(_, rest)| rest)
}

fn with_offset(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, format)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn in_utc(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Layouts ending in a zone abbreviation such as `MST`.
fn with_zone_suffix(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    let (body, zone) = raw.rsplit_once(' ')?;
    let naive = NaiveDateTime::parse_from_str(body, format).ok()?;
    localize(naive, zone_offset(zone))
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 822 zone names. Anything else is read as a zero offset.
fn zone_offset(abbr: &str) -> FixedOffset {
    let hours = match abbr.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
