//! 8.3 short name sanitization, path formatting, and packed timestamps.

use chrono::{Datelike, NaiveDateTime, TimeZone, Timelike, Utc};

/// Characters a short name or extension may contain after sanitization.
/// Matches the DOS short-name character set: upper-case letters, digits,
/// and a fixed set of punctuation; anything else folds to `_`.
const VALID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&'()@`_-{}~ ";

fn sanitize_char(c: u8) -> u8 {
    let upper = if (b'a'..=b'z').contains(&c) {
        c - 0x20
    } else {
        c
    };
    if VALID_CHARS.contains(&upper) {
        upper
    } else {
        b'_'
    }
}

/// An 11-byte packed short name: 8 bytes of name, 3 bytes of extension,
/// both space-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName(pub [u8; 11]);

impl ShortName {
    /// Splits a host-style `name` or `name.ext` string into a sanitized,
    /// space-padded 11-byte short name, truncating name to 8 bytes and
    /// extension to 3.
    pub fn from_host_str(input: &str) -> ShortName {
        let (stem, ext) = match input.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() => (s, e),
            _ => (input, ""),
        };

        let mut bytes = [b' '; 11];
        for (i, &b) in stem.as_bytes().iter().take(8).enumerate() {
            bytes[i] = sanitize_char(b);
        }
        for (i, &b) in ext.as_bytes().iter().take(3).enumerate() {
            bytes[8 + i] = sanitize_char(b);
        }
        ShortName(bytes)
    }

    /// Builds a short name directly from already-canonical 8-byte-name /
    /// 3-byte-extension parts — on-disk bytes, or the literal `.`/`..`
    /// markers — without running them back through sanitization (which
    /// would fold a literal `.` to `_`).
    pub fn from_parts(name: &[u8], ext: &[u8]) -> ShortName {
        let mut bytes = [b' '; 11];
        for (i, &b) in name.iter().take(8).enumerate() {
            bytes[i] = b;
        }
        for (i, &b) in ext.iter().take(3).enumerate() {
            bytes[8 + i] = b;
        }
        ShortName(bytes)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.0[0..8]
    }

    pub fn ext_bytes(&self) -> &[u8] {
        &self.0[8..11]
    }

    /// Renders the entry back as a display string, e.g. `"README.TXT"`,
    /// trimming trailing padding and omitting the dot when there is no
    /// extension.
    pub fn display_name(&self) -> String {
        let name = trim_trailing_spaces(self.name_bytes());
        let ext = trim_trailing_spaces(self.ext_bytes());
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }
}

fn trim_trailing_spaces(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Joins path segments with `/`, skipping the implicit root. An empty
/// `segments` renders as `/`.
pub fn format_path(segments: &[String]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Splits an absolute or relative path string into its non-empty
/// segments. A path that is empty once leading/trailing slashes are
/// stripped has no segments (the root).
pub fn split_path(input: &str) -> Vec<String> {
    input
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Packed FAT date/time fields plus the 10ms-resolution creation byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedTimestamp {
    pub date: u16,
    pub time: u16,
    pub tenths: u8,
}

/// Packs a UTC microsecond timestamp into FAT12's date/time/tenths
/// triple. Operates in UTC unconditionally (see design notes on why the
/// original's local-time handling is not reproduced).
pub fn pack_timestamp(micros_since_epoch: i64) -> PackedTimestamp {
    let secs = micros_since_epoch.div_euclid(1_000_000);
    let micros_rem = micros_since_epoch.rem_euclid(1_000_000);
    let dt = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(|| {
        Utc.timestamp_opt(0, 0)
            .single()
            .expect("epoch is always representable")
    });

    let mut millis = micros_rem / 1000;
    if dt.second() % 2 == 1 {
        millis += 1000;
    }

    let seconds = ((dt.second() / 2) & 0x1f) as u16;
    let minutes = (dt.minute() & 0x3f) as u16;
    let hours = (dt.hour() & 0x1f) as u16;
    let day = (dt.day() & 0x1f) as u16;
    let month = (dt.month() & 0x0f) as u16;
    let year = ((dt.year() - 1980).max(0) & 0x7f) as u16;

    let date = day | (month << 5) | (year << 9);
    let time = seconds | (minutes << 5) | (hours << 11);
    let tenths = (millis / 10) as u8;

    PackedTimestamp { date, time, tenths }
}

/// Unpacks a FAT12 date/time/tenths triple back to a UTC microsecond
/// timestamp. The inverse of [`pack_timestamp`], performed entirely in
/// UTC for determinism.
pub fn unpack_timestamp(date: u16, time: u16, tenths: u8) -> i64 {
    let day = (date & 0x1f) as u32;
    let month = ((date >> 5) & 0x0f) as u32;
    let year = 1980 + ((date >> 9) & 0x7f) as i32;

    let two_seconds = (time & 0x1f) as u32;
    let minute = ((time >> 5) & 0x3f) as u32;
    let hour = ((time >> 11) & 0x1f) as u32;

    let mut second = two_seconds * 2;
    let mut millis = (tenths as u32) * 10;
    if millis >= 1000 {
        second += 1;
        millis -= 1000;
    }

    let date = chrono::NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());
    let time = chrono::NaiveTime::from_hms_milli_opt(hour, minute, second.min(59), millis)
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    let naive = NaiveDateTime::new(date, time);
    Utc.from_utc_datetime(&naive).timestamp_micros()
}
