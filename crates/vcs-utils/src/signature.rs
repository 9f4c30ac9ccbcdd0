use std::fmt;

use bstr::{BStr, BString, ByteSlice, ByteVec};
use chrono::{DateTime, FixedOffset, Local, TimeZone};

use crate::error::UtilError;
use crate::Result;

/// A point in time with the UTC offset it was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes (e.g. -300 for UTC-05:00).
    pub offset_minutes: i32,
}

impl Time {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// The current time in the local timezone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// Parse the raw form `<seconds> <+|-HHMM>`.
    pub fn parse_raw(input: &str) -> Result<Self> {
        let input = input.trim();
        let (secs, tz) = match input.split_once(' ') {
            Some((secs, tz)) => (secs, Some(tz.trim())),
            None => (input, None),
        };

        let seconds: i64 = secs
            .parse()
            .map_err(|_| UtilError::Time(format!("invalid timestamp: '{}'", secs)))?;

        let offset_minutes = match tz {
            None => 0,
            Some(tz) => parse_offset(tz)?,
        };

        Ok(Self {
            seconds,
            offset_minutes,
        })
    }

    /// Render as `<seconds> <+|-HHMM>`.
    pub fn to_raw(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{} {}{:02}{:02}", self.seconds, sign, abs / 60, abs % 60)
    }

    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        offset.timestamp_opt(self.seconds, 0).single()
    }
}

fn parse_offset(tz: &str) -> Result<i32> {
    let invalid = || UtilError::Time(format!("invalid timezone: '{}'", tz));
    let (sign, digits) = match tz.as_bytes().first() {
        Some(b'+') => (1, &tz[1..]),
        Some(b'-') => (-1, &tz[1..]),
        _ => (1, tz),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    Ok(sign * (hours * 60 + minutes))
}

/// Author, committer or tagger identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub when: Time,
}

impl Signature {
    /// Build a signature, trimming surrounding whitespace.
    ///
    /// The name must be non-empty. Neither part may contain `<`, `>` or a
    /// newline, since those would make the encoded form ambiguous.
    pub fn new(name: impl AsRef<[u8]>, email: impl AsRef<[u8]>, when: Time) -> Result<Self> {
        let name = name.as_ref().trim();
        let email = email.as_ref().trim();
        if name.is_empty() {
            return Err(UtilError::Signature("empty name".into()));
        }
        for part in [name, email] {
            if part.iter().any(|&b| matches!(b, b'<' | b'>' | b'\n' | b'\0')) {
                return Err(UtilError::Signature(format!(
                    "'{}' contains a reserved character",
                    part.as_bstr()
                )));
            }
        }
        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            when,
        })
    }

    /// A signature stamped with the current local time.
    pub fn now(name: impl AsRef<[u8]>, email: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(name, email, Time::now())
    }

    /// Parse `Name <email> <seconds> <tz>`.
    pub fn parse(input: &BStr) -> Result<Self> {
        let input = input.as_bytes();

        let gt = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| UtilError::Signature("missing '>'".into()))?;
        let lt = input[..gt]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| UtilError::Signature("missing '<'".into()))?;

        let when = input[gt + 1..]
            .to_str()
            .map_err(|_| UtilError::Signature("non-UTF-8 timestamp".into()))?;

        Ok(Self {
            name: BString::from(input[..lt].trim()),
            email: BString::from(&input[lt + 1..gt]),
            when: Time::parse_raw(when)?,
        })
    }

    /// Canonical encoded form used inside commit and tag headers.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::new(Vec::with_capacity(
            self.name.len() + self.email.len() + 24,
        ));
        out.push_str(&self.name);
        out.push_str(b" <");
        out.push_str(&self.email);
        out.push_str(b"> ");
        out.push_str(self.when.to_raw());
        out
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
