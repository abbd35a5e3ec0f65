//! Timestamps and UTC-offset zones.
//!
//! Moments are stored as ISO-8601 text.  Zones are stored in their canonical
//! constructor form:
//!
//! ```text
//! zone   := "datetime.timezone.utc"
//!         | "datetime.timezone(" delta [ ", " quoted ] ")"
//! delta  := "datetime.timedelta(" ( "0" | field { ", " field } ) ")"
//! field  := ("days" | "seconds" | "microseconds") "=" integer
//! quoted := "'" chars "'" | '"' chars '"'
//! ```
//!
//! The text is parsed against that grammar only; nothing is evaluated.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ── Timestamp ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

fn fraction(nanos: u32) -> String {
    let nanos = nanos % 1_000_000_000;
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

/// Length of the `YYYY-MM-DDTHH:MM:SS` prefix.
const DATE_TIME_LEN: usize = 19;

/// `±HH:MM`, or `±HH:MM:SS` when the offset has a seconds part.
fn offset_text(offset: &FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs % 3600 / 60, abs % 60);
    if s == 0 {
        format!("{sign}{h:02}:{m:02}")
    } else {
        format!("{sign}{h:02}:{m:02}:{s:02}")
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = match text.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let mut seconds = 0i32;
    let mut fields = 0;
    for (part, unit) in text[1..].split(':').zip([3600, 60, 1]) {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        seconds += part.parse::<i32>().ok()? * unit;
        fields += 1;
    }
    if fields < 2 || text[1..].split(':').count() != fields {
        return None;
    }
    FixedOffset::east_opt(sign * seconds)
}

impl Timestamp {
    /// `YYYY-MM-DDTHH:MM:SS[.ffffff][±HH:MM[:SS]]`
    pub fn isoformat(&self) -> String {
        match self {
            Timestamp::Naive(dt) => {
                format!("{}{}", dt.format("%Y-%m-%dT%H:%M:%S"), fraction(dt.nanosecond()))
            }
            Timestamp::Aware(dt) => format!(
                "{}{}{}",
                dt.format("%Y-%m-%dT%H:%M:%S"),
                fraction(dt.nanosecond()),
                offset_text(dt.offset())
            ),
        }
    }

    pub fn parse_iso(text: &str) -> Result<Self> {
        let text = text.trim();
        let malformed = |why: String| Error::corrupt(format!("malformed datetime {text:?}: {why}"));
        let zone_at = text
            .get(DATE_TIME_LEN..)
            .and_then(|tail| tail.find(|c| c == '+' || c == '-'))
            .map(|i| i + DATE_TIME_LEN);
        let (local, zone) = match zone_at {
            Some(i) => (&text[..i], Some(&text[i..])),
            None => (text, None),
        };
        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| malformed(e.to_string()))?;
        let Some(zone) = zone else {
            return Ok(Timestamp::Naive(naive));
        };
        let offset = parse_offset(zone).ok_or_else(|| malformed(format!("bad UTC offset {zone:?}")))?;
        naive
            .and_local_timezone(offset)
            .single()
            .map(Timestamp::Aware)
            .ok_or_else(|| malformed("ambiguous local time".into()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.isoformat())
    }
}

// ── ZoneOffset ───────────────────────────────────────────────────────────────

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// A fixed UTC offset (strictly within ±24h) with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneOffset {
    offset_us: i64,
    name: Option<String>,
}

impl ZoneOffset {
    pub fn utc() -> Self {
        ZoneOffset { offset_us: 0, name: None }
    }

    pub fn new(offset_us: i64, name: Option<String>) -> Result<Self> {
        if offset_us.abs() >= MICROS_PER_DAY {
            return Err(Error::InvalidArgument(format!(
                "zone offset must be strictly between -24h and 24h, got {offset_us}us"
            )));
        }
        Ok(ZoneOffset { offset_us, name })
    }

    pub fn offset_micros(&self) -> i64 {
        self.offset_us
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `None` when the offset has a sub-second part.
    pub fn to_fixed_offset(&self) -> Option<FixedOffset> {
        if self.offset_us % MICROS_PER_SECOND != 0 {
            return None;
        }
        FixedOffset::east_opt(i32::try_from(self.offset_us / MICROS_PER_SECOND).ok()?)
    }

    fn is_utc_singleton(&self) -> bool {
        self.offset_us == 0 && self.name.is_none()
    }
}

fn write_delta(f: &mut fmt::Formatter<'_>, total_us: i64) -> fmt::Result {
    let days = total_us.div_euclid(MICROS_PER_DAY);
    let rem = total_us.rem_euclid(MICROS_PER_DAY);
    let seconds = rem / MICROS_PER_SECOND;
    let micros = rem % MICROS_PER_SECOND;

    let mut fields = Vec::new();
    if days != 0 {
        fields.push(format!("days={days}"));
    }
    if seconds != 0 {
        fields.push(format!("seconds={seconds}"));
    }
    if micros != 0 {
        fields.push(format!("microseconds={micros}"));
    }
    if fields.is_empty() {
        fields.push("0".to_owned());
    }
    write!(f, "datetime.timedelta({})", fields.join(", "))
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_utc_singleton() {
            return f.write_str("datetime.timezone.utc");
        }
        f.write_str("datetime.timezone(")?;
        write_delta(f, self.offset_us)?;
        if let Some(name) = &self.name {
            f.write_str(", ")?;
            write_quoted(f, name)?;
        }
        f.write_str(")")
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Cursor<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Cursor { source, rest: source.trim() }
    }

    fn fail(&self, what: &str) -> Error {
        Error::corrupt(format!("malformed timezone {:?}: {what} at {:?}", self.source, self.rest))
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, lit: &str) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(lit) {
            Some(r) => {
                self.rest = r;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, lit: &str) -> Result<()> {
        if self.eat(lit) { Ok(()) } else { Err(self.fail(&format!("expected {lit:?}"))) }
    }

    /// Qualified constructor name; the `datetime.` module prefix is optional.
    fn name(&mut self, name: &str) -> Result<()> {
        self.eat("datetime.");
        self.expect(name)
    }

    fn integer(&mut self) -> Result<i64> {
        self.skip_ws();
        let end = self
            .rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let n = digits.parse::<i64>().map_err(|_| self.fail("expected an integer"))?;
        self.rest = rest;
        Ok(n)
    }

    fn quoted(&mut self) -> Result<String> {
        self.skip_ws();
        let src = self.rest;
        let mut chars = src.char_indices();
        let quote = match chars.next() {
            Some((_, q @ ('\'' | '"'))) => q,
            _ => return Err(self.fail("expected a quoted name")),
        };
        let mut out = String::new();
        let mut escaped = false;
        for (i, c) in chars {
            if escaped {
                out.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                self.rest = &src[i + c.len_utf8()..];
                return Ok(out);
            } else {
                out.push(c);
            }
        }
        Err(self.fail("unterminated name"))
    }

    fn delta(&mut self) -> Result<i64> {
        self.name("timedelta")?;
        self.expect("(")?;
        let mut total: i64 = 0;
        if self.eat(")") {
            return Ok(0);
        }
        loop {
            self.skip_ws();
            let scale = if self.eat("days") {
                MICROS_PER_DAY
            } else if self.eat("seconds") {
                MICROS_PER_SECOND
            } else if self.eat("microseconds") {
                1
            } else {
                // positional form: timedelta(0) or timedelta(days)
                let n = self.integer()?;
                total = n.checked_mul(MICROS_PER_DAY).ok_or_else(|| self.fail("offset overflow"))?;
                self.expect(")")?;
                return Ok(total);
            };
            self.expect("=")?;
            let n = self.integer()?;
            let part = n.checked_mul(scale).ok_or_else(|| self.fail("offset overflow"))?;
            total = total.checked_add(part).ok_or_else(|| self.fail("offset overflow"))?;
            if self.eat(")") {
                return Ok(total);
            }
            self.expect(",")?;
        }
    }

    fn zone(&mut self) -> Result<ZoneOffset> {
        self.name("timezone")?;
        let zone = if self.eat(".utc") {
            ZoneOffset::utc()
        } else {
            self.expect("(")?;
            let offset = self.delta()?;
            let name = if self.eat(",") { Some(self.quoted()?) } else { None };
            self.expect(")")?;
            ZoneOffset::new(offset, name)?
        };
        self.skip_ws();
        if !self.rest.is_empty() {
            return Err(self.fail("trailing input"));
        }
        Ok(zone)
    }
}

impl FromStr for ZoneOffset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Cursor::new(s).zone()
    }
}
