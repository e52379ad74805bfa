//! Crontab spec parsing.
//!
//! A [`Parser`] is configured with the set of fields it expects (at most one
//! of which may be optional), whether `@`-descriptors are accepted, and
//! whether the `L` / `<dow>#<n>` extensions are enabled. The stock
//! dialects are [`Parser::standard`] (five fields) and
//! [`Parser::with_seconds`] (six fields, seconds required);
//! [`Parser::seconds_optional`] and the year-bearing [`Parser::quartz`]
//! cover the remaining corpus modes.

use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::error::{Error, Result};
use crate::schedule::{ConstantDelay, Schedule};
use crate::spec::{FieldSet, Nth, NthDow, SpecSchedule, YearSet};
use crate::timezone::Location;

/// One parser configuration flag; combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOption(u32);

impl ParseOption {
    /// Seconds field, default `0`.
    pub const SECOND: ParseOption = ParseOption(1 << 0);
    /// Seconds field, optional.
    pub const SECOND_OPTIONAL: ParseOption = ParseOption(1 << 1);
    /// Minutes field, default `0`.
    pub const MINUTE: ParseOption = ParseOption(1 << 2);
    /// Hours field, default `0`.
    pub const HOUR: ParseOption = ParseOption(1 << 3);
    /// Day-of-month field, default `*`.
    pub const DOM: ParseOption = ParseOption(1 << 4);
    /// Month field, default `*`.
    pub const MONTH: ParseOption = ParseOption(1 << 5);
    /// Day-of-week field, default `*`.
    pub const DOW: ParseOption = ParseOption(1 << 6);
    /// Day-of-week field, optional.
    pub const DOW_OPTIONAL: ParseOption = ParseOption(1 << 7);
    /// Year field, default `*`.
    pub const YEAR: ParseOption = ParseOption(1 << 8);
    /// Year field, optional.
    pub const YEAR_OPTIONAL: ParseOption = ParseOption(1 << 9);
    /// Allow descriptors such as `@monthly` and `@every 1h`.
    pub const DESCRIPTOR: ParseOption = ParseOption(1 << 10);
    /// Allow `L` in day-of-month and `<dow>#<n>` in day-of-week.
    pub const EXTENSIONS: ParseOption = ParseOption(1 << 11);

    fn has(self, other: ParseOption) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ParseOption {
    type Output = ParseOption;

    fn bitor(self, rhs: ParseOption) -> ParseOption {
        ParseOption(self.0 | rhs.0)
    }
}

/// A crontab spec parser for a fixed set of fields.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    options: ParseOption,
}

impl Parser {
    /// Custom field configuration. An `*_OPTIONAL` flag implies its field.
    pub fn new(options: ParseOption) -> Parser {
        let mut options = options;
        if options.has(ParseOption::SECOND_OPTIONAL) {
            options = options | ParseOption::SECOND;
        }
        if options.has(ParseOption::DOW_OPTIONAL) {
            options = options | ParseOption::DOW;
        }
        if options.has(ParseOption::YEAR_OPTIONAL) {
            options = options | ParseOption::YEAR;
        }
        Parser { options }
    }

    /// Standard crontab dialect: minute hour dom month dow, plus descriptors.
    pub fn standard() -> Parser {
        Parser::new(
            ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::DESCRIPTOR,
        )
    }

    /// Six-field dialect with a REQUIRED seconds field, plus descriptors.
    pub fn with_seconds() -> Parser {
        Parser::new(
            ParseOption::SECOND
                | ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::DESCRIPTOR,
        )
    }

    /// Six-field dialect where the seconds field may be omitted (defaults 0).
    pub fn seconds_optional() -> Parser {
        Parser::new(
            ParseOption::SECOND_OPTIONAL
                | ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::DESCRIPTOR,
        )
    }

    /// Quartz-style dialect: seconds required, trailing optional year field.
    pub fn quartz() -> Parser {
        Parser::new(
            ParseOption::SECOND
                | ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW
                | ParseOption::YEAR_OPTIONAL
                | ParseOption::DESCRIPTOR,
        )
    }

    /// Same parser with the `L` / `#` extensions enabled.
    pub fn with_extensions(self) -> Parser {
        Parser {
            options: self.options | ParseOption::EXTENSIONS,
        }
    }

    /// Parse a spec, evaluating wall-clock fields in the process-local zone
    /// unless the spec carries a `TZ=` / `CRON_TZ=` prefix.
    pub fn parse(&self, spec: &str) -> Result<Arc<dyn Schedule>> {
        self.parse_in(spec, Location::Local)
    }

    /// Parse a spec with an explicit default location for schedules that do
    /// not carry their own `TZ=` / `CRON_TZ=` prefix.
    pub fn parse_in(&self, spec: &str, default_location: Location) -> Result<Arc<dyn Schedule>> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(Error::FieldCount {
                expected: self.expected_message(),
                found: 0,
                spec: spec.to_string(),
            });
        }

        let (location, rest) = parse_tz_prefix(trimmed, default_location)?;

        if rest.starts_with('@') {
            if !self.options.has(ParseOption::DESCRIPTOR) {
                return Err(Error::DescriptorNotEnabled(rest.to_string()));
            }
            return parse_descriptor(rest, location);
        }

        Ok(Arc::new(self.parse_fields(rest, location, spec)?))
    }

    fn parse_fields(&self, input: &str, location: Location, source: &str) -> Result<SpecSchedule> {
        // Canonical field order, lowest to highest, with per-field defaults.
        // Disabled and omitted-optional fields keep their default.
        const FIELDS: [(ParseOption, ParseOption, &str); 7] = [
            (ParseOption::SECOND, ParseOption::SECOND_OPTIONAL, "0"),
            (ParseOption::MINUTE, ParseOption(0), "0"),
            (ParseOption::HOUR, ParseOption(0), "0"),
            (ParseOption::DOM, ParseOption(0), "*"),
            (ParseOption::MONTH, ParseOption(0), "*"),
            (ParseOption::DOW, ParseOption::DOW_OPTIONAL, "*"),
            (ParseOption::YEAR, ParseOption::YEAR_OPTIONAL, "*"),
        ];

        let tokens: Vec<&str> = input.split_whitespace().collect();

        let mut slots: [&str; 7] = [
            FIELDS[0].2, FIELDS[1].2, FIELDS[2].2, FIELDS[3].2, FIELDS[4].2, FIELDS[5].2,
            FIELDS[6].2,
        ];

        let expected: Vec<usize> = FIELDS
            .iter()
            .enumerate()
            .filter(|(_, (field, _, _))| self.options.has(*field))
            .map(|(i, _)| i)
            .collect();
        let optional = FIELDS
            .iter()
            .enumerate()
            .find(|(_, (_, opt, _))| self.options.has(*opt))
            .map(|(i, _)| i);

        if tokens.len() == expected.len() {
            for (slot, token) in expected.iter().zip(tokens.iter()) {
                slots[*slot] = *token;
            }
        } else if tokens.len() + 1 == expected.len() && optional.is_some() {
            let mut tokens = tokens.iter();
            for slot in &expected {
                if Some(*slot) == optional {
                    continue;
                }
                if let Some(token) = tokens.next() {
                    slots[*slot] = *token;
                }
            }
        } else {
            return Err(Error::FieldCount {
                expected: self.expected_message(),
                found: tokens.len(),
                spec: source.to_string(),
            });
        }

        let extensions = self.options.has(ParseOption::EXTENSIONS);

        let second = get_field(slots[0], &SECONDS)?;
        let minute = get_field(slots[1], &MINUTES)?;
        let hour = get_field(slots[2], &HOURS)?;

        let (dom, dom_last) = if extensions && slots[3].eq_ignore_ascii_case("L") {
            (FieldSet::new(0, false), true)
        } else {
            (get_field(slots[3], &DAYS)?, false)
        };

        let month = get_field(slots[4], &MONTHS)?;

        let (dow, nth_dow) = if extensions && slots[5].contains('#') {
            (FieldSet::new(0, false), Some(parse_nth_dow(slots[5])?))
        } else {
            (fold_sunday(get_field(slots[5], &WEEKDAYS)?), None)
        };

        let year = if self.options.has(ParseOption::YEAR) {
            let (bits, star) = get_field_wide(slots[6], &YEARS)?;
            Some(YearSet::new(bits, star))
        } else {
            None
        };

        Ok(SpecSchedule {
            second,
            minute,
            hour,
            dom,
            month,
            dow,
            year,
            dom_last,
            nth_dow,
            location,
            source: source.to_string(),
        })
    }

    fn expected_message(&self) -> String {
        let count = [
            ParseOption::SECOND,
            ParseOption::MINUTE,
            ParseOption::HOUR,
            ParseOption::DOM,
            ParseOption::MONTH,
            ParseOption::DOW,
            ParseOption::YEAR,
        ]
        .iter()
        .filter(|f| self.options.has(**f))
        .count();

        let has_optional = self.options.has(ParseOption::SECOND_OPTIONAL)
            || self.options.has(ParseOption::DOW_OPTIONAL)
            || self.options.has(ParseOption::YEAR_OPTIONAL);
        if has_optional {
            format!("{} or {}", count - 1, count)
        } else {
            format!("exactly {count}")
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::standard()
    }
}

fn parse_tz_prefix(spec: &str, default: Location) -> Result<(Location, &str)> {
    for prefix in ["TZ=", "CRON_TZ="] {
        if let Some(rest) = spec.strip_prefix(prefix) {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let location: Location = rest[..end].parse()?;
            return Ok((location, rest[end..].trim_start()));
        }
    }
    Ok((default, spec))
}

fn parse_descriptor(descriptor: &str, location: Location) -> Result<Arc<dyn Schedule>> {
    if let Some(duration) = descriptor.strip_prefix("@every ") {
        let delay = parse_go_duration(duration)
            .ok_or_else(|| Error::InvalidDuration(duration.to_string()))?;
        return Ok(Arc::new(ConstantDelay::new(delay)));
    }

    let canonical = match descriptor {
        "@yearly" | "@annually" => "0 0 0 1 1 *",
        "@monthly" => "0 0 0 1 * *",
        "@weekly" => "0 0 0 * * 0",
        "@daily" | "@midnight" => "0 0 0 * * *",
        "@hourly" => "0 0 * * * *",
        other => return Err(Error::UnrecognizedDescriptor(other.to_string())),
    };
    Ok(Arc::new(parse_canonical(canonical, location, descriptor)?))
}

/// Parse an internal six-field canonical pattern (descriptor expansion).
fn parse_canonical(canonical: &str, location: Location, source: &str) -> Result<SpecSchedule> {
    let tokens: Vec<&str> = canonical.split_whitespace().collect();
    Ok(SpecSchedule {
        second: get_field(tokens[0], &SECONDS)?,
        minute: get_field(tokens[1], &MINUTES)?,
        hour: get_field(tokens[2], &HOURS)?,
        dom: get_field(tokens[3], &DAYS)?,
        month: get_field(tokens[4], &MONTHS)?,
        dow: fold_sunday(get_field(tokens[5], &WEEKDAYS)?),
        year: None,
        dom_last: false,
        nth_dow: None,
        location,
        source: source.to_string(),
    })
}

/// Inclusive value range of one field, with optional names and the offset of
/// bit zero (non-zero only for the year field).
struct Bounds {
    min: u32,
    max: u32,
    offset: u32,
    names: Option<&'static [(&'static str, u32)]>,
}

const SECONDS: Bounds = Bounds { min: 0, max: 59, offset: 0, names: None };
const MINUTES: Bounds = Bounds { min: 0, max: 59, offset: 0, names: None };
const HOURS: Bounds = Bounds { min: 0, max: 23, offset: 0, names: None };
const DAYS: Bounds = Bounds { min: 1, max: 31, offset: 0, names: None };

const MONTHS: Bounds = Bounds {
    min: 1,
    max: 12,
    offset: 0,
    names: Some(&[
        ("jan", 1),
        ("feb", 2),
        ("mar", 3),
        ("apr", 4),
        ("may", 5),
        ("jun", 6),
        ("jul", 7),
        ("aug", 8),
        ("sep", 9),
        ("oct", 10),
        ("nov", 11),
        ("dec", 12),
    ]),
};

// 7 is accepted as an alias for Sunday and folded onto 0 after parsing.
const WEEKDAYS: Bounds = Bounds {
    min: 0,
    max: 7,
    offset: 0,
    names: Some(&[
        ("sun", 0),
        ("mon", 1),
        ("tue", 2),
        ("wed", 3),
        ("thu", 4),
        ("fri", 5),
        ("sat", 6),
    ]),
};

const YEARS: Bounds = Bounds {
    min: crate::spec::YEAR_MIN as u32,
    max: crate::spec::YEAR_MAX as u32,
    offset: crate::spec::YEAR_MIN as u32,
    names: None,
};

/// A field is a comma-separated list of ranges; bits are OR'd together and
/// the star flag is sticky across the list.
fn get_field_wide(field: &str, bounds: &Bounds) -> Result<(u128, bool)> {
    let mut bits = 0u128;
    let mut star = false;
    for expr in field.split(',') {
        let (range_bits, range_star) = get_range(expr, bounds)?;
        bits |= range_bits;
        star = star || range_star;
    }
    Ok((bits, star))
}

fn get_field(field: &str, bounds: &Bounds) -> Result<FieldSet> {
    let (bits, star) = get_field_wide(field, bounds)?;
    Ok(FieldSet::new(bits as u64, star))
}

/// number | number "-" number [ "/" number ], with `*` / `?` as the full
/// range. `N/step` means `N-max/step`. A stepped range is restricted even
/// when written with a star.
fn get_range(expr: &str, bounds: &Bounds) -> Result<(u128, bool)> {
    let range_and_step: Vec<&str> = expr.split('/').collect();
    if range_and_step.len() > 2 {
        return Err(Error::TooManySlashes(expr.to_string()));
    }

    let low_and_high: Vec<&str> = range_and_step[0].split('-').collect();
    if low_and_high.len() > 2 {
        return Err(Error::TooManyHyphens(expr.to_string()));
    }

    let single_value = low_and_high.len() == 1;
    let mut star = low_and_high[0] == "*" || low_and_high[0] == "?";

    let (start, mut end) = if star {
        (bounds.min, bounds.max)
    } else {
        let start = parse_int_or_name(low_and_high[0], bounds.names)?;
        let end = if low_and_high.len() == 2 {
            parse_int_or_name(low_and_high[1], bounds.names)?
        } else {
            start
        };
        (start, end)
    };

    let step = if range_and_step.len() == 2 {
        let step = must_parse_int(range_and_step[1])?;
        if step == 0 {
            return Err(Error::ZeroStep(expr.to_string()));
        }
        if single_value {
            end = bounds.max;
        }
        if step > 1 {
            star = false;
        }
        step
    } else {
        1
    };

    if start < bounds.min {
        return Err(Error::BelowMinimum {
            value: start,
            min: bounds.min,
            expr: expr.to_string(),
        });
    }
    if end > bounds.max {
        return Err(Error::AboveMaximum {
            value: end,
            max: bounds.max,
            expr: expr.to_string(),
        });
    }
    if start > end {
        return Err(Error::InvertedRange {
            start,
            end,
            expr: expr.to_string(),
        });
    }

    Ok((
        collect_bits(start - bounds.offset, end - bounds.offset, step),
        star,
    ))
}

fn parse_int_or_name(
    expr: &str,
    names: Option<&'static [(&'static str, u32)]>,
) -> Result<u32> {
    if let Some(names) = names {
        let lower = expr.to_ascii_lowercase();
        if let Some((_, value)) = names.iter().find(|(name, _)| *name == lower) {
            return Ok(*value);
        }
    }
    must_parse_int(expr)
}

fn must_parse_int(expr: &str) -> Result<u32> {
    let num: i64 = expr
        .parse()
        .map_err(|_| Error::InvalidNumber(expr.to_string()))?;
    if num < 0 {
        return Err(Error::NegativeNumber(num));
    }
    u32::try_from(num).map_err(|_| Error::InvalidNumber(expr.to_string()))
}

/// Set all bits in `[min, max]`, modulo the step size.
fn collect_bits(min: u32, max: u32, step: u32) -> u128 {
    if step == 1 {
        return (!0u128 >> (127 - max)) & (!0u128 << min);
    }
    let mut bits = 0u128;
    let mut i = min;
    while i <= max {
        bits |= 1u128 << i;
        i += step;
    }
    bits
}

fn fold_sunday(field: FieldSet) -> FieldSet {
    if field.contains(7) {
        FieldSet::new((field.bits() | 1) & !(1 << 7), field.star())
    } else {
        field
    }
}

/// `<dow>#<n>` with `n` in 1..=4 or `L`; must be the whole field.
fn parse_nth_dow(expr: &str) -> Result<NthDow> {
    let (dow_part, nth_part) = expr
        .split_once('#')
        .ok_or_else(|| Error::InvalidNth(expr.to_string()))?;
    if dow_part.is_empty()
        || nth_part.is_empty()
        || dow_part.contains(',')
        || nth_part.contains(',')
        || nth_part.contains('#')
    {
        return Err(Error::InvalidNth(expr.to_string()));
    }

    let mut dow = parse_int_or_name(dow_part, WEEKDAYS.names)?;
    if dow > 7 {
        return Err(Error::AboveMaximum {
            value: dow,
            max: 7,
            expr: expr.to_string(),
        });
    }
    if dow == 7 {
        dow = 0;
    }

    let nth = if nth_part.eq_ignore_ascii_case("L") {
        Nth::Last
    } else {
        let n = must_parse_int(nth_part)?;
        if !(1..=4).contains(&n) {
            return Err(Error::InvalidNth(expr.to_string()));
        }
        Nth::Nth(n as u8)
    };

    Ok(NthDow { dow, nth })
}

/// Go-style duration literal: a sequence of `<decimal><unit>` terms, e.g.
/// `1h30m`, `90s`, `1.5m`. Units: h, m, s, ms, us, ns.
fn parse_go_duration(s: &str) -> Option<StdDuration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut seconds = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let multiplier = match &rest[..unit_end] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "\u{b5}s" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        seconds += value * multiplier;
    }

    if !seconds.is_finite() || !(0.0..=1e15).contains(&seconds) {
        return None;
    }
    Some(StdDuration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    const TEST_BOUNDS: Bounds = Bounds { min: 0, max: 7, offset: 0, names: None };

    #[test]
    fn range_table() {
        let ok: &[(&str, u128, bool)] = &[
            ("5", 1 << 5, false),
            ("0", 1 << 0, false),
            ("7", 1 << 7, false),
            ("5-5", 1 << 5, false),
            ("5-6", 1 << 5 | 1 << 6, false),
            ("5-7", 1 << 5 | 1 << 6 | 1 << 7, false),
            ("5-6/2", 1 << 5, false),
            ("5-7/2", 1 << 5 | 1 << 7, false),
            ("5-7/1", 1 << 5 | 1 << 6 | 1 << 7, false),
            ("*", 0xff, true),
            ("*/2", 0b01010101, false),
        ];
        for (expr, bits, star) in ok {
            let (actual_bits, actual_star) = get_range(expr, &TEST_BOUNDS).unwrap();
            assert_eq!(actual_bits, *bits, "bits for {expr:?}");
            assert_eq!(actual_star, *star, "star for {expr:?}");
        }

        let errors: &[(&str, &str)] = &[
            ("5--5", "too many hyphens"),
            ("jan-x", "failed to parse int"),
            ("*/-12", "negative number"),
            ("*//2", "too many slashes"),
            ("5-3", "beyond end of range"),
            ("*/0", "positive number"),
        ];
        for (expr, want) in errors {
            let err = get_range(expr, &TEST_BOUNDS).unwrap_err();
            assert!(
                err.to_string().contains(want),
                "error for {expr:?}: {err}"
            );
        }

        let below = get_range("1", &Bounds { min: 3, max: 5, offset: 0, names: None }).unwrap_err();
        assert!(below.to_string().contains("below minimum"));
        let above = get_range("6", &Bounds { min: 3, max: 5, offset: 0, names: None }).unwrap_err();
        assert!(above.to_string().contains("above maximum"));
    }

    #[test]
    fn field_table() {
        let cases: &[(&str, u128)] = &[
            ("5", 1 << 5),
            ("5,6", 1 << 5 | 1 << 6),
            ("5,6,7", 1 << 5 | 1 << 6 | 1 << 7),
            ("1,5-7/2,3", 1 << 1 | 1 << 5 | 1 << 7 | 1 << 3),
        ];
        for (expr, bits) in cases {
            let (actual, _) = get_field_wide(expr, &TEST_BOUNDS).unwrap();
            assert_eq!(actual, *bits, "field {expr:?}");
        }
    }

    #[test]
    fn collect_bits_masks() {
        assert_eq!(collect_bits(0, 0, 1), 0x1);
        assert_eq!(collect_bits(1, 1, 1), 0x2);
        assert_eq!(collect_bits(1, 5, 2), 0x2a);
        assert_eq!(collect_bits(1, 4, 2), 0xa);
        assert_eq!(collect_bits(0, 59, 1), 0xfff_ffff_ffff_ffff);
        assert_eq!(collect_bits(0, 23, 1), 0xff_ffff);
        assert_eq!(collect_bits(1, 31, 1), 0xffff_fffe);
        assert_eq!(collect_bits(1, 12, 1), 0x1ffe);
        assert_eq!(collect_bits(0, 127, 1), !0u128);
    }

    #[test]
    fn month_and_weekday_names_are_case_insensitive() {
        assert_eq!(parse_int_or_name("FEB", MONTHS.names).unwrap(), 2);
        assert_eq!(parse_int_or_name("dec", MONTHS.names).unwrap(), 12);
        assert_eq!(parse_int_or_name("Sat", WEEKDAYS.names).unwrap(), 6);
        assert!(parse_int_or_name("xyz", MONTHS.names).is_err());
    }

    #[test]
    fn seven_is_sunday() {
        let field = fold_sunday(get_field("7", &WEEKDAYS).unwrap());
        assert!(field.contains(0));
        assert!(!field.contains(7));

        let range = fold_sunday(get_field("5-7", &WEEKDAYS).unwrap());
        assert!(range.contains(0));
        assert!(range.contains(5));
        assert!(range.contains(6));
    }

    #[test]
    fn standard_parser_field_count() {
        let parser = Parser::standard();
        assert!(parser.parse("* * * * *").is_ok());

        let err = parser.parse("* * * *").unwrap_err();
        assert!(err.to_string().contains("expected exactly 5"));
        let err = parser.parse("* * * * * *").unwrap_err();
        assert!(err.to_string().contains("expected exactly 5"));
    }

    #[test]
    fn seconds_parser_field_count() {
        let parser = Parser::with_seconds();
        assert!(parser.parse("* * * * * ?").is_ok());
        let err = parser.parse("* * * * *").unwrap_err();
        assert!(err.to_string().contains("expected exactly 6"));
    }

    #[test]
    fn optional_seconds_defaults_to_zero() {
        let parser = Parser::seconds_optional();
        assert!(parser.parse("* * * * * *").is_ok());

        // Five tokens: seconds default to 0, so the schedule only fires at
        // whole minutes.
        let sched = parser.parse_in("30 4 * * *", Location::UTC).unwrap();
        assert_eq!(
            sched.next(utc(2024, 5, 1, 0, 0, 0)),
            Some(utc(2024, 5, 1, 4, 30, 0))
        );

        let err = parser.parse("* * * *").unwrap_err();
        assert!(err.to_string().contains("expected 5 or 6"));
    }

    #[test]
    fn optional_dow_defaults_to_star() {
        let parser = Parser::new(
            ParseOption::SECOND
                | ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW_OPTIONAL,
        );
        let sched = parser.parse_in("0 0 0 1 1", Location::UTC).unwrap();
        assert_eq!(
            sched.next(utc(2024, 5, 1, 0, 0, 0)),
            Some(utc(2025, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn quartz_parser_year_is_optional() {
        let parser = Parser::quartz();
        assert!(parser.parse("0 0 0 1 1 *").is_ok());
        assert!(parser.parse("0 0 0 1 1 * 2030").is_ok());
        let err = parser.parse("0 0 0 1 1 * 2030 junk").unwrap_err();
        assert!(err.to_string().contains("expected 6 or 7"));
    }

    #[test]
    fn year_out_of_bounds_is_rejected() {
        let parser = Parser::quartz();
        let err = parser.parse("0 0 0 1 1 * 1950").unwrap_err();
        assert!(err.to_string().contains("below minimum"));
        let err = parser.parse("0 0 0 1 1 * 3000").unwrap_err();
        assert!(err.to_string().contains("above maximum"));
    }

    #[test]
    fn descriptors_expand_to_canonical_patterns() {
        let parser = Parser::standard();
        let daily = parser.parse_in("@midnight", Location::UTC).unwrap();
        assert_eq!(
            daily.next(utc(2024, 5, 1, 12, 0, 0)),
            Some(utc(2024, 5, 2, 0, 0, 0))
        );

        let yearly = parser.parse_in("@yearly", Location::UTC).unwrap();
        assert_eq!(
            yearly.next(utc(2024, 5, 1, 12, 0, 0)),
            Some(utc(2025, 1, 1, 0, 0, 0))
        );

        let weekly = parser.parse_in("@weekly", Location::UTC).unwrap();
        // 2024-05-01 is a Wednesday; the next Sunday is the 5th.
        assert_eq!(
            weekly.next(utc(2024, 5, 1, 12, 0, 0)),
            Some(utc(2024, 5, 5, 0, 0, 0))
        );
    }

    #[test]
    fn every_descriptor_builds_constant_delay() {
        let parser = Parser::standard();
        let sched = parser.parse("@every 1h30m").unwrap();
        let from = utc(2024, 5, 1, 0, 0, 0);
        assert_eq!(sched.next(from), Some(from + chrono::Duration::minutes(90)));

        assert!(parser.parse("@every 1.5m").is_ok());
        assert!(parser.parse("@every 90s").is_ok());
        let err = parser.parse("@every fortnight").unwrap_err();
        assert!(err.to_string().contains("failed to parse duration"));
    }

    #[test]
    fn unknown_descriptor_is_rejected() {
        let err = Parser::standard().parse("@reboot").unwrap_err();
        assert!(err.to_string().contains("unrecognized descriptor"));
    }

    #[test]
    fn descriptors_can_be_disabled() {
        let parser = Parser::new(
            ParseOption::MINUTE
                | ParseOption::HOUR
                | ParseOption::DOM
                | ParseOption::MONTH
                | ParseOption::DOW,
        );
        let err = parser.parse("@hourly").unwrap_err();
        assert!(err.to_string().contains("does not accept descriptors"));
    }

    #[test]
    fn tz_prefix_overrides_location() {
        let parser = Parser::with_seconds();
        // 04:00 New York is 08:00 UTC during EDT.
        let sched = parser
            .parse_in("TZ=America/New_York 0 0 4 * * ?", Location::UTC)
            .unwrap();
        assert_eq!(
            sched.next(utc(2024, 6, 1, 0, 0, 0)),
            Some(utc(2024, 6, 1, 8, 0, 0))
        );

        let cron_tz = parser
            .parse_in("CRON_TZ=America/New_York 0 0 4 * * ?", Location::UTC)
            .unwrap();
        assert_eq!(
            cron_tz.next(utc(2024, 6, 1, 0, 0, 0)),
            Some(utc(2024, 6, 1, 8, 0, 0))
        );
    }

    #[test]
    fn tz_prefix_with_descriptor() {
        let parser = Parser::standard();
        let sched = parser.parse_in("TZ=America/New_York @daily", Location::UTC).unwrap();
        // Midnight New York on 2024-06-02 is 04:00 UTC.
        assert_eq!(
            sched.next(utc(2024, 6, 1, 12, 0, 0)),
            Some(utc(2024, 6, 2, 4, 0, 0))
        );
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let err = Parser::standard().parse("TZ=Not/AZone * * * * *").unwrap_err();
        assert!(err.to_string().contains("bad location"));
    }

    #[test]
    fn extensions_require_opt_in() {
        let parser = Parser::standard();
        assert!(parser.parse("0 0 L * *").is_err());
        assert!(parser.parse("0 0 * * 1#2").is_err());

        let parser = parser.with_extensions();
        assert!(parser.parse("0 0 L * *").is_ok());
        assert!(parser.parse("0 0 * * 1#2").is_ok());
    }

    #[test]
    fn malformed_nth_weekday_is_rejected() {
        let parser = Parser::standard().with_extensions();
        for spec in [
            "0 0 * * 1#5",
            "0 0 * * 1#0",
            "0 0 * * #2",
            "0 0 * * 1#",
            "0 0 * * 1#2#3",
            "0 0 * * 1#2,3",
        ] {
            assert!(parser.parse(spec).is_err(), "spec {spec:?}");
        }
    }

    #[test]
    fn go_durations() {
        assert_eq!(parse_go_duration("1h30m"), Some(StdDuration::from_secs(5400)));
        assert_eq!(parse_go_duration("90s"), Some(StdDuration::from_secs(90)));
        assert_eq!(parse_go_duration("1.5m"), Some(StdDuration::from_secs(90)));
        assert_eq!(parse_go_duration("250ms"), Some(StdDuration::from_millis(250)));
        assert_eq!(parse_go_duration(""), None);
        assert_eq!(parse_go_duration("h"), None);
        assert_eq!(parse_go_duration("10"), None);
        assert_eq!(parse_go_duration("-5s"), None);
    }
}
