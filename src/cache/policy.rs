//! Expiration Policy Module
//!
//! Defines how long an entry stays fresh: either forever, or for a relative
//! time expression such as `+1 day` resolved against the entry's last write.

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{CacheError, Result};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

// == Expiration Policy ==
/// Freshness policy attached to a cache handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Entries never expire and live in the permanent namespace
    #[default]
    Unbounded,
    /// Entries expire once `now` passes the expression applied to their mtime
    Relative(RelativeExpr),
}

impl ExpirationPolicy {
    /// Parses a policy from text.
    ///
    /// `never` and `unbounded` select [`ExpirationPolicy::Unbounded`];
    /// anything else must be a valid relative expression.
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "never" | "unbounded" => Ok(ExpirationPolicy::Unbounded),
            _ => text.parse::<RelativeExpr>().map(ExpirationPolicy::Relative),
        }
    }

    /// Builds a bounded policy expiring `ttl` after each write.
    pub fn after(ttl: StdDuration) -> Result<Self> {
        let seconds = i64::try_from(ttl.as_secs())
            .map_err(|_| CacheError::InvalidPolicy(format!("ttl too large: {:?}", ttl)))?;
        format!("+{} seconds", seconds).parse().map(ExpirationPolicy::Relative)
    }

    /// Returns true for the never-expiring policy.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ExpirationPolicy::Unbounded)
    }

    // == Expiration Instant ==
    /// Resolves the instant after which an entry written at `anchor` is stale.
    ///
    /// Returns `None` for unbounded policies.
    pub fn expires_at(&self, anchor: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self {
            ExpirationPolicy::Unbounded => Ok(None),
            ExpirationPolicy::Relative(expr) => expr.resolve(anchor).map(Some),
        }
    }
}

impl FromStr for ExpirationPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        ExpirationPolicy::parse(s)
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationPolicy::Unbounded => f.write_str("never"),
            ExpirationPolicy::Relative(expr) => fmt::Display::fmt(expr, f),
        }
    }
}

// == Relative Expression ==
/// A parsed relative date expression.
///
/// Calendar units are kept apart from fixed-length units so that `+1 month`
/// lands on the same day of the following month rather than 30 days later.
/// When the day is past the end of the target month it is clamped to the
/// month's last day (Jan 31 + 1 month is Feb 28/29).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeExpr {
    source: String,
    months: i64,
    seconds: i64,
    midnight: bool,
}

impl RelativeExpr {
    /// Original text of the expression.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Net calendar offset in months.
    pub fn months(&self) -> i64 {
        self.months
    }

    /// Net fixed-length offset in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// True when a day keyword (`today`, `tomorrow`, ...) resets the time
    /// of day to midnight before the offsets apply.
    pub fn at_midnight(&self) -> bool {
        self.midnight
    }

    /// Applies the expression to `anchor`: midnight reset (UTC) if any,
    /// then months, then seconds.
    pub fn resolve(&self, anchor: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let out_of_range = || {
            CacheError::InvalidPolicy(format!(
                "'{}' applied to {} is out of range",
                self.source, anchor
            ))
        };

        let anchor = if self.midnight {
            anchor
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .ok_or_else(out_of_range)?
                .and_utc()
        } else {
            anchor
        };

        let months = u32::try_from(self.months.unsigned_abs()).map_err(|_| out_of_range())?;
        let shifted = if self.months >= 0 {
            anchor.checked_add_months(Months::new(months))
        } else {
            anchor.checked_sub_months(Months::new(months))
        }
        .ok_or_else(out_of_range)?;

        let delta = Duration::try_seconds(self.seconds).ok_or_else(out_of_range)?;
        shifted.checked_add_signed(delta).ok_or_else(out_of_range)
    }
}

impl FromStr for RelativeExpr {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| CacheError::InvalidPolicy(format!("'{}': {}", s, why));

        let tokens = tokenize(s).map_err(|why| invalid(&why))?;
        if tokens.is_empty() {
            return Err(invalid("empty expression"));
        }

        let mut months: i64 = 0;
        let mut seconds: i64 = 0;
        let mut midnight = false;
        let mut iter = tokens.into_iter().peekable();

        while let Some(mut token) = iter.next() {
            let mut sign: i64 = 1;
            if let Token::Sign(direction) = token {
                sign = direction;
                token = iter.next().ok_or_else(|| invalid("sign without a unit"))?;
            }

            let mut amount: Option<i64> = None;
            if let Token::Number(n) = token {
                amount = Some(n);
                token = iter.next().ok_or_else(|| invalid("number without a unit"))?;
            }

            let word = match token {
                Token::Word(word) => word,
                _ => return Err(invalid("expected a unit")),
            };

            let (unit, count) = match Keyword::from_word(&word) {
                Some(keyword) => {
                    if amount.is_some() || sign != 1 {
                        return Err(invalid("keywords take no amount"));
                    }
                    midnight |= keyword.resets_time();
                    keyword.as_offset()
                }
                None => {
                    let unit = Unit::from_word(&word)
                        .ok_or_else(|| invalid(&format!("unknown unit '{}'", word)))?;
                    (unit, amount.unwrap_or(1) * sign)
                }
            };

            let count = if matches!(iter.peek(), Some(Token::Word(w)) if w == "ago") {
                iter.next();
                -count
            } else {
                count
            };

            match unit.scale() {
                Scale::Months(per) => {
                    months = count
                        .checked_mul(per)
                        .and_then(|m| months.checked_add(m))
                        .ok_or_else(|| invalid("offset too large"))?;
                }
                Scale::Seconds(per) => {
                    seconds = count
                        .checked_mul(per)
                        .and_then(|secs| seconds.checked_add(secs))
                        .ok_or_else(|| invalid("offset too large"))?;
                }
            }
        }

        Ok(Self {
            source: s.trim().to_string(),
            months,
            seconds,
            midnight,
        })
    }
}

impl fmt::Display for RelativeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// == Lexer ==
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Sign(i64),
    Number(i64),
    Word(String),
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '+' || c == '-' {
            chars.next();
            tokens.push(Token::Sign(if c == '-' { -1 } else { 1 }));
        } else if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            let n = digits
                .parse::<i64>()
                .map_err(|_| format!("number '{}' is too large", digits))?;
            tokens.push(Token::Number(n));
        } else if c.is_alphabetic() {
            let mut word = String::new();
            while let Some(&w) = chars.peek().filter(|w| w.is_alphabetic()) {
                word.extend(w.to_lowercase());
                chars.next();
            }
            tokens.push(Token::Word(word));
        } else {
            return Err(format!("unexpected character '{}'", c));
        }
    }

    Ok(tokens)
}

// == Units ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

enum Scale {
    Months(i64),
    Seconds(i64),
}

impl Unit {
    fn from_word(word: &str) -> Option<Self> {
        let unit = match word {
            "sec" | "secs" | "second" | "seconds" => Unit::Second,
            "min" | "mins" | "minute" | "minutes" => Unit::Minute,
            "hour" | "hours" => Unit::Hour,
            "day" | "days" => Unit::Day,
            "week" | "weeks" => Unit::Week,
            "fortnight" | "fortnights" => Unit::Fortnight,
            "month" | "months" => Unit::Month,
            "year" | "years" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn scale(self) -> Scale {
        match self {
            Unit::Second => Scale::Seconds(1),
            Unit::Minute => Scale::Seconds(SECONDS_PER_MINUTE),
            Unit::Hour => Scale::Seconds(SECONDS_PER_HOUR),
            Unit::Day => Scale::Seconds(SECONDS_PER_DAY),
            Unit::Week => Scale::Seconds(SECONDS_PER_WEEK),
            Unit::Fortnight => Scale::Seconds(2 * SECONDS_PER_WEEK),
            Unit::Month => Scale::Months(1),
            Unit::Year => Scale::Months(12),
        }
    }
}

enum Keyword {
    Now,
    Today,
    Tomorrow,
    Yesterday,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "now" => Some(Keyword::Now),
            "today" | "midnight" => Some(Keyword::Today),
            "tomorrow" => Some(Keyword::Tomorrow),
            "yesterday" => Some(Keyword::Yesterday),
            _ => None,
        }
    }

    fn as_offset(&self) -> (Unit, i64) {
        match self {
            Keyword::Now | Keyword::Today => (Unit::Day, 0),
            Keyword::Tomorrow => (Unit::Day, 1),
            Keyword::Yesterday => (Unit::Day, -1),
        }
    }

    /// Day keywords start from 00:00 of the anchor's day.
    fn resets_time(&self) -> bool {
        !matches!(self, Keyword::Now)
    }
}
