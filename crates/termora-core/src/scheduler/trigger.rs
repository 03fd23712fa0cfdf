//! Trigger grammar for recurring tasks.
//!
//! Accepted forms (case-insensitive):
//!
//! ```text
//! hourly | daily [at TIME] | weekly [on DAY] [at TIME]
//! every N second(s)|minute(s)|hour(s)|day(s)|week(s)
//! every minute | every hour
//! every day [at TIME]            each day at TIME
//! weekdays at TIME               every weekday at TIME
//! weekends at TIME               every weekend at TIME
//! every DAY[, DAY ...][ and DAY] [at TIME]
//! TIME := HH:MM | H[:MM]am | H[:MM]pm | noon | midnight
//! ```

use std::fmt;

use jiff::{SignedDuration, ToSpan, Zoned, civil};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TermoraError};

/// Day of the week in trigger rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const WEEKDAYS: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];
    pub const WEEKEND: [Day; 2] = [Day::Saturday, Day::Sunday];

    fn parse(word: &str) -> Option<Day> {
        let word = word.trim_end_matches(',');
        let word = word.strip_suffix('s').filter(|w| w.len() >= 6).unwrap_or(word);
        match word {
            "monday" | "mon" => Some(Day::Monday),
            "tuesday" | "tue" | "tues" => Some(Day::Tuesday),
            "wednesday" | "wed" => Some(Day::Wednesday),
            "thursday" | "thu" | "thurs" => Some(Day::Thursday),
            "friday" | "fri" => Some(Day::Friday),
            "saturday" | "sat" => Some(Day::Saturday),
            "sunday" | "sun" => Some(Day::Sunday),
            _ => None,
        }
    }

    fn matches(self, weekday: civil::Weekday) -> bool {
        let day = match weekday {
            civil::Weekday::Monday => Day::Monday,
            civil::Weekday::Tuesday => Day::Tuesday,
            civil::Weekday::Wednesday => Day::Wednesday,
            civil::Weekday::Thursday => Day::Thursday,
            civil::Weekday::Friday => Day::Friday,
            civil::Weekday::Saturday => Day::Saturday,
            civil::Weekday::Sunday => Day::Sunday,
        };
        day == self
    }

    fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
            Day::Saturday => "saturday",
            Day::Sunday => "sunday",
        }
    }
}

/// Normalized trigger rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRule {
    /// Fixed period counted from the previous firing
    Interval { seconds: u64 },
    /// Every day at a local time
    Daily { hour: i8, minute: i8 },
    /// On the listed days at a local time
    Weekly { days: Vec<Day>, hour: i8, minute: i8 },
}

impl TriggerRule {
    /// First firing strictly after `after`, in `after`'s time zone.
    ///
    /// Returns `None` only when the arithmetic leaves jiff's supported range.
    pub fn next_after(&self, after: &Zoned) -> Option<Zoned> {
        match self {
            TriggerRule::Interval { seconds } => {
                let seconds = i64::try_from(*seconds).ok()?;
                after.checked_add(SignedDuration::from_secs(seconds)).ok()
            }
            TriggerRule::Daily { hour, minute } => {
                (0..=1).find_map(|offset| at_local(after, offset, *hour, *minute))
            }
            TriggerRule::Weekly { days, hour, minute } => (0..=7).find_map(|offset| {
                let date = after.date().checked_add(offset.days()).ok()?;
                if !days.iter().any(|day| day.matches(date.weekday())) {
                    return None;
                }
                at_local(after, offset, *hour, *minute)
            }),
        }
    }
}

fn at_local(after: &Zoned, day_offset: i64, hour: i8, minute: i8) -> Option<Zoned> {
    let date = after.date().checked_add(day_offset.days()).ok()?;
    let candidate = date
        .at(hour, minute, 0, 0)
        .to_zoned(after.time_zone().clone())
        .ok()?;
    (candidate.timestamp() > after.timestamp()).then_some(candidate)
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerRule::Interval { seconds } => write!(f, "every {seconds}s"),
            TriggerRule::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
            TriggerRule::Weekly { days, hour, minute } => {
                let names: Vec<&str> = days.iter().map(|d| d.as_str()).collect();
                write!(f, "{} at {hour:02}:{minute:02}", names.join(", "))
            }
        }
    }
}

fn invalid(text: &str, reason: &str) -> TermoraError {
    TermoraError::invalid_input("trigger").with_reason(format!("'{text}': {reason}"))
}

/// Parses a trigger description into a rule.
pub fn parse(text: &str) -> Result<TriggerRule> {
    let lowered = text.trim().to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    parse_words(&words).ok_or_else(|| invalid(text, "unrecognised trigger"))
}

fn parse_words(words: &[&str]) -> Option<TriggerRule> {
    let (head, rest) = words.split_first()?;
    match *head {
        "hourly" if rest.is_empty() => Some(TriggerRule::Interval { seconds: 3600 }),
        "daily" | "nightly" => {
            let (hour, minute) = optional_at(rest)?;
            Some(TriggerRule::Daily { hour, minute })
        }
        "weekly" => {
            let (days, rest) = match rest {
                ["on", day, tail @ ..] => (vec![Day::parse(day)?], tail),
                _ => (vec![Day::Monday], rest),
            };
            let (hour, minute) = optional_at(rest)?;
            Some(TriggerRule::Weekly { days, hour, minute })
        }
        "weekdays" => weekly(Day::WEEKDAYS.to_vec(), rest),
        "weekends" => weekly(Day::WEEKEND.to_vec(), rest),
        "every" | "each" => parse_every(rest),
        _ => None,
    }
}

fn parse_every(rest: &[&str]) -> Option<TriggerRule> {
    match rest {
        ["minute"] => Some(TriggerRule::Interval { seconds: 60 }),
        ["hour"] => Some(TriggerRule::Interval { seconds: 3600 }),
        ["week"] => Some(TriggerRule::Interval { seconds: 7 * 86_400 }),
        ["day", tail @ ..] | ["night", tail @ ..] => {
            let (hour, minute) = optional_at(tail)?;
            Some(TriggerRule::Daily { hour, minute })
        }
        ["weekday", tail @ ..] => weekly(Day::WEEKDAYS.to_vec(), tail),
        ["weekend", tail @ ..] => weekly(Day::WEEKEND.to_vec(), tail),
        [count, unit] => {
            let count: u64 = count.parse().ok().filter(|n| *n > 0)?;
            Some(TriggerRule::Interval {
                seconds: count.checked_mul(unit_seconds(unit)?)?,
            })
        }
        _ => {
            let mut days = Vec::new();
            let mut index = 0;
            while let Some(word) = rest.get(index) {
                if *word == "and" {
                    index += 1;
                    continue;
                }
                match Day::parse(word) {
                    Some(day) => {
                        if !days.contains(&day) {
                            days.push(day);
                        }
                        index += 1;
                    }
                    None => break,
                }
            }
            if days.is_empty() {
                return None;
            }
            days.sort();
            weekly(days, &rest[index..])
        }
    }
}

fn weekly(days: Vec<Day>, rest: &[&str]) -> Option<TriggerRule> {
    let (hour, minute) = optional_at(rest)?;
    Some(TriggerRule::Weekly { days, hour, minute })
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit.trim_end_matches('s') {
        "second" | "sec" => Some(1),
        "minute" | "min" => Some(60),
        "hour" | "hr" => Some(3600),
        "day" => Some(86_400),
        "week" => Some(7 * 86_400),
        _ => None,
    }
}

/// `[]` means midnight; otherwise `at TIME`.
fn optional_at(rest: &[&str]) -> Option<(i8, i8)> {
    match rest {
        [] => Some((0, 0)),
        ["at", time @ ..] if !time.is_empty() => parse_time(&time.concat()),
        _ => None,
    }
}

fn parse_time(text: &str) -> Option<(i8, i8)> {
    match text {
        "noon" => return Some((12, 0)),
        "midnight" => return Some((0, 0)),
        _ => {}
    }

    let (clock, meridiem) = if let Some(clock) = text.strip_suffix("am") {
        (clock, Some(false))
    } else if let Some(clock) = text.strip_suffix("pm") {
        (clock, Some(true))
    } else {
        (text, None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) if m.len() == 2 => (h.parse::<i8>().ok()?, m.parse::<i8>().ok()?),
        Some(_) => return None,
        None if meridiem.is_some() => (clock.parse::<i8>().ok()?, 0),
        None => return None,
    };
    if !(0..60).contains(&minute) {
        return None;
    }

    let hour = match meridiem {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None if (0..24).contains(&hour) => hour,
        None => return None,
    };
    Some((hour, minute))
}

/// Trigger phrase found inside a longer intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTrigger {
    /// The phrase exactly as written in the intent
    pub phrase: String,
    pub rule: TriggerRule,
}

const TRIGGER_HEADS: &[&str] = &[
    "every", "each", "daily", "nightly", "hourly", "weekly", "weekdays", "weekends",
];
const MAX_TRIGGER_WORDS: usize = 10;

/// Finds the first (longest) trigger phrase inside `intent`.
///
/// ```rust
/// use termora_core::scheduler::trigger::detect_recurrence;
///
/// let found = detect_recurrence("back up my notes every day at 9pm").unwrap();
/// assert_eq!(found.phrase, "every day at 9pm");
/// assert!(detect_recurrence("back up my notes").is_none());
/// ```
pub fn detect_recurrence(intent: &str) -> Option<DetectedTrigger> {
    let spans = word_spans(intent);
    let lowered: Vec<String> = spans
        .iter()
        .map(|(start, end)| intent[*start..*end].to_lowercase())
        .collect();

    for start in 0..spans.len() {
        let head = lowered[start].trim_end_matches([',', '.', ';']);
        if !TRIGGER_HEADS.contains(&head) {
            continue;
        }
        let longest = (start + MAX_TRIGGER_WORDS).min(spans.len());
        for end in (start + 1..=longest).rev() {
            let words: Vec<&str> = lowered[start..end]
                .iter()
                .map(|w| w.trim_end_matches([',', '.', ';']))
                .collect();
            if let Some(rule) = parse_words(&words) {
                let phrase = intent[spans[start].0..spans[end - 1].1]
                    .trim_end_matches([',', '.', ';'])
                    .to_string();
                return Some(DetectedTrigger { phrase, rule });
            }
        }
    }
    None
}

fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (index, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, index));
                start = None;
            }
            (false, None) => start = Some(index),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use jiff::{civil::date, tz::TimeZone};

    use super::*;

    fn utc(y: i16, mo: i8, d: i8, h: i8, mi: i8) -> Zoned {
        date(y, mo, d)
            .at(h, mi, 0, 0)
            .to_zoned(TimeZone::UTC)
            .unwrap()
    }

    #[test]
    fn test_parse_intervals() {
        assert_eq!(parse("hourly").unwrap(), TriggerRule::Interval { seconds: 3600 });
        assert_eq!(
            parse("every 15 minutes").unwrap(),
            TriggerRule::Interval { seconds: 900 }
        );
        assert_eq!(
            parse("Every 2 Hours").unwrap(),
            TriggerRule::Interval { seconds: 7200 }
        );
        assert!(parse("every 0 minutes").is_err());
    }

    #[test]
    fn test_parse_daily() {
        assert_eq!(
            parse("every day at 09:30").unwrap(),
            TriggerRule::Daily { hour: 9, minute: 30 }
        );
        assert_eq!(
            parse("daily at 9pm").unwrap(),
            TriggerRule::Daily { hour: 21, minute: 0 }
        );
        assert_eq!(
            parse("each day at 12 am").unwrap(),
            TriggerRule::Daily { hour: 0, minute: 0 }
        );
        assert_eq!(parse("daily").unwrap(), TriggerRule::Daily { hour: 0, minute: 0 });
    }

    #[test]
    fn test_parse_weekly() {
        assert_eq!(
            parse("weekdays at 8:15").unwrap(),
            TriggerRule::Weekly {
                days: Day::WEEKDAYS.to_vec(),
                hour: 8,
                minute: 15
            }
        );
        assert_eq!(
            parse("every friday, monday and wed at noon").unwrap(),
            TriggerRule::Weekly {
                days: vec![Day::Monday, Day::Wednesday, Day::Friday],
                hour: 12,
                minute: 0
            }
        );
        assert_eq!(
            parse("weekly on sunday at 23:00").unwrap(),
            TriggerRule::Weekly {
                days: vec![Day::Sunday],
                hour: 23,
                minute: 0
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for text in ["", "sometimes", "every day at 25:00", "daily at 7:5", "every blue moon"] {
            assert!(parse(text).is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn test_next_after_daily() {
        let rule = TriggerRule::Daily { hour: 9, minute: 0 };
        let before = utc(2025, 3, 10, 8, 0);
        assert_eq!(rule.next_after(&before).unwrap(), utc(2025, 3, 10, 9, 0));
        let after = utc(2025, 3, 10, 9, 0);
        assert_eq!(rule.next_after(&after).unwrap(), utc(2025, 3, 11, 9, 0));
    }

    #[test]
    fn test_next_after_weekly() {
        // 2025-03-14 is a Friday
        let rule = TriggerRule::Weekly {
            days: vec![Day::Monday],
            hour: 7,
            minute: 30,
        };
        let friday = utc(2025, 3, 14, 10, 0);
        assert_eq!(rule.next_after(&friday).unwrap(), utc(2025, 3, 17, 7, 30));
        let monday_late = utc(2025, 3, 17, 8, 0);
        assert_eq!(rule.next_after(&monday_late).unwrap(), utc(2025, 3, 24, 7, 30));
    }

    #[test]
    fn test_next_after_interval() {
        let rule = TriggerRule::Interval { seconds: 900 };
        assert_eq!(
            rule.next_after(&utc(2025, 1, 1, 23, 50)).unwrap(),
            utc(2025, 1, 2, 0, 5)
        );
    }

    #[test]
    fn test_detect_recurrence_keeps_original_case() {
        let found = detect_recurrence("Please compress logs Every Monday at 8:30, thanks")
            .expect("trigger");
        assert_eq!(found.phrase, "Every Monday at 8:30");
        assert_eq!(
            found.rule,
            TriggerRule::Weekly {
                days: vec![Day::Monday],
                hour: 8,
                minute: 30
            }
        );
    }

    #[test]
    fn test_detect_recurrence_ignores_plain_every() {
        assert!(detect_recurrence("delete every log file in /tmp").is_none());
    }
}
