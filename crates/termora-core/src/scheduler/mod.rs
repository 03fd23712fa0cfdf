//! Registry of recurring tasks.
//!
//! The registry only answers "what is due now". Timers live outside the
//! agent: something like cron calls `termora schedule run-due`, which loads
//! the entries, asks [`ScheduleRegistry::list_due`] and runs each template
//! through the orchestrator.
//!
//! An entry is due when it is enabled and its next firing after the last
//! firing (or creation, if it never fired) is not in the future. Missed
//! periods coalesce into a single firing.

use jiff::{Timestamp, Zoned};

use crate::models::ScheduleEntry;

pub mod trigger;

pub use trigger::{Day, DetectedTrigger, TriggerRule, detect_recurrence};

/// In-memory view over the stored schedule entries.
#[derive(Debug, Clone, Default)]
pub struct ScheduleRegistry {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleRegistry {
    pub fn from_entries(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Entries due at `now`, in id order. Pure: the same entries and the
    /// same `now` always give the same answer.
    pub fn list_due(&self, now: &Zoned) -> Vec<&ScheduleEntry> {
        let mut due: Vec<&ScheduleEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.enabled)
            .filter(|entry| {
                next_fire(entry, now)
                    .is_some_and(|next| next.timestamp() <= now.timestamp())
            })
            .collect();
        due.sort_by_key(|entry| entry.id);
        due
    }
}

/// Next firing of `entry`, expressed in the time zone of `reference`.
pub fn next_fire(entry: &ScheduleEntry, reference: &Zoned) -> Option<Zoned> {
    let base: Timestamp = entry.last_fired_at.unwrap_or(entry.created_at);
    let base = base.to_zoned(reference.time_zone().clone());
    entry.rule.next_after(&base)
}

#[cfg(test)]
mod tests {
    use jiff::{civil::date, tz::TimeZone};

    use super::*;
    use crate::models::ScheduleTemplate;

    fn at(y: i16, mo: i8, d: i8, h: i8, mi: i8) -> Zoned {
        date(y, mo, d)
            .at(h, mi, 0, 0)
            .to_zoned(TimeZone::UTC)
            .unwrap()
    }

    fn entry(id: u64, rule: TriggerRule, created: &Zoned) -> ScheduleEntry {
        ScheduleEntry {
            id,
            description: rule.to_string(),
            rule,
            template: ScheduleTemplate::Intent(format!("task {id}")),
            enabled: true,
            last_fired_at: None,
            created_at: created.timestamp(),
        }
    }

    #[test]
    fn test_list_due_daily() {
        let created = at(2025, 5, 1, 8, 0);
        let registry = ScheduleRegistry::from_entries(vec![entry(
            1,
            TriggerRule::Daily { hour: 9, minute: 0 },
            &created,
        )]);

        assert!(registry.list_due(&at(2025, 5, 1, 8, 59)).is_empty());
        assert_eq!(registry.list_due(&at(2025, 5, 1, 9, 0)).len(), 1);
    }

    #[test]
    fn test_list_due_respects_last_fired_and_enabled() {
        let created = at(2025, 5, 1, 0, 0);
        let mut fired = entry(1, TriggerRule::Interval { seconds: 3600 }, &created);
        fired.last_fired_at = Some(at(2025, 5, 1, 10, 0).timestamp());
        let mut disabled = entry(2, TriggerRule::Interval { seconds: 60 }, &created);
        disabled.enabled = false;
        let pending = entry(3, TriggerRule::Interval { seconds: 60 }, &created);

        let registry = ScheduleRegistry::from_entries(vec![pending, disabled, fired]);
        let now = at(2025, 5, 1, 10, 30);
        let ids: Vec<u64> = registry.list_due(&now).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3]);

        let later = at(2025, 5, 1, 11, 0);
        let ids: Vec<u64> = registry.list_due(&later).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_list_due_is_deterministic() {
        let created = at(2025, 5, 1, 0, 0);
        let registry = ScheduleRegistry::from_entries(
            (1..=5)
                .map(|id| entry(id, TriggerRule::Interval { seconds: id * 600 }, &created))
                .collect(),
        );
        let now = at(2025, 5, 1, 0, 35);
        let first: Vec<u64> = registry.list_due(&now).iter().map(|e| e.id).collect();
        let second: Vec<u64> = registry.list_due(&now).iter().map(|e| e.id).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(first, second);
    }
}
