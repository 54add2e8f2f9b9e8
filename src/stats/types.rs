//! Usage events and their daily aggregation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The user who triggered an open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub name: String,
    /// Contact detail reported back in confirmations (e.g. an email address)
    #[serde(default)]
    pub contact: String,
}

impl Requester {
    pub fn new(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact: contact.into(),
        }
    }

    /// A requester without a name cannot be attributed and is rejected.
    pub fn is_recognized(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// One recorded open. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub channel: String,
    pub requester: Requester,
    pub opened_at: DateTime<Utc>,
}

/// Opens counted on one calendar day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayBreakdown {
    pub total: u64,
    pub channels: BTreeMap<String, u64>,
}

/// Per-day usage counts plus the timestamp of the earliest event recorded.
///
/// Only constructible with at least one counted event, so "no data" is always
/// expressed as `Option::None` and never as an empty aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyAggregate {
    since: DateTime<Utc>,
    days: BTreeMap<NaiveDate, DayBreakdown>,
}

impl DailyAggregate {
    /// Aggregate an event log.
    ///
    /// `since` is the earliest `opened_at`, whatever order the events were appended in.
    pub fn from_events<'a, I>(events: I, time_zone: Tz) -> Option<Self>
    where
        I: IntoIterator<Item = &'a UsageEvent>,
    {
        let mut events = events.into_iter();
        let first = events.next()?;
        let mut aggregate = Self {
            since: first.opened_at,
            days: BTreeMap::new(),
        };

        for event in std::iter::once(first).chain(events) {
            aggregate.since = aggregate.since.min(event.opened_at);
            let day = event.opened_at.with_timezone(&time_zone).date_naive();
            aggregate.add(day, &event.channel, 1);
        }

        Some(aggregate)
    }

    /// Build from pre-grouped `(day, channel, count)` rows.
    ///
    /// Returns `None` when `since` is absent or no row carries a positive count.
    pub fn from_counts<I>(since: Option<DateTime<Utc>>, counts: I) -> Option<Self>
    where
        I: IntoIterator<Item = (NaiveDate, String, u64)>,
    {
        let mut aggregate = Self {
            since: since?,
            days: BTreeMap::new(),
        };

        for (day, channel, count) in counts {
            aggregate.add(day, &channel, count);
        }

        if aggregate.days.is_empty() {
            return None;
        }
        Some(aggregate)
    }

    fn add(&mut self, day: NaiveDate, channel: &str, count: u64) {
        if count == 0 {
            return;
        }
        let bucket = self.days.entry(day).or_default();
        bucket.total += count;
        *bucket.channels.entry(channel.to_string()).or_insert(0) += count;
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Days with at least one open, oldest first
    pub fn days(&self) -> &BTreeMap<NaiveDate, DayBreakdown> {
        &self.days
    }

    pub fn total(&self) -> u64 {
        self.days.values().map(|d| d.total).sum()
    }

    pub fn count_on(&self, day: NaiveDate) -> u64 {
        self.days.get(&day).map_or(0, |d| d.total)
    }

    /// Total opens per channel across all days
    pub fn channel_totals(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for bucket in self.days.values() {
            for (channel, count) in &bucket.channels {
                *totals.entry(channel.clone()).or_insert(0) += count;
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(channel: &str, at: DateTime<Utc>) -> UsageEvent {
        UsageEvent {
            channel: channel.to_string(),
            requester: Requester::new("alice", "alice@example.com"),
            opened_at: at,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_events_is_none() {
        let events: Vec<UsageEvent> = Vec::new();
        assert!(DailyAggregate::from_events(&events, Tz::UTC).is_none());
    }

    #[test]
    fn test_groups_by_day_and_channel() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let events = vec![
            event("door", t0),
            event("door", Utc.with_ymd_and_hms(2026, 10, 16, 17, 30, 0).unwrap()),
            event("garage", Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap()),
            // Nothing on the 17th
            event("door", Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()),
        ];

        let aggregate = DailyAggregate::from_events(&events, Tz::UTC).unwrap();
        assert_eq!(aggregate.since(), t0);
        assert_eq!(aggregate.total(), 4);
        assert_eq!(aggregate.days().len(), 2);
        assert_eq!(aggregate.count_on(date(2026, 10, 16)), 3);
        assert_eq!(aggregate.count_on(date(2026, 10, 17)), 0);
        assert!(!aggregate.days().contains_key(&date(2026, 10, 17)));

        let day = &aggregate.days()[&date(2026, 10, 16)];
        assert_eq!(day.channels.get("door"), Some(&2));
        assert_eq!(day.channels.get("garage"), Some(&1));

        let totals = aggregate.channel_totals();
        assert_eq!(totals.get("door"), Some(&3));
        assert_eq!(totals.get("garage"), Some(&1));
    }

    #[test]
    fn test_day_boundary_follows_time_zone() {
        // 22:30 UTC is already the next day in Helsinki (UTC+3 in October)
        let late = Utc.with_ymd_and_hms(2026, 10, 16, 22, 30, 0).unwrap();
        let events = vec![event("door", late)];

        let utc = DailyAggregate::from_events(&events, Tz::UTC).unwrap();
        assert_eq!(utc.count_on(date(2026, 10, 16)), 1);

        let helsinki = DailyAggregate::from_events(&events, chrono_tz::Europe::Helsinki).unwrap();
        assert_eq!(helsinki.count_on(date(2026, 10, 17)), 1);
        assert_eq!(helsinki.count_on(date(2026, 10, 16)), 0);
    }

    #[test]
    fn test_since_is_earliest_even_when_appended_out_of_order() {
        let later = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 10, 18, 11, 59, 59).unwrap();
        let events = vec![event("door", later), event("garage", earlier)];

        let aggregate = DailyAggregate::from_events(&events, Tz::UTC).unwrap();
        assert_eq!(aggregate.since(), earlier);
        assert_eq!(aggregate.total(), 2);
    }

    #[test]
    fn test_from_counts() {
        let since = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();

        assert!(DailyAggregate::from_counts(None, vec![(date(2026, 10, 16), "door".into(), 1)]).is_none());
        assert!(DailyAggregate::from_counts(Some(since), Vec::new()).is_none());
        assert!(DailyAggregate::from_counts(Some(since), vec![(date(2026, 10, 16), "door".into(), 0)]).is_none());

        let aggregate = DailyAggregate::from_counts(
            Some(since),
            vec![
                (date(2026, 10, 16), "door".into(), 2),
                (date(2026, 10, 16), "garage".into(), 1),
                (date(2026, 10, 17), "door".into(), 4),
            ],
        )
        .unwrap();
        assert_eq!(aggregate.total(), 7);
        assert_eq!(aggregate.count_on(date(2026, 10, 17)), 4);
    }

    #[test]
    fn test_requester_recognition() {
        assert!(Requester::new("bob", "bob@example.com").is_recognized());
        assert!(Requester::new("bob", "").is_recognized());
        assert!(!Requester::new("  ", "x@example.com").is_recognized());
    }

    #[test]
    fn test_serialized_days_use_iso_dates() {
        let events = vec![event("door", Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap())];
        let aggregate = DailyAggregate::from_events(&events, Tz::UTC).unwrap();

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["days"]["2026-10-16"]["total"], 1);
        assert_eq!(json["days"]["2026-10-16"]["channels"]["door"], 1);
    }
}
